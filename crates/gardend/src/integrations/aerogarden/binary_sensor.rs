use super::garden::GardenData;
use super::garden::{
    FIELD_LIGHT_STAT, FIELD_NUTRI_REMIND_DAY, FIELD_PUMP_HYDRO, FIELD_PUMP_STAT,
};

/// Describes one binary sensor entity projected from the garden cache
pub struct BinarySensorDescription {
    /// Entity key, used in the entity id
    pub key: &'static str,

    /// Human-readable label, appended to the garden name
    pub name: &'static str,

    pub icon: &'static str,

    /// Device class hint ("running", "problem"), where one applies
    pub device_class: Option<&'static str>,

    /// Read the on/off state from the cache. `None` when the backing field
    /// is missing.
    pub value_fn: fn(&GardenData, i64) -> Option<bool>,
}

pub const BINARY_SENSOR_DESCRIPTIONS: &[BinarySensorDescription] = &[
    BinarySensorDescription {
        key: "pump_status",
        name: "Pump",
        icon: "mdi:water-pump",
        device_class: Some("running"),
        value_fn: |data, config_id| {
            data.int_property(config_id, FIELD_PUMP_STAT)
                .map(|v| v == 1)
        },
    },
    BinarySensorDescription {
        // Derived from the nutrient reminder countdown; the vendor's
        // dedicated nutriStatus field turned out to be unreliable.
        key: "needs_nutrients",
        name: "Needs Nutrients",
        icon: "mdi:cup-water",
        device_class: Some("problem"),
        value_fn: |data, config_id| {
            data.int_property(config_id, FIELD_NUTRI_REMIND_DAY)
                .map(|days| days < 1)
        },
    },
    BinarySensorDescription {
        key: "needs_water",
        name: "Needs Water",
        icon: "mdi:water",
        device_class: Some("problem"),
        value_fn: |data, config_id| {
            data.int_property(config_id, FIELD_PUMP_HYDRO)
                .map(|v| v == 1)
        },
    },
    BinarySensorDescription {
        // Plain on/off reading of the grow light, no device class so the
        // state reads as ON/OFF rather than light-detected
        key: "light_status",
        name: "Light",
        icon: "mdi:lightbulb",
        device_class: None,
        value_fn: |data, config_id| {
            data.int_property(config_id, FIELD_LIGHT_STAT)
                .map(|v| v == 1)
        },
    },
];
