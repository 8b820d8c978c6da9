use super::garden::GardenData;
use super::garden::{FIELD_NUTRI_REMIND_DAY, FIELD_PLANTED_DAY, FIELD_PUMP_LEVEL};

/// Reservoir level reported by the pump level field (ordinals 0-2)
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::FromRepr)]
#[repr(i64)]
pub enum WaterLevel {
    Low = 0,
    Medium = 1,
    Full = 2,
}

/// Describes one sensor entity projected from the garden cache
pub struct SensorDescription {
    /// Entity key, used in the entity id
    pub key: &'static str,

    /// Human-readable label, appended to the garden name
    pub name: &'static str,

    pub icon: &'static str,

    /// Unit of measurement, if any
    pub unit: Option<&'static str>,

    /// Read the rendered value from the cache. `None` when the backing field
    /// is missing or out of range.
    pub value_fn: fn(&GardenData, i64) -> Option<String>,
}

pub const SENSOR_DESCRIPTIONS: &[SensorDescription] = &[
    SensorDescription {
        key: "planted_days",
        name: "Planted Days",
        icon: "mdi:calendar",
        unit: Some("d"),
        value_fn: |data, config_id| {
            data.int_property(config_id, FIELD_PLANTED_DAY)
                .map(|days| days.to_string())
        },
    },
    SensorDescription {
        key: "nutrient_days",
        name: "Nutrient Days",
        icon: "mdi:calendar-clock",
        unit: Some("d"),
        value_fn: |data, config_id| {
            data.int_property(config_id, FIELD_NUTRI_REMIND_DAY)
                .map(|days| days.to_string())
        },
    },
    SensorDescription {
        key: "pump_level",
        name: "Water Level",
        icon: "mdi:water-percent",
        unit: None,
        value_fn: |data, config_id| {
            data.int_property(config_id, FIELD_PUMP_LEVEL)
                .and_then(WaterLevel::from_repr)
                .map(|level| level.to_string())
        },
    },
];

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data(record: serde_json::Value) -> GardenData {
        GardenData::from_records(vec![record])
    }

    fn description(key: &str) -> &'static SensorDescription {
        SENSOR_DESCRIPTIONS
            .iter()
            .find(|d| d.key == key)
            .unwrap()
    }

    #[test]
    fn planted_days_reads_field() {
        let data = data(json!({ "configID": 1, "plantedDay": 43 }));
        let desc = description("planted_days");
        assert_eq!((desc.value_fn)(&data, 1).as_deref(), Some("43"));
    }

    #[test]
    fn nutrient_days_reads_field() {
        let data = data(json!({ "configID": 1, "nutriRemindDay": 6 }));
        let desc = description("nutrient_days");
        assert_eq!((desc.value_fn)(&data, 1).as_deref(), Some("6"));
    }

    #[test]
    fn pump_level_maps_ordinals_to_labels() {
        let desc = description("pump_level");
        for (ordinal, label) in [(0, "Low"), (1, "Medium"), (2, "Full")] {
            let data = data(json!({ "configID": 1, "pumpLevel": ordinal }));
            assert_eq!((desc.value_fn)(&data, 1).as_deref(), Some(label));
        }
    }

    #[test]
    fn pump_level_out_of_range_is_none() {
        let data = data(json!({ "configID": 1, "pumpLevel": 3 }));
        let desc = description("pump_level");
        assert_eq!((desc.value_fn)(&data, 1), None);
    }

    #[test]
    fn missing_field_is_none() {
        let data = data(json!({ "configID": 1 }));
        for desc in SENSOR_DESCRIPTIONS {
            assert_eq!((desc.value_fn)(&data, 1), None);
        }
    }
}
