use std::collections::HashMap;

use serde::Deserialize;
use serde::Serialize;

/// State of a light entity.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LightState {
    /// Whether the light is on or off.
    pub on: bool,

    /// Brightness level (0-255), if supported.
    pub brightness: Option<u8>,
}

/// State of a binary sensor entity.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BinarySensorState {
    /// Whether the sensor is active (meaning depends on device class:
    /// pump running, reservoir empty, nutrients due, etc.)
    pub on: bool,
}

/// State of a numeric or enumerated sensor entity.
///
/// Values are kept as rendered strings so enum sensors ("Low", "Full") and
/// numeric sensors share a representation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SensorState {
    pub value: String,

    /// Unit of measurement, if the sensor has one (e.g. "d" for days).
    pub unit: Option<String>,
}

/// A physical device owning one or more entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    /// Stable device id within gardend (integrations pick something unique,
    /// e.g. the vendor's hardware guid).
    pub id: String,

    /// (namespace, id) identifier pairs for registry matching.
    pub identifiers: Vec<(String, String)>,

    /// Human-readable name.
    pub name: String,

    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub hw_version: Option<String>,
    pub sw_version: Option<String>,
}

/// Registry entry for a discovered entity.
///
/// Created at discovery time, before the entity has reported any state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityInfo {
    /// Human-readable name.
    pub name: String,

    /// Name of the integration that owns the entity.
    pub integration: String,

    /// Icon hint (e.g. "mdi:water-pump").
    pub icon: Option<String>,

    /// Device class hint for binary sensors ("running", "problem").
    pub device_class: Option<String>,

    /// Id of the owning device, if known.
    pub device_id: Option<String>,
}

/// Centralized snapshot of the entire engine state.
#[derive(Debug, Clone, Default, Serialize)]
pub struct State {
    pub entities: HashMap<String, EntityInfo>,
    pub lights: HashMap<String, LightState>,
    pub binary_sensors: HashMap<String, BinarySensorState>,
    pub sensors: HashMap<String, SensorState>,
    pub devices: HashMap<String, Device>,
}
