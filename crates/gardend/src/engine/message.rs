//! Type-safe message system for gardend
//!
//! Messages are split by direction to enforce correct usage at compile time:
//! - `FromIntegrationMessage`: Events from integrations to the engine
//! - `ToIntegrationMessage`: Commands from the engine to integrations

use super::state::Device;

/// Messages FROM integrations TO the engine (events/state updates)
#[derive(Debug, Clone)]
pub enum FromIntegrationMessage {
    /// An entity was discovered and registered
    EntityDiscovered {
        entity_id: String,
        name: String,
        integration_name: String,
        icon: Option<String>,
        device_class: Option<String>,
        /// Device the entity belongs to, if the integration knows it
        device: Option<Device>,
    },

    /// An entity was removed (garden deleted from the account, etc.)
    EntityRemoved { entity_id: String },

    /// A light's state changed
    LightStateChanged {
        entity_id: String,
        on: bool,
        brightness: Option<u8>,
    },

    /// A binary sensor's state changed (e.g., pump running)
    BinarySensorStateChanged { entity_id: String, on: bool },

    /// A sensor's state changed (e.g., nutrient days remaining)
    SensorStateChanged {
        entity_id: String,
        value: String,
        unit: Option<String>,
    },
}

/// Messages FROM the engine TO integrations (commands)
#[derive(Debug, Clone)]
pub enum ToIntegrationMessage {
    /// Command to change a light's state
    LightCommand {
        entity_id: String,
        on: bool,
        brightness: Option<u8>,
    },
}
