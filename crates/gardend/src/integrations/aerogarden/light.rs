use super::garden::FIELD_LIGHT_STAT;
use super::garden::GardenData;
use crate::engine::LightState;

/// Label for the single controllable light each garden exposes
pub const LIGHT_NAME: &str = "Grow Light";

pub const LIGHT_ICON: &str = "mdi:lightbulb";

/// Project the grow light state from the cache.
///
/// The vendor reports no brightness over this API, so only on/off is
/// populated.
pub fn light_state(data: &GardenData, config_id: i64) -> Option<LightState> {
    let stat = data.int_property(config_id, FIELD_LIGHT_STAT)?;
    Some(LightState {
        on: stat == 1,
        brightness: None,
    })
}
