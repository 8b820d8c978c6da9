use std::collections::HashMap;
use std::time::Duration;

use base64::Engine as _;
use serde_json::Value;
use thiserror::Error;
use tokio::time::Instant;
use tracing::debug;
use tracing::warn;

use super::client::GardenApiError;
use super::client::GardenClient;
use crate::engine::Device;

pub const MANUFACTURER: &str = "AeroGarden";

/// Vendor field names within a device record
pub const FIELD_CONFIG_ID: &str = "configID";
pub const FIELD_AIR_GUID: &str = "airGuid";
pub const FIELD_CHOOSE_GARDEN: &str = "chooseGarden";
pub const FIELD_PLANTED_NAME: &str = "plantedName";
pub const FIELD_PLANTED_DAY: &str = "plantedDay";
pub const FIELD_NUTRI_REMIND_DAY: &str = "nutriRemindDay";
pub const FIELD_PUMP_LEVEL: &str = "pumpLevel";
pub const FIELD_PUMP_STAT: &str = "pumpStat";
pub const FIELD_PUMP_HYDRO: &str = "pumpHydro";
pub const FIELD_LIGHT_STAT: &str = "lightStat";
pub const FIELD_HW_VERSION: &str = "hwVersion";
pub const FIELD_SW_VERSION: &str = "swVersion";

/// A refresh or config-patch attempt failed; the previously cached data is
/// still valid.
#[derive(Debug, Error)]
#[error("garden refresh failed: {source}")]
pub struct UpdateError {
    #[from]
    source: GardenApiError,
}

/// In-memory snapshot of the last-fetched device records, keyed by the
/// vendor's integer configuration id.
///
/// All lookups are infallible: unknown ids and fields return `None`.
#[derive(Debug, Default)]
pub struct GardenData {
    records: HashMap<i64, Value>,
}

impl GardenData {
    /// Build a snapshot from raw device records, keyed by `configID`.
    /// Records without a usable `configID` are dropped.
    pub fn from_records(records: Vec<Value>) -> Self {
        let mut map = HashMap::with_capacity(records.len());
        for record in records {
            let Some(config_id) = record.get(FIELD_CONFIG_ID).and_then(Value::as_i64) else {
                warn!("skipping device record without a configID");
                continue;
            };
            map.insert(config_id, record);
        }
        Self { records: map }
    }

    pub fn config_ids(&self) -> Vec<i64> {
        self.records.keys().copied().collect()
    }

    /// Raw field lookup. Never fails: unknown id or field yields `None`.
    pub fn get_garden_property(&self, config_id: i64, field: &str) -> Option<&Value> {
        self.records.get(&config_id)?.get(field)
    }

    pub fn int_property(&self, config_id: i64, field: &str) -> Option<i64> {
        self.get_garden_property(config_id, field)?.as_i64()
    }

    pub fn str_property(&self, config_id: i64, field: &str) -> Option<String> {
        Some(
            self.get_garden_property(config_id, field)?
                .as_str()?
                .to_string(),
        )
    }

    /// Garden display name, with a " (Left)" / " (Right)" suffix when the
    /// record is one head of a multi-garden unit.
    pub fn get_garden_name(&self, config_id: i64) -> Option<String> {
        let name = self.decoded_name(config_id)?;

        if !self.is_multi_garden(config_id) {
            return Some(name);
        }

        let side = if self.int_property(config_id, FIELD_CHOOSE_GARDEN).unwrap_or(0) > 0 {
            "Right"
        } else {
            "Left"
        };
        Some(format!("{} ({})", name, side))
    }

    /// Device registry projection for a garden. Multi-garden heads share the
    /// vendor hardware guid and therefore map to one device.
    pub fn device(&self, config_id: i64) -> Option<Device> {
        let air_guid = self.str_property(config_id, FIELD_AIR_GUID)?;
        Some(Device {
            id: air_guid.clone(),
            identifiers: vec![("aerogarden".to_string(), air_guid)],
            name: self
                .decoded_name(config_id)
                .unwrap_or_else(|| format!("AeroGarden {}", config_id)),
            manufacturer: Some(MANUFACTURER.to_string()),
            model: Some(MANUFACTURER.to_string()),
            hw_version: self.str_property(config_id, FIELD_HW_VERSION),
            sw_version: self.str_property(config_id, FIELD_SW_VERSION),
        })
    }

    /// The vendor stores planted names base64-encoded
    fn decoded_name(&self, config_id: i64) -> Option<String> {
        let encoded = self.str_property(config_id, FIELD_PLANTED_NAME)?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .ok()?;
        String::from_utf8(bytes).ok()
    }

    /// A record with a positive chooseGarden is the right head of a
    /// multi-garden unit. A record is the left head when another record
    /// shares its airGuid with a positive chooseGarden while its own is zero.
    fn is_multi_garden(&self, config_id: i64) -> bool {
        if self.int_property(config_id, FIELD_CHOOSE_GARDEN).unwrap_or(0) > 0 {
            return true;
        }

        let Some(air_guid) = self.get_garden_property(config_id, FIELD_AIR_GUID) else {
            return false;
        };
        self.records.values().any(|record| {
            record.get(FIELD_AIR_GUID) == Some(air_guid)
                && record
                    .get(FIELD_CHOOSE_GARDEN)
                    .and_then(Value::as_i64)
                    .unwrap_or(0)
                    > 0
        })
    }
}

/// Throttled registry cache over an AeroGarden client.
///
/// Owned by the integration's polling task, so no internal locking: the
/// record map is rebuilt and swapped in a single assignment, and the previous
/// snapshot stays visible until a refresh succeeds.
pub struct Gardens<C> {
    client: C,
    data: GardenData,
    min_time_between_updates: Duration,
    last_update: Option<Instant>,
}

impl<C: GardenClient> Gardens<C> {
    pub fn new(client: C, min_time_between_updates: Duration) -> Self {
        Self {
            client,
            data: GardenData::default(),
            min_time_between_updates,
            last_update: None,
        }
    }

    pub fn data(&self) -> &GardenData {
        &self.data
    }

    #[cfg(test)]
    pub(crate) fn client_mut(&mut self) -> &mut C {
        &mut self.client
    }

    /// Refresh the device records, throttled to at most one fetch per
    /// configured interval. `force` bypasses the throttle.
    pub async fn update(&mut self, force: bool) -> Result<(), UpdateError> {
        if !force {
            if let Some(last) = self.last_update {
                if last.elapsed() < self.min_time_between_updates {
                    debug!("skipping garden refresh inside throttle window");
                    return Ok(());
                }
            }
        }

        self.refresh().await
    }

    /// Toggle a garden's light by patching its plant config, then force a
    /// refresh so the cache reflects the new state.
    pub async fn toggle_light(&mut self, config_id: i64, on: bool) -> Result<(), UpdateError> {
        let air_guid = self
            .data
            .str_property(config_id, FIELD_AIR_GUID)
            .ok_or_else(|| {
                UpdateError::from(GardenApiError::Api(format!(
                    "no cached record for garden {}",
                    config_id
                )))
            })?;
        let choose_garden = self
            .data
            .int_property(config_id, FIELD_CHOOSE_GARDEN)
            .unwrap_or(0);

        let patch = serde_json::json!({ FIELD_LIGHT_STAT: i64::from(on) }).to_string();
        self.client
            .update_device_config(&air_guid, choose_garden, &patch)
            .await?;

        self.refresh().await
    }

    async fn refresh(&mut self) -> Result<(), UpdateError> {
        // Stamped at fetch start so fetch latency does not shift the throttle
        // window past the next scheduled poll
        self.last_update = Some(Instant::now());

        if !self.client.is_logged_in() {
            self.client.login().await?;
        }

        let records = self.client.get_user_devices().await?;
        self.data = GardenData::from_records(records);
        Ok(())
    }
}
