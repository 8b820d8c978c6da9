use std::collections::HashSet;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::info;
use tracing::warn;

use super::binary_sensor::BINARY_SENSOR_DESCRIPTIONS;
use super::client::GardenClient;
use super::config::AerogardenConfig;
use super::garden::GardenData;
use super::garden::Gardens;
use super::garden::UpdateError;
use super::light;
use super::sensor::SENSOR_DESCRIPTIONS;
use crate::engine::FromIntegrationMessage;
use crate::engine::FromIntegrationSender;
use crate::engine::Integration;
use crate::engine::ToIntegrationMessage;

const INTEGRATION_NAME: &str = "aerogarden";

fn sensor_entity_id(config_id: i64, key: &str) -> String {
    format!("sensor.aerogarden_{}_{}", config_id, key)
}

fn binary_sensor_entity_id(config_id: i64, key: &str) -> String {
    format!("binary_sensor.aerogarden_{}_{}", config_id, key)
}

fn light_entity_id(config_id: i64) -> String {
    format!("light.aerogarden_{}", config_id)
}

/// Recover the garden configuration id from a light entity id
fn parse_light_entity_id(entity_id: &str) -> Option<i64> {
    entity_id.strip_prefix("light.aerogarden_")?.parse().ok()
}

/// Every entity id a garden owns, used when the garden disappears from the
/// account
fn entity_ids_for(config_id: i64) -> Vec<String> {
    let mut ids: Vec<String> = SENSOR_DESCRIPTIONS
        .iter()
        .map(|desc| sensor_entity_id(config_id, desc.key))
        .collect();
    ids.extend(
        BINARY_SENSOR_DESCRIPTIONS
            .iter()
            .map(|desc| binary_sensor_entity_id(config_id, desc.key)),
    );
    ids.push(light_entity_id(config_id));
    ids
}

/// AeroGarden integration for gardend
///
/// Polls the vendor cloud on a fixed interval, discovers one set of entities
/// per garden, and fans the cached fields out to the engine as state updates.
pub struct AerogardenIntegration<C: GardenClient> {
    gardens: Arc<Mutex<Gardens<C>>>,
    polling_interval: Duration,
    to_engine: Option<FromIntegrationSender>,
    poll_task: Option<JoinHandle<()>>,
}

impl<C: GardenClient + 'static> AerogardenIntegration<C> {
    pub fn new(client: C, config: &AerogardenConfig) -> Self {
        let polling_interval = Duration::from_secs(config.polling_interval);
        Self {
            gardens: Arc::new(Mutex::new(Gardens::new(client, polling_interval))),
            polling_interval,
            to_engine: None,
            poll_task: None,
        }
    }

    /// Refresh the cache and push discovery and state messages to the engine.
    ///
    /// Runs inline during setup (forced) and from the background polling task
    /// afterwards.
    async fn poll_once(
        gardens: &Mutex<Gardens<C>>,
        known: &mut HashSet<i64>,
        to_engine: &FromIntegrationSender,
        force: bool,
    ) -> Result<(), UpdateError> {
        let mut gardens = gardens.lock().await;
        gardens.update(force).await?;
        let data = gardens.data();

        let current: HashSet<i64> = data.config_ids().into_iter().collect();

        // Gardens deleted from the account take their entities with them
        for config_id in known.difference(&current).copied().collect::<Vec<_>>() {
            known.remove(&config_id);
            info!("Garden {} disappeared from the account", config_id);
            for entity_id in entity_ids_for(config_id) {
                Self::send(to_engine, FromIntegrationMessage::EntityRemoved { entity_id }).await;
            }
        }

        for config_id in current {
            if known.insert(config_id) {
                Self::announce_garden(data, config_id, to_engine).await;
            }
            Self::report_garden_state(data, config_id, to_engine).await;
        }

        Ok(())
    }

    /// Send discovery messages for every entity a newly seen garden exposes
    async fn announce_garden(data: &GardenData, config_id: i64, to_engine: &FromIntegrationSender) {
        let garden_name = data
            .get_garden_name(config_id)
            .unwrap_or_else(|| format!("AeroGarden {}", config_id));
        let device = data.device(config_id);

        info!("Discovered garden: {} ({})", garden_name, config_id);

        for desc in SENSOR_DESCRIPTIONS {
            Self::send(
                to_engine,
                FromIntegrationMessage::EntityDiscovered {
                    entity_id: sensor_entity_id(config_id, desc.key),
                    name: format!("{} {}", garden_name, desc.name),
                    integration_name: INTEGRATION_NAME.to_string(),
                    icon: Some(desc.icon.to_string()),
                    device_class: None,
                    device: device.clone(),
                },
            )
            .await;
        }

        for desc in BINARY_SENSOR_DESCRIPTIONS {
            Self::send(
                to_engine,
                FromIntegrationMessage::EntityDiscovered {
                    entity_id: binary_sensor_entity_id(config_id, desc.key),
                    name: format!("{} {}", garden_name, desc.name),
                    integration_name: INTEGRATION_NAME.to_string(),
                    icon: Some(desc.icon.to_string()),
                    device_class: desc.device_class.map(str::to_string),
                    device: device.clone(),
                },
            )
            .await;
        }

        Self::send(
            to_engine,
            FromIntegrationMessage::EntityDiscovered {
                entity_id: light_entity_id(config_id),
                name: format!("{} {}", garden_name, light::LIGHT_NAME),
                integration_name: INTEGRATION_NAME.to_string(),
                icon: Some(light::LIGHT_ICON.to_string()),
                device_class: None,
                device,
            },
        )
        .await;
    }

    /// Push the current cached state of one garden's entities to the engine
    async fn report_garden_state(
        data: &GardenData,
        config_id: i64,
        to_engine: &FromIntegrationSender,
    ) {
        for desc in SENSOR_DESCRIPTIONS {
            if let Some(value) = (desc.value_fn)(data, config_id) {
                Self::send(
                    to_engine,
                    FromIntegrationMessage::SensorStateChanged {
                        entity_id: sensor_entity_id(config_id, desc.key),
                        value,
                        unit: desc.unit.map(str::to_string),
                    },
                )
                .await;
            }
        }

        for desc in BINARY_SENSOR_DESCRIPTIONS {
            if let Some(on) = (desc.value_fn)(data, config_id) {
                Self::send(
                    to_engine,
                    FromIntegrationMessage::BinarySensorStateChanged {
                        entity_id: binary_sensor_entity_id(config_id, desc.key),
                        on,
                    },
                )
                .await;
            }
        }

        if let Some(state) = light::light_state(data, config_id) {
            Self::send(
                to_engine,
                FromIntegrationMessage::LightStateChanged {
                    entity_id: light_entity_id(config_id),
                    on: state.on,
                    brightness: state.brightness,
                },
            )
            .await;
        }
    }

    async fn send(to_engine: &FromIntegrationSender, msg: FromIntegrationMessage) {
        if let Err(e) = to_engine.send(msg).await {
            warn!("Failed to send message to engine: {}", e);
        }
    }
}

#[async_trait]
impl<C: GardenClient + 'static> Integration for AerogardenIntegration<C> {
    fn name(&self) -> &str {
        INTEGRATION_NAME
    }

    async fn setup(&mut self, tx: FromIntegrationSender) -> Result<(), Box<dyn Error + Send>> {
        self.to_engine = Some(tx.clone());

        // Initial poll runs inline so setup fails loudly on bad credentials
        // or an unreachable host
        let mut known = HashSet::new();
        Self::poll_once(&self.gardens, &mut known, &tx, true)
            .await
            .map_err(|e| -> Box<dyn Error + Send> { Box::new(e) })?;

        info!(
            "AeroGarden integration ready, polling every {:?}",
            self.polling_interval
        );

        let gardens = self.gardens.clone();
        let polling_interval = self.polling_interval;
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(polling_interval);
            // the first tick completes immediately and setup already polled
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = Self::poll_once(&gardens, &mut known, &tx, false).await {
                    warn!("Garden poll failed: {}", e);
                }
            }
        });
        self.poll_task = Some(task);

        Ok(())
    }

    async fn handle_message(
        &mut self,
        msg: ToIntegrationMessage,
    ) -> Result<(), Box<dyn Error + Send>> {
        match msg {
            ToIntegrationMessage::LightCommand { entity_id, on, .. } => {
                info!("Handling light command for {}: on={}", entity_id, on);

                let config_id =
                    parse_light_entity_id(&entity_id).ok_or_else(|| -> Box<dyn Error + Send> {
                        Box::new(std::io::Error::new(
                            std::io::ErrorKind::NotFound,
                            format!("Not an AeroGarden light entity: {}", entity_id),
                        ))
                    })?;

                let mut gardens = self.gardens.lock().await;
                gardens
                    .toggle_light(config_id, on)
                    .await
                    .map_err(|e| -> Box<dyn Error + Send> { Box::new(e) })?;

                // toggle_light forced a refresh, report what the cloud now claims
                if let Some(to_engine) = &self.to_engine {
                    if let Some(state) = light::light_state(gardens.data(), config_id) {
                        Self::send(
                            to_engine,
                            FromIntegrationMessage::LightStateChanged {
                                entity_id,
                                on: state.on,
                                brightness: state.brightness,
                            },
                        )
                        .await;
                    }
                }
            }
        }
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), Box<dyn Error + Send>> {
        info!("AeroGarden integration shutting down");
        if let Some(task) = self.poll_task.take() {
            task.abort();
        }
        Ok(())
    }
}

impl<C: GardenClient> Drop for AerogardenIntegration<C> {
    fn drop(&mut self) {
        if let Some(task) = self.poll_task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrations::aerogarden::client::MockGardenClient;
    use serde_json::json;
    use std::collections::HashMap;
    use tokio::sync::mpsc;

    const CONFIG_ID: i64 = 123456;

    fn test_config() -> AerogardenConfig {
        AerogardenConfig {
            enabled: true,
            email: "gardener@example.com".to_string(),
            password: "hunter2".to_string(),
            host: "https://unittest.invalid".to_string(),
            polling_interval: 30,
        }
    }

    fn test_records() -> Vec<serde_json::Value> {
        vec![
            // "Herb Garden"
            json!({
                "configID": CONFIG_ID,
                "airGuid": "12:34:56:78:10:AB",
                "chooseGarden": 0,
                "plantedName": "SGVyYiBHYXJkZW4=",
                "plantedDay": 43,
                "nutriRemindDay": 6,
                "pumpLevel": 1,
                "pumpStat": 1,
                "pumpHydro": 0,
                "lightStat": 0,
                "hwVersion": "SW-V1.01",
                "swVersion": "MFW-V0.37",
            }),
            // "Salad Bar", left and right heads of one unit
            json!({
                "configID": CONFIG_ID + 1,
                "airGuid": "98:34:56:78:10:3F",
                "chooseGarden": 0,
                "plantedName": "U2FsYWQgQmFy",
            }),
            json!({
                "configID": CONFIG_ID + 2,
                "airGuid": "98:34:56:78:10:3F",
                "chooseGarden": 1,
                "plantedName": "U2FsYWQgQmFy",
            }),
        ]
    }

    fn drain(
        rx: &mut mpsc::Receiver<FromIntegrationMessage>,
    ) -> Vec<FromIntegrationMessage> {
        let mut messages = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            messages.push(msg);
        }
        messages
    }

    #[test]
    fn light_entity_id_round_trips() {
        let entity_id = light_entity_id(CONFIG_ID);
        assert_eq!(entity_id, "light.aerogarden_123456");
        assert_eq!(parse_light_entity_id(&entity_id), Some(CONFIG_ID));
        assert_eq!(parse_light_entity_id("light.other_123456"), None);
        assert_eq!(parse_light_entity_id("light.aerogarden_abc"), None);
    }

    #[tokio::test]
    async fn setup_discovers_entities_and_reports_state() {
        let client = MockGardenClient::with_devices(test_records());
        let mut integration = AerogardenIntegration::new(client, &test_config());
        let (tx, mut rx) = mpsc::channel(256);

        integration.setup(tx).await.unwrap();

        let mut discovered: HashMap<String, (String, Option<String>)> = HashMap::new();
        let mut sensors: HashMap<String, String> = HashMap::new();
        let mut binary_sensors: HashMap<String, bool> = HashMap::new();
        let mut lights: HashMap<String, bool> = HashMap::new();

        for msg in drain(&mut rx) {
            match msg {
                FromIntegrationMessage::EntityDiscovered {
                    entity_id,
                    name,
                    device,
                    ..
                } => {
                    discovered.insert(entity_id, (name, device.map(|d| d.id)));
                }
                FromIntegrationMessage::SensorStateChanged {
                    entity_id, value, ..
                } => {
                    sensors.insert(entity_id, value);
                }
                FromIntegrationMessage::BinarySensorStateChanged { entity_id, on } => {
                    binary_sensors.insert(entity_id, on);
                }
                FromIntegrationMessage::LightStateChanged { entity_id, on, .. } => {
                    lights.insert(entity_id, on);
                }
                FromIntegrationMessage::EntityRemoved { .. } => {
                    panic!("nothing should be removed on first poll")
                }
            }
        }

        // three gardens, 3 sensors + 4 binary sensors + 1 light each
        assert_eq!(discovered.len(), 24);

        let (name, device_id) = &discovered["light.aerogarden_123456"];
        assert_eq!(name, "Herb Garden Grow Light");
        assert_eq!(device_id.as_deref(), Some("12:34:56:78:10:AB"));

        // multi-garden heads are labelled by side
        let (left_name, _) = &discovered[&sensor_entity_id(CONFIG_ID + 1, "planted_days")];
        assert_eq!(left_name, "Salad Bar (Left) Planted Days");
        let (right_name, _) = &discovered[&sensor_entity_id(CONFIG_ID + 2, "planted_days")];
        assert_eq!(right_name, "Salad Bar (Right) Planted Days");

        // only the fully populated garden reports states
        assert_eq!(
            sensors[&sensor_entity_id(CONFIG_ID, "pump_level")],
            "Medium"
        );
        assert_eq!(sensors[&sensor_entity_id(CONFIG_ID, "planted_days")], "43");
        assert!(binary_sensors[&binary_sensor_entity_id(CONFIG_ID, "pump_status")]);
        assert!(!binary_sensors[&binary_sensor_entity_id(CONFIG_ID, "needs_nutrients")]);
        assert!(!lights[&light_entity_id(CONFIG_ID)]);
        assert!(!sensors.contains_key(&sensor_entity_id(CONFIG_ID + 1, "planted_days")));
    }

    #[tokio::test]
    async fn setup_fails_on_login_failure() {
        let mut client = MockGardenClient::with_devices(vec![]);
        client.fail_login = true;
        let mut integration = AerogardenIntegration::new(client, &test_config());
        let (tx, _rx) = mpsc::channel(256);

        assert!(integration.setup(tx).await.is_err());
    }

    #[tokio::test]
    async fn light_command_patches_config_and_reports() {
        let client = MockGardenClient::with_devices(test_records());
        let mut integration = AerogardenIntegration::new(client, &test_config());
        let (tx, mut rx) = mpsc::channel(256);

        integration.setup(tx).await.unwrap();
        drain(&mut rx);

        integration
            .handle_message(ToIntegrationMessage::LightCommand {
                entity_id: light_entity_id(CONFIG_ID),
                on: true,
                brightness: None,
            })
            .await
            .unwrap();

        {
            let mut gardens = integration.gardens.lock().await;
            let client = gardens.client_mut();
            assert_eq!(client.config_updates.len(), 1);
            let (air_guid, choose_garden, patch) = &client.config_updates[0];
            assert_eq!(air_guid, "12:34:56:78:10:AB");
            assert_eq!(*choose_garden, 0);
            assert_eq!(patch, r#"{"lightStat":1}"#);
        }

        // the forced refresh re-reads the (unchanged) cloud state
        let reported = drain(&mut rx);
        assert!(reported.iter().any(|msg| matches!(
            msg,
            FromIntegrationMessage::LightStateChanged { entity_id, on: false, .. }
                if entity_id == &light_entity_id(CONFIG_ID)
        )));
    }

    #[tokio::test]
    async fn light_command_for_foreign_entity_is_an_error() {
        let client = MockGardenClient::with_devices(test_records());
        let mut integration = AerogardenIntegration::new(client, &test_config());
        let (tx, mut _rx) = mpsc::channel(256);
        integration.setup(tx).await.unwrap();

        let result = integration
            .handle_message(ToIntegrationMessage::LightCommand {
                entity_id: "light.kitchen".to_string(),
                on: true,
                brightness: None,
            })
            .await;

        assert!(result.is_err());
    }
}
