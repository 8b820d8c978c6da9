#[allow(clippy::module_inception)]
mod aerogarden;
mod binary_sensor;
mod client;
mod config;
mod garden;
mod light;
mod sensor;

use linkme::distributed_slice;
use tracing::info;

use crate::engine::IntegrationContext;
use crate::engine::IntegrationFactoryResult;
use crate::engine::INTEGRATION_REGISTRY;

pub use aerogarden::AerogardenIntegration;
pub use client::HttpGardenClient;
pub use config::AerogardenConfig;

#[distributed_slice(INTEGRATION_REGISTRY)]
fn init_aerogarden(ctx: &IntegrationContext) -> IntegrationFactoryResult {
    let Some(config) = &ctx.config.integrations.aerogarden else {
        return Ok(None);
    };
    if !config.enabled {
        info!("AeroGarden integration is disabled");
        return Ok(None);
    }

    let client = HttpGardenClient::new(&config.host, &config.email, &config.password)
        .map_err(|e| anyhow::anyhow!("failed to build AeroGarden client: {}", e))?;

    Ok(Some(Box::new(AerogardenIntegration::new(client, config))))
}
