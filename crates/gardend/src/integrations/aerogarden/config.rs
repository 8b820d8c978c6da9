use serde::Deserialize;

/// The vendor's fixed cloud host
pub const DEFAULT_HOST: &str = "https://app3.aerogarden.com:8443";

/// Polling faster than this hammers the vendor API for no benefit
pub const MIN_POLLING_INTERVAL: u64 = 5;

fn default_enabled() -> bool {
    true
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_polling_interval() -> u64 {
    30
}

/// Configuration for the AeroGarden integration
#[derive(Debug, Clone, Deserialize)]
pub struct AerogardenConfig {
    /// Enable the integration (default: true when the section is present)
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Account email used to log into the vendor cloud
    pub email: String,

    /// Account password
    pub password: String,

    /// Vendor API base URL (default: the fixed production host)
    #[serde(default = "default_host")]
    pub host: String,

    /// Seconds between cloud polls (default: 30, minimum: 5)
    #[serde(default = "default_polling_interval")]
    pub polling_interval: u64,
}

impl AerogardenConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.polling_interval < MIN_POLLING_INTERVAL {
            return Err(format!(
                "aerogarden polling_interval must be at least {} seconds",
                MIN_POLLING_INTERVAL
            ));
        }
        Ok(())
    }
}
