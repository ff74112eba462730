use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Seconds between synthesized uplinks
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Device id the demo feed reports as
    #[serde(default = "default_device_id")]
    pub device_id: String,

    /// User the ingestion calls are attributed to
    #[serde(default = "default_user_id")]
    pub user_id: String,

    /// Re-deliver every Nth frame as a duplicate reception (0 disables)
    #[serde(default = "default_duplicate_every")]
    pub duplicate_every: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_interval() -> u64 {
    5
}

fn default_device_id() -> String {
    "1D8B22".to_string()
}

fn default_user_id() -> String {
    "demo-user".to_string()
}

fn default_duplicate_every() -> u64 {
    4
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::with_prefix("UPLINK"))
            .build()?
            .try_deserialize()
    }
}
