//! Deployment settings baked in by `build.rs`

use smart_monitor_core::{Config, ConfigError};

pub const WIFI_SSID: &str = env!("SMART_MONITOR_WIFI_SSID");
pub const WIFI_PASSWORD: &str = env!("SMART_MONITOR_WIFI_PASSWORD");
pub const SERVER_URL: &str = env!("SMART_MONITOR_SERVER_URL");
pub const DHT_KIND: &str = env!("SMART_MONITOR_DHT_KIND");
pub const REPORT_INTERVAL_MS: &str = env!("SMART_MONITOR_REPORT_INTERVAL_MS");

pub fn load() -> Result<Config<'static>, ConfigError> {
    Config::from_parts(
        WIFI_SSID,
        WIFI_PASSWORD,
        SERVER_URL,
        DHT_KIND,
        REPORT_INTERVAL_MS,
    )
}
