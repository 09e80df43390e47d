//! Immutable runtime configuration
//!
//! Built once at startup from the values baked in at compile time and handed
//! to the loop by reference. Nothing in here is mutated afterwards.

use crate::error::ConfigError;
use crate::http::Endpoint;
use crate::retry::RetryPolicy;
use crate::sensors::dht::DhtKind;

pub const DEFAULT_REPORT_INTERVAL_MS: u32 = 2_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WifiConfig<'a> {
    pub ssid: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config<'a> {
    pub wifi: WifiConfig<'a>,
    pub endpoint: Endpoint<'a>,
    pub dht_kind: DhtKind,
    pub report_interval_ms: u32,
    pub connect_retry: RetryPolicy,
}

impl<'a> Config<'a> {
    /// Assemble a configuration from raw strings.
    ///
    /// An empty `report_interval_ms` selects the 2 s default.
    pub fn from_parts(
        ssid: &'a str,
        password: &'a str,
        server_url: &'a str,
        dht_kind: &str,
        report_interval_ms: &str,
    ) -> Result<Self, ConfigError> {
        if ssid.is_empty() {
            return Err(ConfigError::MissingSsid);
        }

        let report_interval_ms = match report_interval_ms.trim() {
            "" => DEFAULT_REPORT_INTERVAL_MS,
            raw => match raw.parse::<u32>() {
                Ok(ms) if ms > 0 => ms,
                _ => return Err(ConfigError::InvalidInterval),
            },
        };

        Ok(Self {
            wifi: WifiConfig { ssid, password },
            endpoint: Endpoint::parse(server_url)?,
            dht_kind: dht_kind.parse()?,
            report_interval_ms,
            connect_retry: RetryPolicy::default(),
        })
    }

    pub fn with_connect_retry(mut self, policy: RetryPolicy) -> Self {
        self.connect_retry = policy;
        self
    }
}
