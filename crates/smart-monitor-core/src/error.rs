//! Error types shared by the core crate and the firmware

use thiserror_no_std::Error;

/// Failures reported by the sensor drivers.
///
/// None of these are fatal: the loop masks a failed read to `0.0`.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    #[error("{sensor}: bus transfer failed")]
    Bus { sensor: &'static str },
    #[error("{sensor}: pin access failed")]
    Pin { sensor: &'static str },
    #[error("{sensor}: timed out waiting for {phase}")]
    Timeout {
        sensor: &'static str,
        phase: &'static str,
    },
    #[error("{sensor}: checksum mismatch (expected {expected:#04x}, got {actual:#04x})")]
    Checksum {
        sensor: &'static str,
        expected: u8,
        actual: u8,
    },
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Wi-Fi SSID is empty")]
    MissingSsid,
    #[error("server URL must start with http://")]
    UnsupportedScheme,
    #[error("server URL has no host")]
    MissingHost,
    #[error("server URL has an invalid port")]
    InvalidPort,
    #[error("unknown DHT sensor kind")]
    UnknownDhtKind,
    #[error("report interval must be a positive number of milliseconds")]
    InvalidInterval,
}

/// Why a delivery produced no HTTP status.
///
/// [`DeliveryError::code`] maps each variant onto the negative codes the ESP32
/// Arduino `HTTPClient` reports.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("connection refused")]
    ConnectionRefused,
    #[error("host lookup failed")]
    DnsFailed,
    #[error("sending request head failed")]
    SendHeaderFailed,
    #[error("sending payload failed")]
    SendPayloadFailed,
    #[error("not connected")]
    NotConnected,
    #[error("connection lost")]
    ConnectionLost,
    #[error("response is not HTTP")]
    NoHttpServer,
    #[error("read timeout")]
    ReadTimeout,
}

impl DeliveryError {
    pub const fn code(self) -> i16 {
        match self {
            DeliveryError::ConnectionRefused | DeliveryError::DnsFailed => -1,
            DeliveryError::SendHeaderFailed => -2,
            DeliveryError::SendPayloadFailed => -3,
            DeliveryError::NotConnected => -4,
            DeliveryError::ConnectionLost => -5,
            DeliveryError::NoHttpServer => -7,
            DeliveryError::ReadTimeout => -11,
        }
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeError {
    #[error("encoded output exceeds buffer capacity")]
    Overflow,
}

impl From<core::fmt::Error> for EncodeError {
    fn from(_: core::fmt::Error) -> Self {
        EncodeError::Overflow
    }
}

/// Why an iteration did not end in an HTTP status.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportError {
    #[error("payload encoding failed: {0}")]
    Encode(EncodeError),
    #[error("delivery failed: {0}")]
    Delivery(DeliveryError),
}

impl ReportError {
    /// Negative code for the `Error on sending POST` log line.
    pub const fn code(self) -> i16 {
        match self {
            ReportError::Encode(_) => DeliveryError::SendPayloadFailed.code(),
            ReportError::Delivery(e) => e.code(),
        }
    }
}

impl From<EncodeError> for ReportError {
    fn from(e: EncodeError) -> Self {
        ReportError::Encode(e)
    }
}

impl From<DeliveryError> for ReportError {
    fn from(e: DeliveryError) -> Self {
        ReportError::Delivery(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivery_codes_match_http_client() {
        assert_eq!(DeliveryError::ConnectionRefused.code(), -1);
        assert_eq!(DeliveryError::NotConnected.code(), -4);
        assert_eq!(DeliveryError::ReadTimeout.code(), -11);
        assert_eq!(ReportError::from(DeliveryError::NoHttpServer).code(), -7);
    }
}
