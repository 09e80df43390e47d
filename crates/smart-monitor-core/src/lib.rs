//! Hardware-independent core of the smart-monitor firmware
//!
//! Everything the sample-and-report loop needs that does not touch ESP32
//! peripherals lives here: the reading model and its JSON encoding, the
//! immutable configuration, HTTP/1.1 request framing, startup backoff, the
//! INA219 and DHT drivers (over `embedded-hal`), and the loop itself (over the
//! traits in [`traits`]).
//!
//! The crate is `no_std` on target and builds against `std` for host tests.

#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod error;
pub mod http;
pub mod logic;
pub mod model;
pub mod retry;
pub mod sensors;
pub mod traits;

pub use config::Config;
pub use error::{ConfigError, DeliveryError, EncodeError, ReportError, SensorError};
pub use logic::{IterationOutcome, Reporter};
pub use model::{ClimateSample, PowerSample, Reading};
