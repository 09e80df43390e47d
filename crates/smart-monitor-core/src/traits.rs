//! Hardware abstraction traits

use core::fmt::Debug;

use crate::error::{DeliveryError, SensorError};
use crate::http::Endpoint;
use crate::model::{ClimateSample, PowerSample};

/// Trait for bus voltage / current / power monitors
pub trait PowerMonitor {
    fn read_power(&mut self) -> Result<PowerSample, SensorError>;
}

/// Trait for temperature/humidity sensors
pub trait ClimateSensor {
    fn read_climate(&mut self) -> Result<ClimateSample, SensorError>;
}

/// Network association state as reported by the platform
pub trait Link {
    fn is_connected(&self) -> bool;
}

/// One HTTP POST per call; returns the status code the server sent.
pub trait Transport {
    fn post(
        &mut self,
        endpoint: &Endpoint<'_>,
        body: &str,
    ) -> impl Future<Output = Result<u16, DeliveryError>>;
}

/// A single attempt at establishing network reachability
pub trait Connector {
    type Output;
    type Error: Debug;

    fn try_connect(&mut self) -> impl Future<Output = Result<Self::Output, Self::Error>>;
}

/// A connector that can tell when an established link has dropped
pub trait Reconnect: Connector {
    /// Resolves once the link is down. Returns at once if it already is.
    fn wait_for_disconnect(&mut self) -> impl Future<Output = ()>;
}
