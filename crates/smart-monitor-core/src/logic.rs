//! Sample-and-report loop (hardware-independent)

use embedded_hal_async::delay::DelayNs;
use log::{debug, info, warn};

use crate::error::ReportError;
use crate::http::Endpoint;
use crate::model::{ClimateSample, PowerSample, Reading};
use crate::traits::{ClimateSensor, Link, PowerMonitor, Transport};

/// What one pass of the loop did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationOutcome {
    /// Link was down; nothing was read or sent.
    Skipped,
    /// The server answered with this status code.
    Delivered { status: u16 },
    /// No status was obtained. The reading is dropped.
    Failed(ReportError),
}

pub struct Reporter<'a, P, C, L, T> {
    endpoint: Endpoint<'a>,
    power: P,
    climate: C,
    link: L,
    transport: T,
}

impl<'a, P, C, L, T> Reporter<'a, P, C, L, T>
where
    P: PowerMonitor,
    C: ClimateSensor,
    L: Link,
    T: Transport,
{
    pub fn new(endpoint: Endpoint<'a>, power: P, climate: C, link: L, transport: T) -> Self {
        Self {
            endpoint,
            power,
            climate,
            link,
            transport,
        }
    }

    /// Read both sensors. Failed reads are masked to `0.0`.
    pub fn sample(&mut self) -> Reading {
        let power = self.power.read_power().unwrap_or_else(|e| {
            warn!("Power monitor read failed: {}", e);
            PowerSample::default()
        });
        let climate = self.climate.read_climate().unwrap_or_else(|e| {
            debug!("Climate read invalid: {}", e);
            ClimateSample::INVALID
        });
        Reading::new(power, climate)
    }

    /// One pass without the trailing delay.
    pub async fn run_iteration(&mut self) -> IterationOutcome {
        if !self.link.is_connected() {
            debug!("Link down, skipping iteration");
            return IterationOutcome::Skipped;
        }

        let reading = self.sample();
        match self.deliver(&reading).await {
            Ok(status) => {
                info!("Server Response: {}", status);
                IterationOutcome::Delivered { status }
            }
            Err(e) => {
                warn!("Error on sending POST: {} ({})", e.code(), e);
                IterationOutcome::Failed(e)
            }
        }
    }

    /// One pass followed by the fixed delay, whatever the outcome.
    pub async fn step<D: DelayNs>(&mut self, delay: &mut D, interval_ms: u32) -> IterationOutcome {
        let outcome = self.run_iteration().await;
        delay.delay_ms(interval_ms).await;
        outcome
    }

    pub async fn run<D: DelayNs>(&mut self, delay: &mut D, interval_ms: u32) -> ! {
        loop {
            self.step(delay, interval_ms).await;
        }
    }

    async fn deliver(&mut self, reading: &Reading) -> Result<u16, ReportError> {
        let body = reading.to_json()?;
        debug!("POST {} ({} bytes)", self.endpoint.path, body.len());
        let status = self.transport.post(&self.endpoint, body.as_str()).await?;
        Ok(status)
    }
}
