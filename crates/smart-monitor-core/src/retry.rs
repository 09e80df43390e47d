//! Bounded retry with exponential backoff for startup link establishment

use core::fmt::Debug;

use embedded_hal_async::delay::DelayNs;
use log::{info, warn};
use thiserror_no_std::Error;

use crate::traits::{Connector, Reconnect};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay_ms: u32,
    pub max_delay_ms: u32,
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_delay_ms: 500,
            max_delay_ms: 8_000,
            multiplier: 2,
        }
    }
}

impl RetryPolicy {
    /// Delays to wait between attempts; yields `max_attempts - 1` values.
    pub fn backoff(&self) -> Backoff {
        Backoff {
            next_delay_ms: self.initial_delay_ms.min(self.max_delay_ms),
            remaining: self.max_attempts.saturating_sub(1),
            policy: *self,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Backoff {
    policy: RetryPolicy,
    next_delay_ms: u32,
    remaining: u32,
}

impl Iterator for Backoff {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let delay = self.next_delay_ms;
        self.next_delay_ms = delay
            .saturating_mul(self.policy.multiplier.max(1))
            .min(self.policy.max_delay_ms);
        Some(delay)
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectError<E: Debug> {
    #[error("gave up after {attempts} attempts, last error: {last:?}")]
    Exhausted { attempts: u32, last: E },
    #[error("retry policy allows no attempts")]
    NoAttempts,
}

/// Drive `connector` until it succeeds or `policy` runs out of attempts.
pub async fn connect_with_backoff<C, D>(
    connector: &mut C,
    policy: &RetryPolicy,
    delay: &mut D,
) -> Result<C::Output, ConnectError<C::Error>>
where
    C: Connector,
    D: DelayNs,
{
    if policy.max_attempts == 0 {
        return Err(ConnectError::NoAttempts);
    }

    let mut backoff = policy.backoff();
    let mut attempt = 1;
    loop {
        match connector.try_connect().await {
            Ok(output) => {
                if attempt > 1 {
                    info!("Connected on attempt {}", attempt);
                }
                return Ok(output);
            }
            Err(e) => match backoff.next() {
                Some(wait_ms) => {
                    warn!(
                        "Connect attempt {}/{} failed: {:?}; retrying in {} ms",
                        attempt, policy.max_attempts, e, wait_ms
                    );
                    delay.delay_ms(wait_ms).await;
                    attempt += 1;
                }
                None => {
                    return Err(ConnectError::Exhausted {
                        attempts: attempt,
                        last: e,
                    });
                }
            },
        }
    }
}

/// Wait for the link to drop, then bring it back.
///
/// Runs rounds of [`connect_with_backoff`] with `pause_ms` between them until
/// one succeeds.
pub async fn reconnect<C, D>(
    connector: &mut C,
    policy: &RetryPolicy,
    delay: &mut D,
    pause_ms: u32,
) -> C::Output
where
    C: Reconnect,
    D: DelayNs,
{
    connector.wait_for_disconnect().await;
    warn!("Link lost, reconnecting");

    loop {
        match connect_with_backoff(connector, policy, delay).await {
            Ok(output) => return output,
            Err(e) => {
                warn!("Reconnect failed: {}; next round in {} ms", e, pause_ms);
                delay.delay_ms(pause_ms).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::block_on;

    #[derive(Default)]
    struct RecordingDelay {
        waits_ms: Vec<u32>,
    }

    impl DelayNs for RecordingDelay {
        async fn delay_ns(&mut self, ns: u32) {
            self.waits_ms.push(ns / 1_000_000);
        }

        async fn delay_ms(&mut self, ms: u32) {
            self.waits_ms.push(ms);
        }
    }

    /// Fails until `succeed_on` attempts have been made.
    struct FlakyConnector {
        attempts: u32,
        succeed_on: Option<u32>,
        disconnects_seen: u32,
    }

    impl FlakyConnector {
        fn new(succeed_on: Option<u32>) -> Self {
            Self {
                attempts: 0,
                succeed_on,
                disconnects_seen: 0,
            }
        }
    }

    impl Connector for FlakyConnector {
        type Output = u32;
        type Error = &'static str;

        async fn try_connect(&mut self) -> Result<u32, &'static str> {
            self.attempts += 1;
            match self.succeed_on {
                Some(n) if self.attempts >= n => Ok(self.attempts),
                _ => Err("association failed"),
            }
        }
    }

    impl Reconnect for FlakyConnector {
        async fn wait_for_disconnect(&mut self) {
            self.disconnects_seen += 1;
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let delays: Vec<u32> = RetryPolicy::default().backoff().collect();
        assert_eq!(
            delays,
            vec![500, 1_000, 2_000, 4_000, 8_000, 8_000, 8_000, 8_000, 8_000]
        );
    }

    #[test]
    fn single_attempt_has_no_delays() {
        let policy = RetryPolicy {
            max_attempts: 1,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.backoff().count(), 0);
    }

    #[test]
    fn succeeds_first_try_without_waiting() {
        let mut connector = FlakyConnector::new(Some(1));
        let mut delay = RecordingDelay::default();

        let result = block_on(connect_with_backoff(
            &mut connector,
            &RetryPolicy::default(),
            &mut delay,
        ));

        assert_eq!(result, Ok(1));
        assert!(delay.waits_ms.is_empty());
    }

    #[test]
    fn stops_retrying_after_success() {
        let mut connector = FlakyConnector::new(Some(3));
        let mut delay = RecordingDelay::default();

        let result = block_on(connect_with_backoff(
            &mut connector,
            &RetryPolicy::default(),
            &mut delay,
        ));

        assert_eq!(result, Ok(3));
        assert_eq!(connector.attempts, 3);
        assert_eq!(delay.waits_ms, vec![500, 1_000]);
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let policy = RetryPolicy {
            max_attempts: 4,
            initial_delay_ms: 100,
            max_delay_ms: 250,
            multiplier: 2,
        };
        let mut connector = FlakyConnector::new(None);
        let mut delay = RecordingDelay::default();

        let result = block_on(connect_with_backoff(&mut connector, &policy, &mut delay));

        assert_eq!(
            result,
            Err(ConnectError::Exhausted {
                attempts: 4,
                last: "association failed"
            })
        );
        assert_eq!(connector.attempts, 4);
        assert_eq!(delay.waits_ms, vec![100, 200, 250]);
    }

    #[test]
    fn zero_attempts_never_calls_connector() {
        let policy = RetryPolicy {
            max_attempts: 0,
            ..RetryPolicy::default()
        };
        let mut connector = FlakyConnector::new(Some(1));
        let mut delay = RecordingDelay::default();

        let result = block_on(connect_with_backoff(&mut connector, &policy, &mut delay));

        assert_eq!(result, Err(ConnectError::NoAttempts));
        assert_eq!(connector.attempts, 0);
    }

    #[test]
    fn reconnect_waits_for_drop_then_retries_rounds() {
        let policy = RetryPolicy {
            max_attempts: 2,
            initial_delay_ms: 100,
            max_delay_ms: 100,
            multiplier: 2,
        };
        let mut connector = FlakyConnector::new(Some(3));
        let mut delay = RecordingDelay::default();

        let output = block_on(reconnect(&mut connector, &policy, &mut delay, 5_000));

        assert_eq!(output, 3);
        assert_eq!(connector.disconnects_seen, 1);
        assert_eq!(delay.waits_ms, vec![100, 5_000]);
    }

    #[test]
    fn reconnect_after_drop_needs_no_pause_when_first_try_works() {
        let mut connector = FlakyConnector::new(Some(1));
        let mut delay = RecordingDelay::default();

        let output = block_on(reconnect(
            &mut connector,
            &RetryPolicy::default(),
            &mut delay,
            5_000,
        ));

        assert_eq!(output, 1);
        assert_eq!(connector.disconnects_seen, 1);
        assert!(delay.waits_ms.is_empty());
    }
}
