//! DHT11 / DHT22 single-wire temperature and humidity sensors
//!
//! The data pin must be open-drain with a pull-up: driving it high releases
//! the line, and reads see whatever the sensor is doing.
//!
//! Pulse lengths are counted in 1 µs delay steps. The count is only used to
//! compare a bit's high pulse against the low pulse that precedes it, so the
//! real length of a step does not matter as long as it is stable.

use core::str::FromStr;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};

use crate::error::{ConfigError, SensorError};
use crate::model::ClimateSample;
use crate::traits::ClimateSensor;

/// Upper bound on any single pulse, in delay steps.
const MAX_PULSE_STEPS: u32 = 1_000;
const RELEASE_US: u32 = 30;
const FRAME_BITS: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DhtKind {
    Dht11,
    Dht22,
}

impl DhtKind {
    pub const fn name(self) -> &'static str {
        match self {
            DhtKind::Dht11 => "DHT11",
            DhtKind::Dht22 => "DHT22",
        }
    }

    const fn start_low_us(self) -> u32 {
        match self {
            DhtKind::Dht11 => 20_000,
            DhtKind::Dht22 => 1_100,
        }
    }
}

impl FromStr for DhtKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("DHT11") {
            Ok(DhtKind::Dht11)
        } else if s.eq_ignore_ascii_case("DHT22") || s.eq_ignore_ascii_case("AM2302") {
            Ok(DhtKind::Dht22)
        } else {
            Err(ConfigError::UnknownDhtKind)
        }
    }
}

/// Verify the checksum and convert a raw 5-byte frame.
pub fn decode_frame(kind: DhtKind, frame: [u8; 5]) -> Result<ClimateSample, SensorError> {
    let expected = frame[..4]
        .iter()
        .fold(0u8, |sum, byte| sum.wrapping_add(*byte));
    if expected != frame[4] {
        return Err(SensorError::Checksum {
            sensor: kind.name(),
            expected,
            actual: frame[4],
        });
    }

    let sample = match kind {
        DhtKind::Dht11 => {
            let humidity = frame[0] as f32 + frame[1] as f32 * 0.1;
            let mut temperature = frame[2] as f32 + (frame[3] & 0x0F) as f32 * 0.1;
            if frame[3] & 0x80 != 0 {
                temperature = -temperature;
            }
            ClimateSample {
                temperature_c: temperature,
                humidity_percent: humidity,
            }
        }
        DhtKind::Dht22 => {
            let humidity = u16::from_be_bytes([frame[0], frame[1]]) as f32 * 0.1;
            let mut temperature = u16::from_be_bytes([frame[2] & 0x7F, frame[3]]) as f32 * 0.1;
            if frame[2] & 0x80 != 0 {
                temperature = -temperature;
            }
            ClimateSample {
                temperature_c: temperature,
                humidity_percent: humidity,
            }
        }
    };
    Ok(sample)
}

pub struct Dht<P, D> {
    pin: P,
    delay: D,
    kind: DhtKind,
}

impl<P, D> Dht<P, D>
where
    P: InputPin + OutputPin,
    D: DelayNs,
{
    pub fn new(pin: P, delay: D, kind: DhtKind) -> Self {
        Self { pin, delay, kind }
    }

    pub fn kind(&self) -> DhtKind {
        self.kind
    }

    /// Release the line so the sensor idles high before the first read.
    pub fn init(&mut self) -> Result<(), SensorError> {
        self.pin.set_high().map_err(|_| self.pin_error())
    }

    pub fn read(&mut self) -> Result<ClimateSample, SensorError> {
        let frame = self.read_frame()?;
        decode_frame(self.kind, frame)
    }

    fn read_frame(&mut self) -> Result<[u8; 5], SensorError> {
        self.pin.set_low().map_err(|_| self.pin_error())?;
        self.delay.delay_us(self.kind.start_low_us());
        self.pin.set_high().map_err(|_| self.pin_error())?;
        self.delay.delay_us(RELEASE_US);

        critical_section::with(|_| self.read_waveform())
    }

    fn read_waveform(&mut self) -> Result<[u8; 5], SensorError> {
        // Line floats high until the sensor answers with ~80 µs low, ~80 µs high.
        self.pulse(true, "response")?;
        self.pulse(false, "response low")?;
        self.pulse(true, "response high")?;

        let mut frame = [0u8; 5];
        for bit in 0..FRAME_BITS {
            let low = self.pulse(false, "bit start")?;
            let high = self.pulse(true, "bit value")?;
            let byte = &mut frame[bit / 8];
            *byte <<= 1;
            if high > low {
                *byte |= 1;
            }
        }
        Ok(frame)
    }

    /// Count steps while the line stays at `level`.
    fn pulse(&mut self, level: bool, phase: &'static str) -> Result<u32, SensorError> {
        let mut steps = 0;
        while self.pin.is_high().map_err(|_| self.pin_error())? == level {
            steps += 1;
            if steps > MAX_PULSE_STEPS {
                return Err(SensorError::Timeout {
                    sensor: self.kind.name(),
                    phase,
                });
            }
            self.delay.delay_us(1);
        }
        Ok(steps)
    }

    fn pin_error(&self) -> SensorError {
        SensorError::Pin {
            sensor: self.kind.name(),
        }
    }
}

impl<P, D> ClimateSensor for Dht<P, D>
where
    P: InputPin + OutputPin,
    D: DelayNs,
{
    fn read_climate(&mut self) -> Result<ClimateSample, SensorError> {
        self.read()
    }
}
