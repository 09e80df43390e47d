// Model of the data sampled and reported by this app

use core::fmt::Write;

use heapless::String;

use crate::error::EncodeError;

/// Upper bound for one encoded reading. Five `f32` fields at two decimals
/// stay well below this even at `f32::MAX`.
pub const READING_JSON_CAPACITY: usize = 384;

pub const LIGHT_LEVEL: u8 = 0;
pub const FAN_STATUS: &str = "ON";
pub const LED_STATUS: &str = "OFF";
pub const SOURCE: &str = "ESP32";

/// One snapshot from the power monitor.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PowerSample {
    pub bus_voltage_v: f32,
    pub current_ma: f32,
    pub power_mw: f32,
}

/// One snapshot from the temperature/humidity sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClimateSample {
    pub temperature_c: f32,
    pub humidity_percent: f32,
}

impl ClimateSample {
    /// Stand-in for a failed read.
    pub const INVALID: Self = Self {
        temperature_c: f32::NAN,
        humidity_percent: f32::NAN,
    };
}

/// One sampled snapshot plus the fixed placeholder fields, sent once.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub voltage: f32,
    pub current: f32,
    pub power: f32,
    pub temperature: f32,
    pub humidity: f32,
}

impl Reading {
    /// Build a reading, replacing NaN climate values with `0.0`.
    pub fn new(power: PowerSample, climate: ClimateSample) -> Self {
        Self {
            voltage: power.bus_voltage_v,
            current: power.current_ma,
            power: power.power_mw,
            temperature: nan_to_zero(climate.temperature_c),
            humidity: nan_to_zero(climate.humidity_percent),
        }
    }

    pub const fn light_level(&self) -> u8 {
        LIGHT_LEVEL
    }

    pub const fn fan_status(&self) -> &'static str {
        FAN_STATUS
    }

    pub const fn led_status(&self) -> &'static str {
        LED_STATUS
    }

    pub const fn source(&self) -> &'static str {
        SOURCE
    }

    /// Encode as the fixed-key JSON object the backend expects.
    ///
    /// Keys are always written in the same order. Numbers use two decimals.
    /// A non-finite number would make the document invalid, so it is written
    /// as `0.00`.
    pub fn write_json<W: Write>(&self, out: &mut W) -> Result<(), EncodeError> {
        out.write_char('{')?;
        write_number(out, "voltage", self.voltage)?;
        out.write_char(',')?;
        write_number(out, "current", self.current)?;
        out.write_char(',')?;
        write_number(out, "power", self.power)?;
        out.write_char(',')?;
        write_number(out, "temperature", self.temperature)?;
        out.write_char(',')?;
        write_number(out, "humidity", self.humidity)?;
        write!(
            out,
            ",\"light_level\":{},\"fan_status\":\"{}\",\"led_status\":\"{}\",\"source\":\"{}\"}}",
            self.light_level(),
            self.fan_status(),
            self.led_status(),
            self.source()
        )?;
        Ok(())
    }

    pub fn to_json(&self) -> Result<String<READING_JSON_CAPACITY>, EncodeError> {
        let mut buffer = String::new();
        self.write_json(&mut buffer)?;
        Ok(buffer)
    }
}

fn nan_to_zero(value: f32) -> f32 {
    if value.is_nan() { 0.0 } else { value }
}

fn write_number<W: Write>(out: &mut W, key: &str, value: f32) -> Result<(), EncodeError> {
    let value = if value.is_finite() { value } else { 0.0 };
    write!(out, "\"{}\":{:.2}", key, value)?;
    Ok(())
}
