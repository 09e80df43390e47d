//! INA219 high-side current/power monitor
//!
//! Configured with the 32 V / 2 A profile: 0.1 mA current LSB and 2 mW power
//! LSB with a 0.1 Ω shunt.

use embedded_hal::i2c::I2c;
use log::{error, info};

use crate::error::SensorError;
use crate::model::PowerSample;
use crate::traits::PowerMonitor;

pub const DEFAULT_ADDRESS: u8 = 0x40;

const SENSOR: &str = "INA219";

const REG_CONFIG: u8 = 0x00;
const REG_BUS_VOLTAGE: u8 = 0x02;
const REG_POWER: u8 = 0x03;
const REG_CURRENT: u8 = 0x04;
const REG_CALIBRATION: u8 = 0x05;

/// 32 V bus range, /8 gain (±320 mV), 12-bit bus and shunt ADC, continuous.
const CONFIG_32V_2A: u16 = 0x2000 | 0x1800 | 0x0180 | 0x0018 | 0x0007;
const CALIBRATION_32V_2A: u16 = 4096;
const CURRENT_DIVIDER_MA: f32 = 10.0;
const POWER_MULTIPLIER_MW: f32 = 2.0;
const BUS_VOLTAGE_LSB_MV: u16 = 4;

pub struct Ina219<I> {
    i2c: I,
    address: u8,
}

impl<I: I2c> Ina219<I> {
    pub fn new(i2c: I) -> Self {
        Self::with_address(i2c, DEFAULT_ADDRESS)
    }

    pub fn with_address(i2c: I, address: u8) -> Self {
        Self { i2c, address }
    }

    /// Program calibration and configuration.
    pub fn init(&mut self) -> Result<(), SensorError> {
        self.write_register(REG_CALIBRATION, CALIBRATION_32V_2A)
            .and_then(|()| self.write_register(REG_CONFIG, CONFIG_32V_2A))
            .inspect_err(|_| error!("Failed to find INA219 chip"))?;
        info!("[INA219] Initialized at 0x{:02X}", self.address);
        Ok(())
    }

    pub fn bus_voltage_v(&mut self) -> Result<f32, SensorError> {
        let raw = self.read_register(REG_BUS_VOLTAGE)?;
        let millivolts = (raw >> 3) * BUS_VOLTAGE_LSB_MV;
        Ok(millivolts as f32 * 0.001)
    }

    pub fn current_ma(&mut self) -> Result<f32, SensorError> {
        // A brown-out resets the calibration register, which zeroes current.
        self.write_register(REG_CALIBRATION, CALIBRATION_32V_2A)?;
        let raw = self.read_register(REG_CURRENT)? as i16;
        Ok(raw as f32 / CURRENT_DIVIDER_MA)
    }

    pub fn power_mw(&mut self) -> Result<f32, SensorError> {
        self.write_register(REG_CALIBRATION, CALIBRATION_32V_2A)?;
        let raw = self.read_register(REG_POWER)? as i16;
        Ok(raw as f32 * POWER_MULTIPLIER_MW)
    }

    pub fn release(self) -> I {
        self.i2c
    }

    fn write_register(&mut self, register: u8, value: u16) -> Result<(), SensorError> {
        let [hi, lo] = value.to_be_bytes();
        self.i2c
            .write(self.address, &[register, hi, lo])
            .map_err(|_| SensorError::Bus { sensor: SENSOR })
    }

    fn read_register(&mut self, register: u8) -> Result<u16, SensorError> {
        let mut buf = [0u8; 2];
        self.i2c
            .write_read(self.address, &[register], &mut buf)
            .map_err(|_| SensorError::Bus { sensor: SENSOR })?;
        Ok(u16::from_be_bytes(buf))
    }
}

impl<I: I2c> PowerMonitor for Ina219<I> {
    fn read_power(&mut self) -> Result<PowerSample, SensorError> {
        Ok(PowerSample {
            bus_voltage_v: self.bus_voltage_v()?,
            current_ma: self.current_ma()?,
            power_mw: self.power_mw()?,
        })
    }
}
