use esp_hal::gpio::AnyPin;
use esp_hal::{
    delay::Delay,
    gpio::{DriveMode, Flex, OutputConfig, Pull},
    i2c::master::{Config as I2cConfig, I2c},
    peripherals::I2C0,
    time::Rate,
};
use log::{info, warn};
use smart_monitor_core::sensors::{Dht, DhtKind, Ina219};

const I2C_FREQ_KHZ: u32 = 100;

pub type PowerMonitorHardware<'a> = Ina219<I2c<'a, esp_hal::Blocking>>;
pub type ClimateHardware<'a> = Dht<Flex<'a>, Delay>;

/// Create the blocking I2C bus the power monitor sits on.
pub fn create_i2c_bus<'a, SDA, SCL>(
    i2c_periph: I2C0<'a>,
    sda: SDA,
    scl: SCL,
) -> Result<I2c<'a, esp_hal::Blocking>, &'static str>
where
    SDA: Into<AnyPin<'a>>,
    SCL: Into<AnyPin<'a>>,
{
    let i2c = I2c::new(
        i2c_periph,
        I2cConfig::default().with_frequency(Rate::from_khz(I2C_FREQ_KHZ)),
    )
    .map_err(|_| "Invalid I2C configuration")?
    .with_sda(sda.into())
    .with_scl(scl.into());

    Ok(i2c)
}

/// Configure a pin as open-drain with pull-up for the DHT single-wire bus.
pub fn create_dht_pin<'a, PIN>(pin: PIN) -> Flex<'a>
where
    PIN: Into<AnyPin<'a>>,
{
    let mut flex = Flex::new(pin.into());
    flex.apply_output_config(
        &OutputConfig::default()
            .with_drive_mode(DriveMode::OpenDrain)
            .with_pull(Pull::Up),
    );
    flex.set_high();
    flex.set_input_enable(true);
    flex.set_output_enable(true);
    flex
}

pub struct SensorHardware<'a> {
    pub power: PowerMonitorHardware<'a>,
    pub climate: ClimateHardware<'a>,
}

impl<'a> SensorHardware<'a> {
    pub fn new<SDA, SCL, DATA>(
        i2c_periph: I2C0<'a>,
        sda: SDA,
        scl: SCL,
        dht_data: DATA,
        dht_kind: DhtKind,
    ) -> Result<Self, &'static str>
    where
        SDA: Into<AnyPin<'a>>,
        SCL: Into<AnyPin<'a>>,
        DATA: Into<AnyPin<'a>>,
    {
        let i2c = create_i2c_bus(i2c_periph, sda, scl)?;

        Ok(Self {
            power: Ina219::new(i2c),
            climate: Dht::new(create_dht_pin(dht_data), Delay::new(), dht_kind),
        })
    }

    /// Bring both sensors up. Failures are logged and reads will be masked.
    pub fn init(&mut self) {
        if let Err(e) = self.power.init() {
            warn!("[INA219] Readings will be zero until the chip answers: {}", e);
        }

        match self.climate.init() {
            Ok(()) => info!("[{}] Ready", self.climate.kind().name()),
            Err(e) => warn!("[{}] Init failed: {}", self.climate.kind().name(), e),
        }
    }
}
