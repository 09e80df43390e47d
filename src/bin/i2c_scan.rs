//! I2C bus scan
//!
//! Probes every 7-bit address on the power monitor bus and reports which ones
//! acknowledge. An INA219 with its address pins grounded answers at 0x40.
//!
//! Following pins are used:
//! - SDA => GPIO21
//! - SCL => GPIO22

#![no_std]
#![no_main]

use embassy_executor::Spawner;
use embassy_time::{Duration, Timer};
use esp_backtrace as _;
use esp_hal::timer::timg::TimerGroup;

use smart_monitor::hardware::create_i2c_bus;
use smart_monitor_core::sensors::ina219::DEFAULT_ADDRESS as INA219_ADDRESS;

esp_bootloader_esp_idf::esp_app_desc!();

#[esp_rtos::main]
async fn main(_spawner: Spawner) {
    let peripherals = esp_hal::init(esp_hal::Config::default());
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    let mut i2c0 = match create_i2c_bus(peripherals.I2C0, peripherals.GPIO21, peripherals.GPIO22)
    {
        Ok(i2c) => i2c,
        Err(e) => {
            esp_println::println!("[ERROR] {}", e);
            loop {
                Timer::after(Duration::from_secs(1)).await;
            }
        }
    };

    esp_println::println!("I2C scan start");
    let mut found = 0;
    for address in 0x03..0x78 {
        if i2c0.write(address, &[]).is_ok() {
            found += 1;
            if address == INA219_ADDRESS {
                esp_println::println!("Found device at address 0x{:02X} (INA219)", address);
            } else {
                esp_println::println!("Found device at address 0x{:02X}", address);
            }
        }
    }
    esp_println::println!("I2C scan done, {} device(s)", found);

    loop {
        Timer::after(Duration::from_millis(100)).await;
    }
}
