//! Wi-Fi and delivery smoke test
//!
//! Associates with the configured network using the same backoff as the
//! firmware, then posts one fixed reading to the configured server and prints
//! the HTTP status or the client error code.

#![no_std]
#![no_main]

use embassy_executor::Spawner;
use embassy_time::{Delay, Duration, Timer};
use esp_backtrace as _;
use esp_hal::timer::timg::TimerGroup;

use smart_monitor::{
    config,
    net::{self, HttpTransport, StackLink, WifiConnector},
};
use smart_monitor_core::{
    ClimateSample, PowerSample, Reading,
    retry::connect_with_backoff,
    traits::{Link, Transport},
};

esp_bootloader_esp_idf::esp_app_desc!();

async fn idle() -> ! {
    loop {
        Timer::after(Duration::from_secs(1)).await;
    }
}

#[esp_rtos::main]
async fn main(spawner: Spawner) -> ! {
    esp_println::logger::init_logger_from_env();
    let peripherals = esp_hal::init(esp_hal::Config::default());

    esp_alloc::heap_allocator!(size: 72 * 1024);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    esp_println::println!("=== Wi-Fi Test ===");

    let config = match config::load() {
        Ok(config) => config,
        Err(e) => {
            esp_println::println!("[FAIL] configuration: {}", e);
            idle().await
        }
    };

    let (controller, stack) = match net::start_network(&spawner, peripherals.WIFI) {
        Ok(network) => network,
        Err(e) => {
            esp_println::println!("[FAIL] network bring-up: {:?}", e);
            idle().await
        }
    };

    let mut connector = WifiConnector::new(controller, stack, config.wifi);
    match connect_with_backoff(&mut connector, &config.connect_retry, &mut Delay).await {
        Ok(ip) => esp_println::println!("[ OK ] associated, IP {}", ip),
        Err(e) => {
            esp_println::println!("[FAIL] association: {}", e);
            idle().await
        }
    }

    let link = StackLink::new(stack);
    esp_println::println!(
        "[{}] link reported up",
        if link.is_connected() { " OK " } else { "FAIL" }
    );

    let reading = Reading::new(
        PowerSample {
            bus_voltage_v: 5.0,
            current_ma: 100.0,
            power_mw: 500.0,
        },
        ClimateSample {
            temperature_c: 21.5,
            humidity_percent: 40.0,
        },
    );
    let body = match reading.to_json() {
        Ok(body) => body,
        Err(e) => {
            esp_println::println!("[FAIL] encode: {}", e);
            idle().await
        }
    };

    esp_println::println!(
        "POST http://{}:{}{}",
        config.endpoint.host,
        config.endpoint.port,
        config.endpoint.path
    );
    esp_println::println!("{}", body.as_str());

    let mut transport = HttpTransport::new(stack);
    match transport.post(&config.endpoint, &body).await {
        Ok(status) => esp_println::println!("[ OK ] server answered {}", status),
        Err(e) => esp_println::println!("[FAIL] {} (code {})", e, e.code()),
    }

    idle().await
}
