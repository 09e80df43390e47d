#![no_std]
#![no_main]

use embassy_executor::Spawner;
use embassy_time::{Delay, Duration, Timer};
use esp_backtrace as _;
use esp_hal::timer::timg::TimerGroup;
use log::{error, info};

use smart_monitor::{
    config,
    hardware::SensorHardware,
    net::{self, HttpTransport, StackLink, WifiConnector},
};
use smart_monitor_core::{Reporter, retry::connect_with_backoff};

// Wiring on the monitor board:
// I2C0 - GPIO21(SDA), GPIO22(SCL) - INA219 at 0x40
// GPIO18 - DHT11/DHT22 data line
const RESTART_PAUSE: Duration = Duration::from_secs(5);

esp_bootloader_esp_idf::esp_app_desc!();

async fn halt() -> ! {
    loop {
        Timer::after(Duration::from_secs(1)).await;
    }
}

#[esp_rtos::main]
async fn main(spawner: Spawner) -> ! {
    esp_println::logger::init_logger_from_env();
    let peripherals = esp_hal::init(esp_hal::Config::default());

    esp_alloc::heap_allocator!(size: 72 * 1024);

    // Initialize RTOS timer for embassy
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    info!("=== Smart Monitor ===");

    let config = match config::load() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            halt().await
        }
    };

    let (controller, stack) = match net::start_network(&spawner, peripherals.WIFI) {
        Ok(network) => network,
        Err(e) => {
            error!("Network bring-up failed: {:?}", e);
            halt().await
        }
    };

    let mut connector = WifiConnector::new(controller, stack, config.wifi);
    match connect_with_backoff(&mut connector, &config.connect_retry, &mut Delay).await {
        Ok(ip) => info!("Connected! IP: {}", ip),
        Err(e) => {
            error!("Wi-Fi unavailable: {}; restarting", e);
            Timer::after(RESTART_PAUSE).await;
            esp_hal::system::software_reset()
        }
    }

    // The loop only skips while the link is down; this task brings it back.
    if let Err(e) = spawner.spawn(net::connection_task(connector, config.connect_retry)) {
        error!("Failed to spawn Wi-Fi connection task: {:?}", e);
    }

    let mut sensors = match SensorHardware::new(
        peripherals.I2C0,
        peripherals.GPIO21,
        peripherals.GPIO22,
        peripherals.GPIO18,
        config.dht_kind,
    ) {
        Ok(sensors) => sensors,
        Err(e) => {
            error!("Sensor hardware setup failed: {}", e);
            halt().await
        }
    };
    sensors.init();

    let mut reporter = Reporter::new(
        config.endpoint,
        sensors.power,
        sensors.climate,
        StackLink::new(stack),
        HttpTransport::new(stack),
    );

    info!(
        "Reporting to {}:{}{} every {} ms",
        config.endpoint.host, config.endpoint.port, config.endpoint.path, config.report_interval_ms
    );
    reporter.run(&mut Delay, config.report_interval_ms).await
}
