#![no_std]
#![no_main]

use embassy_executor::Spawner;
use embassy_time::{Duration, Timer};
use esp_backtrace as _;
use esp_hal::timer::timg::TimerGroup;

use smart_monitor::{config, hardware::SensorHardware};
use smart_monitor_core::{
    ClimateSample, PowerSample, Reading,
    sensors::DhtKind,
    traits::{ClimateSensor, PowerMonitor},
};

esp_bootloader_esp_idf::esp_app_desc!();

// DHT22 needs 2 s between reads, DHT11 one.
const DHT_SAMPLE_GAP_MS: u64 = 2_000;

// Test result tracking
struct TestResults {
    passed: u32,
    failed: u32,
    total: u32,
}

impl TestResults {
    fn new() -> Self {
        Self {
            passed: 0,
            failed: 0,
            total: 0,
        }
    }

    fn assert(&mut self, condition: bool, test_name: &str) {
        self.total += 1;
        if condition {
            self.passed += 1;
            esp_println::println!("  ✓ {}", test_name);
        } else {
            self.failed += 1;
            esp_println::println!("  ✗ {} FAILED", test_name);
        }
    }

    fn assert_close(&mut self, value: f32, expected: f32, tolerance: f32, test_name: &str) {
        self.total += 1;
        if (value - expected).abs() < tolerance {
            self.passed += 1;
            esp_println::println!("  ✓ {}", test_name);
        } else {
            self.failed += 1;
            esp_println::println!(
                "  ✗ {} FAILED: {:.2} not close to {:.2} (tolerance: {:.2})",
                test_name,
                value,
                expected,
                tolerance
            );
        }
    }

    fn print_summary(&self) {
        esp_println::println!("\n==========================================");
        esp_println::println!("Test Summary:");
        esp_println::println!("  Total:  {}", self.total);
        esp_println::println!("  Passed: {}", self.passed);
        esp_println::println!("  Failed: {}", self.failed);
        if self.failed == 0 {
            esp_println::println!("\n✓ ALL TESTS PASSED!");
        } else {
            esp_println::println!("\n✗ SOME TESTS FAILED");
        }
        esp_println::println!("==========================================");
    }
}

fn test_payload(results: &mut TestResults) {
    esp_println::println!("\n[TEST] Payload encoding on target");

    let reading = Reading::new(
        PowerSample {
            bus_voltage_v: 3.7,
            current_ma: 120.5,
            power_mw: 445.85,
        },
        ClimateSample::INVALID,
    );

    match reading.to_json() {
        Ok(json) => {
            esp_println::println!("    {}", json.as_str());
            results.assert(json.starts_with("{\"voltage\":3.70,"), "voltage first, two decimals");
            results.assert(json.contains("\"temperature\":0.00"), "NaN temperature sent as zero");
            results.assert(json.ends_with("\"source\":\"ESP32\"}"), "source last");
        }
        Err(e) => {
            esp_println::println!("    Encoding failed: {}", e);
            results.assert(false, "encode reading");
        }
    }
}

fn test_power_monitor(results: &mut TestResults, sensors: &mut SensorHardware<'_>) {
    esp_println::println!("\n[TEST] INA219 Power Monitor Tests");

    results.assert(sensors.power.init().is_ok(), "INA219 initialization");

    match sensors.power.read_power() {
        Ok(sample) => {
            esp_println::println!(
                "    Bus: {:.2} V  Current: {:.2} mA  Power: {:.2} mW",
                sample.bus_voltage_v,
                sample.current_ma,
                sample.power_mw
            );
            results.assert(
                (0.0..=32.0).contains(&sample.bus_voltage_v),
                "bus voltage within 32 V range",
            );
            results.assert(
                (-3_200.0..=3_200.0).contains(&sample.current_ma),
                "current within ±3.2 A",
            );
            // P = V * I within the chip's LSB rounding
            let expected_mw = sample.bus_voltage_v * sample.current_ma.abs();
            results.assert_close(
                sample.power_mw,
                expected_mw,
                expected_mw * 0.1 + 4.0,
                "power consistent with V * I",
            );
        }
        Err(e) => {
            esp_println::println!("    Read failed: {}", e);
            results.assert(false, "INA219 read");
        }
    }
}

async fn test_climate_sensor(results: &mut TestResults, sensors: &mut SensorHardware<'_>) {
    let name = sensors.climate.kind().name();
    esp_println::println!("\n[TEST] {} Climate Sensor Tests", name);

    results.assert(sensors.climate.init().is_ok(), "data line released");
    Timer::after(Duration::from_millis(DHT_SAMPLE_GAP_MS)).await;

    let mut valid = 0;
    for i in 0..3 {
        match sensors.climate.read_climate() {
            Ok(sample) => {
                esp_println::println!(
                    "    Sample {}: {:.1}°C {:.1}%",
                    i + 1,
                    sample.temperature_c,
                    sample.humidity_percent
                );
                let (min_c, max_c) = match sensors.climate.kind() {
                    DhtKind::Dht11 => (0.0, 50.0),
                    DhtKind::Dht22 => (-40.0, 80.0),
                };
                if (min_c..=max_c).contains(&sample.temperature_c)
                    && (0.0..=100.0).contains(&sample.humidity_percent)
                {
                    valid += 1;
                }
            }
            Err(e) => esp_println::println!("    Sample {} failed: {}", i + 1, e),
        }
        Timer::after(Duration::from_millis(DHT_SAMPLE_GAP_MS)).await;
    }

    results.assert(valid >= 2, "at least 2 of 3 reads valid and in range");
}

#[esp_rtos::main]
async fn main(_spawner: Spawner) {
    esp_println::logger::init_logger_from_env();
    let peripherals = esp_hal::init(esp_hal::Config::default());

    esp_println::println!("\n==========================================");
    esp_println::println!("=== Hardware Unit Test Runner ===");
    esp_println::println!("==========================================");

    let mut results = TestResults::new();

    // Run tests that don't need hardware
    test_payload(&mut results);

    // Initialize RTOS timer for embassy (this consumes TIMG0)
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    let dht_kind = config::DHT_KIND.parse().unwrap_or(DhtKind::Dht11);
    match SensorHardware::new(
        peripherals.I2C0,
        peripherals.GPIO21,
        peripherals.GPIO22,
        peripherals.GPIO18,
        dht_kind,
    ) {
        Ok(mut sensors) => {
            test_power_monitor(&mut results, &mut sensors);
            test_climate_sensor(&mut results, &mut sensors).await;
        }
        Err(e) => {
            esp_println::println!("  Sensor hardware setup failed: {}", e);
            results.assert(false, "sensor hardware setup");
        }
    }

    // Print summary
    results.print_summary();

    esp_println::println!("\nTest run complete. Looping...");
    loop {
        Timer::after(Duration::from_millis(1000)).await;
    }
}
