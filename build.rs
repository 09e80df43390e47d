//! Bakes the deployment settings into the firmware image.
//!
//! Values come from the environment, falling back to a `.env` file in the
//! crate root. Missing credentials still build; the firmware reports the
//! configuration error at boot.

const SETTINGS: [(&str, &str); 5] = [
    ("SMART_MONITOR_WIFI_SSID", ""),
    ("SMART_MONITOR_WIFI_PASSWORD", ""),
    ("SMART_MONITOR_SERVER_URL", "http://192.168.1.9:8000/readings/"),
    ("SMART_MONITOR_DHT_KIND", "DHT11"),
    ("SMART_MONITOR_REPORT_INTERVAL_MS", "2000"),
];

fn main() {
    println!("cargo:rerun-if-changed=.env");

    // Variables already set in the environment win over the file.
    let _ = dotenvy::dotenv();

    for (key, default) in SETTINGS {
        println!("cargo:rerun-if-env-changed={key}");
        let value = std::env::var(key).unwrap_or_else(|_| default.to_owned());
        if value.is_empty() && key == "SMART_MONITOR_WIFI_SSID" {
            println!("cargo:warning={key} is not set; the firmware will not connect");
        }
        println!("cargo:rustc-env={key}={value}");
    }
}
