//! Bakes WiFi credentials from a `.env` file into the binary at build time.
//!
//! The firmware has no provisioning flow; credentials live in a git-ignored
//! `.env` next to the workspace root:
//!
//! ```text
//! WIFI_SSID=my-network
//! WIFI_PASSWORD=hunter2
//! ```

fn main() {
    // Missing .env is fine (CI builds); the vars then fall back to empty and
    // the node runs without a network link.
    let _ = dotenvy::dotenv();

    for key in ["WIFI_SSID", "WIFI_PASSWORD"] {
        let value = std::env::var(key).unwrap_or_default();
        if value.is_empty() {
            println!("cargo:warning={key} is not set; WiFi will not connect");
        }
        println!("cargo:rustc-env={key}={value}");
        println!("cargo:rerun-if-env-changed={key}");
    }
    println!("cargo:rerun-if-changed=.env");
    println!("cargo:rerun-if-changed=../../.env");
}
