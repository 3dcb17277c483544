//! WiFi credentials baked in at build time from `.env` (see `build.rs`).

use guardpost_core::config::InternetConfig;

pub const WIFI_SSID: &str = env!("WIFI_SSID");
pub const WIFI_PASSWORD: &str = env!("WIFI_PASSWORD");

/// Credentials as the core's config type. `ssid` is empty when no `.env`
/// was present at build time.
pub fn internet_config() -> InternetConfig<'static> {
    InternetConfig {
        ssid: WIFI_SSID,
        password: WIFI_PASSWORD,
    }
}
