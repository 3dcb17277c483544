use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Default)]
#[serde(bound(deserialize = "'de: 'a"))]
pub struct Config<'a> {
    pub internet: InternetConfig<'a>,
    pub tuning: TuningConfig,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct InternetConfig<'a> {
    pub ssid: &'a str,
    pub password: &'a str,
}

/// Tuning constants for the detection loop. Fixed at startup, immutable
/// thereafter.
#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
pub struct TuningConfig {
    /// Change in acceleration magnitude (in g) that counts as a shake.
    /// Higher = less sensitive.
    pub shake_threshold: f32,
    /// Minimum time between shake detections.
    pub shake_debounce_ms: u64,
    /// How long the LED stays red and the alert stays latched after a shake.
    pub alert_duration_ms: u64,
    /// Interval between periodic fix summaries / LED re-affirmations.
    pub report_interval_ms: u64,
    /// Fixed inter-tick delay throttling the main loop.
    pub tick_delay_ms: u64,
    /// TCP port the status endpoint listens on.
    pub http_port: u16,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            shake_threshold: 1.0,
            shake_debounce_ms: 500,
            alert_duration_ms: 2000,
            report_interval_ms: 5000,
            tick_delay_ms: 50,
            http_port: 80,
        }
    }
}
