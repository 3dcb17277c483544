//! Status and alert payloads served over HTTP.
//!
//! Field names are part of the wire contract consumed by the companion app;
//! do not rename them.

use serde::Serialize;

use crate::gps::{GpsFix, LinkHealth};

/// WiFi link state supplied by the platform at report time.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkStatus {
    pub connected: bool,
    pub rssi_dbm: i8,
}

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub timestamp: u64,
    pub accelerometer: AccelSection,
    pub gps: GpsSection,
    pub alert: AlertSection,
    pub status: LinkSection,
}

#[derive(Debug, Serialize)]
pub struct AccelSection {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub magnitude: f32,
    pub change: f32,
}

/// Optional fields are omitted (not null) when the receiver has not
/// reported them yet; they are independently present.
#[derive(Debug, Serialize)]
pub struct GpsSection {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub satellites: Option<u32>,
}

impl GpsSection {
    pub fn from_fix(fix: &GpsFix) -> Self {
        Self {
            valid: fix.valid,
            latitude: fix.valid.then_some(fix.latitude),
            longitude: fix.valid.then_some(fix.longitude),
            altitude: fix.altitude_m,
            speed: fix.speed_kmph,
            satellites: fix.satellites,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AlertSection {
    pub active: bool,
    pub shake_detected: bool,
    pub threshold: f32,
}

#[derive(Debug, Serialize)]
pub struct LinkSection {
    pub link_connected: bool,
    pub link_signal: i8,
    pub uptime: u64,
    pub gps_chars_processed: u32,
    pub gps_passed_checksum: u32,
    pub gps_failed_checksum: u32,
}

impl LinkSection {
    pub fn new(link: LinkStatus, health: &LinkHealth, now_ms: u64) -> Self {
        Self {
            link_connected: link.connected,
            link_signal: link.rssi_dbm,
            uptime: now_ms / 1000,
            gps_chars_processed: health.chars_processed,
            gps_passed_checksum: health.passed_checksum,
            gps_failed_checksum: health.failed_checksum,
        }
    }
}

/// `GET /alert` payload. `location` is present only while alerting; its
/// `valid` flag reflects whether a fix is actually held.
#[derive(Debug, Serialize)]
pub struct AlertReport {
    pub alert_response: AlertResponse,
}

#[derive(Debug, Serialize)]
pub struct AlertResponse {
    pub alert_active: bool,
    pub timestamp: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<AlertLocation>,
}

#[derive(Debug, Serialize)]
pub struct AlertLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub valid: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_json<T: Serialize>(value: &T) -> alloc::string::String {
        let mut buf = [0u8; 512];
        let len = serde_json_core::to_slice(value, &mut buf).expect("payload fits");
        core::str::from_utf8(&buf[..len]).unwrap().into()
    }

    #[test]
    fn test_alert_report_idle_has_no_location_key() {
        let report = AlertReport {
            alert_response: AlertResponse {
                alert_active: false,
                timestamp: 1234,
                location: None,
            },
        };
        let json = to_json(&report);
        assert_eq!(
            json,
            r#"{"alert_response":{"alert_active":false,"timestamp":1234}}"#
        );
    }

    #[test]
    fn test_alert_report_active_carries_location() {
        let report = AlertReport {
            alert_response: AlertResponse {
                alert_active: true,
                timestamp: 99,
                location: Some(AlertLocation {
                    latitude: 48.0,
                    longitude: 11.5,
                    valid: true,
                }),
            },
        };
        let json = to_json(&report);
        assert!(json.contains(r#""alert_active":true"#));
        assert!(json.contains(r#""location":{"latitude":48.0"#), "json: {json}");
    }

    #[test]
    fn test_gps_section_omits_absent_fields() {
        let section = GpsSection::from_fix(&crate::gps::GpsFix::default());
        let json = to_json(&section);
        assert_eq!(json, r#"{"valid":false}"#);
    }

    #[test]
    fn test_gps_section_with_full_fix() {
        let fix = crate::gps::GpsFix {
            latitude: 48.1173,
            longitude: 11.5167,
            valid: true,
            altitude_m: Some(545.4),
            speed_kmph: Some(12.5),
            satellites: Some(8),
        };
        let json = to_json(&GpsSection::from_fix(&fix));
        assert!(json.contains(r#""valid":true"#));
        assert!(json.contains(r#""satellites":8"#));
        assert!(json.contains(r#""altitude":"#));
    }
}
