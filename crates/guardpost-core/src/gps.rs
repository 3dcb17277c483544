//! GPS fix tracking over a streaming NMEA byte feed.
//!
//! Bytes from the receiver UART accumulate into sentences which are handed
//! to the `nmea` parser. The tracker latches the most recent valid position
//! and keeps monotonic parse-health counters for diagnostics.
//!
//! Fix validity is sticky: once a valid position has been seen, `valid`
//! never reverts, even if the receiver later loses satellite lock. There is
//! no staleness detection. Observed behavior of the deployed firmware;
//! preserved deliberately.

use heapless::Vec;
use log::debug;
use nmea::Nmea;
use nmea::sentences::FixType;

const KNOTS_TO_KMPH: f32 = 1.852;

/// Longest sentence the line buffer accepts. NMEA 0183 caps sentences at 82
/// characters; anything longer is line noise and gets dropped for resync.
const LINE_CAPACITY: usize = 120;

/// The most recent accepted position, plus independently-optional extras.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GpsFix {
    pub latitude: f64,
    pub longitude: f64,
    pub valid: bool,
    pub altitude_m: Option<f32>,
    pub speed_kmph: Option<f32>,
    pub satellites: Option<u32>,
}

/// Monotonic decoder diagnostics. Never reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkHealth {
    pub chars_processed: u32,
    pub passed_checksum: u32,
    pub failed_checksum: u32,
}

/// Feeds receiver bytes to the NMEA decoder and latches decoded fixes.
pub struct GpsFixTracker {
    decoder: Nmea,
    line: Vec<u8, LINE_CAPACITY>,
    fix: GpsFix,
    health: LinkHealth,
}

impl Default for GpsFixTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl GpsFixTracker {
    pub fn new() -> Self {
        Self {
            decoder: Nmea::default(),
            line: Vec::new(),
            fix: GpsFix::default(),
            health: LinkHealth::default(),
        }
    }

    pub fn fix(&self) -> &GpsFix {
        &self.fix
    }

    pub fn health(&self) -> &LinkHealth {
        &self.health
    }

    /// Hand one byte to the decoder. Returns true when the byte completed a
    /// sentence that was decoded and applied to the fix.
    pub fn feed(&mut self, byte: u8) -> bool {
        self.health.chars_processed = self.health.chars_processed.wrapping_add(1);

        if byte == b'\n' {
            let applied = self.finish_line();
            self.line.clear();
            return applied;
        }

        if self.line.push(byte).is_err() {
            // Oversized garbage; drop it and resync on the next newline.
            self.line.clear();
        }
        false
    }

    /// Convenience for draining a burst of bytes. Returns how many sentences
    /// were applied.
    pub fn feed_slice(&mut self, bytes: &[u8]) -> usize {
        bytes.iter().filter(|&&b| self.feed(b)).count()
    }

    fn finish_line(&mut self) -> bool {
        let Ok(raw) = core::str::from_utf8(&self.line) else {
            return false;
        };
        let sentence = raw.trim_end_matches('\r');
        if !sentence.starts_with('$') {
            return false;
        }

        match verify_checksum(sentence) {
            Some(true) => {
                self.health.passed_checksum = self.health.passed_checksum.wrapping_add(1)
            }
            Some(false) => {
                self.health.failed_checksum = self.health.failed_checksum.wrapping_add(1);
                debug!("NMEA checksum mismatch, sentence dropped");
                return false;
            }
            // No checksum field at all: not a decodable sentence.
            None => return false,
        }

        if self.decoder.parse(sentence).is_err() {
            // Checksum was fine but the sentence type is unsupported or the
            // body malformed. The fix stays as-is.
            return false;
        }

        self.apply_decoded();
        true
    }

    /// Copy whatever the decoder currently marks valid into the latched fix.
    /// Each field is independently optional; absent fields leave the
    /// previous value in place.
    fn apply_decoded(&mut self) {
        let has_fix = !matches!(self.decoder.fix_type, None | Some(FixType::Invalid));
        if has_fix {
            if let (Some(lat), Some(lon)) = (self.decoder.latitude, self.decoder.longitude) {
                self.fix.latitude = lat;
                self.fix.longitude = lon;
                self.fix.valid = true;
            }
        }
        if let Some(altitude) = self.decoder.altitude {
            self.fix.altitude_m = Some(altitude);
        }
        if let Some(knots) = self.decoder.speed_over_ground {
            self.fix.speed_kmph = Some(knots * KNOTS_TO_KMPH);
        }
        if let Some(count) = self.decoder.num_of_fix_satellites {
            self.fix.satellites = Some(count);
        }
    }
}

/// Check the `*hh` trailer against the XOR of the sentence body.
/// Returns None when the sentence carries no checksum field.
fn verify_checksum(sentence: &str) -> Option<bool> {
    let (body, trailer) = sentence[1..].split_once('*')?;
    let expected = u8::from_str_radix(trailer.get(..2)?, 16).ok()?;
    let actual = body.bytes().fold(0u8, |sum, b| sum ^ b);
    Some(actual == expected)
}
