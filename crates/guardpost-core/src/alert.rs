//! Alert presentation: LED color selection and the buzzer chirp.
//!
//! Three states, signaled purely by color and tone:
//! - ready (green): running, fix held
//! - waiting-for-fix (yellow): running, no fix yet
//! - alerting (red + buzzer): a shake fired within the alert window
//!
//! The machine runs indefinitely; no state is terminal.

/// Status LED color. The LED is binary per channel, so these are the only
/// colors the node ever shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedColor {
    Green,
    Yellow,
    Red,
}

impl LedColor {
    /// 8-bit channel levels for PWM-capable indicators.
    pub const fn rgb(self) -> (u8, u8, u8) {
        match self {
            LedColor::Green => (0, 255, 0),
            LedColor::Yellow => (255, 255, 0),
            LedColor::Red => (255, 0, 0),
        }
    }
}

/// A repeated-beep pattern for the piezo buzzer.
///
/// Playback is synchronous on the firmware: the loop blocks for
/// `total_ms()` while the pattern plays and GPS bytes may overflow the UART
/// FIFO during that window. Accepted limitation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuzzerPattern {
    pub freq_hz: u32,
    pub beeps: u32,
    pub on_ms: u32,
    pub off_ms: u32,
}

impl BuzzerPattern {
    /// Total audible duration of the pattern.
    pub const fn total_ms(&self) -> u32 {
        self.beeps * (self.on_ms + self.off_ms)
    }
}

/// Three 1 kHz tones, 200 ms on / 100 ms off.
pub const ALERT_CHIRP: BuzzerPattern = BuzzerPattern {
    freq_hz: 1000,
    beeps: 3,
    on_ms: 200,
    off_ms: 100,
};

/// Latches the alerting window and picks the LED color on the way out.
pub struct AlertPresenter {
    active: bool,
    started_at_ms: u64,
    duration_ms: u64,
}

impl AlertPresenter {
    pub fn new(duration_ms: u64) -> Self {
        Self {
            active: false,
            started_at_ms: 0,
            duration_ms,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn started_at_ms(&self) -> u64 {
        self.started_at_ms
    }

    /// Color for the non-alerting states.
    pub const fn idle_color(fix_valid: bool) -> LedColor {
        if fix_valid {
            LedColor::Green
        } else {
            LedColor::Yellow
        }
    }

    /// A fresh shake: enter the alerting state.
    pub fn trigger(&mut self, now_ms: u64) -> (LedColor, BuzzerPattern) {
        self.active = true;
        self.started_at_ms = now_ms;
        (LedColor::Red, ALERT_CHIRP)
    }

    /// Clear the alert once its window has elapsed. Returns the color to
    /// fall back to, chosen solely from fix validity at this instant.
    pub fn expire(&mut self, now_ms: u64, fix_valid: bool) -> Option<LedColor> {
        if self.active && now_ms.saturating_sub(self.started_at_ms) > self.duration_ms {
            self.active = false;
            return Some(Self::idle_color(fix_valid));
        }
        None
    }

    /// Periodic color re-affirmation; a no-op while alerting.
    pub fn reaffirm(&self, fix_valid: bool) -> Option<LedColor> {
        if self.active {
            None
        } else {
            Some(Self::idle_color(fix_valid))
        }
    }
}
