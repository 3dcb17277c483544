//! Hardware-independent core library for guardpost
//!
//! This crate contains all platform-agnostic logic for the guardpost
//! shake-alert sensor node: shake detection, GPS fix tracking, the alert
//! state machine, status report serialization, and the HTTP surface.
//!
//! It is `#![no_std]` with `extern crate alloc` so it compiles on both
//! embedded targets (ESP32-S3) and desktop hosts (for the simulator and
//! tests). All timing is done on caller-supplied millisecond timestamps;
//! the core holds no clock and touches no hardware.

#![no_std]

extern crate alloc;

pub mod alert;
pub mod config;
pub mod gps;
pub mod http;
pub mod motion;
pub mod node;
pub mod report;
