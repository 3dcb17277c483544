//! ESP32-S3 firmware-specific modules for guardpost
//!
//! This crate contains hardware-specific code that cannot compile on desktop
//! targets: ESP32 peripheral initialization, the accelerometer and GPS UART
//! plumbing, indicator drivers, and WiFi credential management.

#![no_std]

extern crate alloc;

pub mod hardware;
pub mod net;
pub mod wifi_secrets;
