//! ESP32 board support for the smart-monitor firmware
//!
//! Peripheral bring-up, the Wi-Fi/TCP stack and the HTTP transport. The
//! hardware-independent pieces live in `smart-monitor-core`.

#![no_std]

extern crate alloc;

pub mod config;
pub mod hardware;
pub mod net;
