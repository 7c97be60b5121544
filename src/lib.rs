#![cfg_attr(not(test), no_std)]

pub mod app;
pub mod ble;
pub mod config;
pub mod pulse;
pub mod waveform;

// Tasks depend on the ESP HAL and embassy runtime only available with embedded feature
#[cfg(feature = "embedded")]
pub mod tasks;
