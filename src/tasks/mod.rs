//! Embassy tasks module
//!
//! Contains the async tasks for the firmware, organised by functionality.

pub mod ble;
pub mod pulse;

pub use ble::{ble_task, DeviceSledService};
pub use pulse::{pulse_task, EspPulseOutput, LedcPulseChannel};
