//! Bluetooth Low Energy module
//!
//! The sled service state machine and the stack trait it talks through are
//! host-testable; the TrouBLE binding is only built for the embedded target.

pub mod sled_service;
pub mod traits;

#[cfg(feature = "embedded")]
pub mod service;

pub use sled_service::{ConnectionState, SledError, SledEvents, SledService, SledServiceConfig};
pub use traits::{ConnHandle, GattStack, StackError, StackEvent};
