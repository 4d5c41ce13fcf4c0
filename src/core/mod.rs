//! Core functionality for the LED remote
//! Bluetooth plumbing and the runtime permission gate.

pub mod bluetooth;
pub mod permissions;

// Re-export commonly used types
pub use bluetooth::BluetoothManager;
pub use permissions::{PermissionGate, Platform};
