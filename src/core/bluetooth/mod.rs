//! Bluetooth functionality for the LED remote
//! This module handles all bluetooth operations including scanning,
//! connecting, and switching the LEDs of the peripheral.

#[cfg(feature = "app")]
mod bluest_transport;
pub mod commands;
pub mod connection;
pub mod constants;
pub mod error;
pub mod events;
mod manager;
#[cfg(test)]
pub(crate) mod mock;
pub mod registry;
pub mod scanner;
pub mod sessions;
pub mod transport;
pub mod types;
pub mod unavailable;

// Re-export types that should be publicly accessible
#[cfg(feature = "app")]
pub use bluest_transport::BluestTransport;
pub use commands::{CommandExecutor, CommandSender, LedChannel, LedCommand, LedToggles};
pub use connection::{ConnectionManager, ConnectionSettings, RetrieveOutcome};
pub use constants::*; // Re-export all constants
pub use error::BleError;
pub use events::{EventEmitter, EventKind, Subscription, TransportEvent};
pub use manager::BluetoothManager;
pub use registry::PeripheralRegistry;
pub use scanner::{BluetoothScanner, ScanOutcome, ScanState};
pub use sessions::PeripheralSessions;
pub use transport::{BleTransport, TransportResult};
pub use types::{LinkState, PeripheralInfo, PeripheralRecord, ScanRequest};
pub use unavailable::UnavailableTransport;
