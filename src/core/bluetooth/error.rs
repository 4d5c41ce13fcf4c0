//! Errors reported by BLE transports.

use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum BleError {
    #[error("No Bluetooth adapter found")]
    NoAdapter,

    #[error("Peripheral not found with ID: {0}")]
    UnknownPeripheral(String),

    #[error("Peripheral {0} is not connected")]
    NotConnected(String),

    #[error("Characteristic {characteristic} not found in service {service}")]
    CharacteristicNotFound { service: Uuid, characteristic: Uuid },

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("{0}")]
    Operation(String),

    #[cfg(feature = "app")]
    #[error(transparent)]
    Bluest(#[from] bluest::Error),
}
