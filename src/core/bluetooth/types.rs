//! Defines shared data structures for the Bluetooth module.

use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::bluetooth::constants::{
    DEFAULT_ALLOW_DUPLICATES, DEFAULT_SCAN_DURATION_SECS, NO_NAME_PLACEHOLDER,
};

static MAC_ADDRESS: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"([0-9A-Fa-f]{2}[:_-]){5}([0-9A-Fa-f]{2})").ok());

/// Vendor data from an advertisement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManufacturerData {
    pub company_id: u16,
    pub data: Vec<u8>,
}

/// Raw advertising payload, kept opaque by the registry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvertisingData {
    pub local_name: Option<String>,
    pub manufacturer_data: Option<ManufacturerData>,
    pub service_uuids: Vec<Uuid>,
    pub service_data: HashMap<Uuid, Vec<u8>>,
    pub tx_power_level: Option<i16>,
    pub is_connectable: bool,
}

/// A peripheral as reported by the transport, on discovery or retrieval
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeripheralInfo {
    pub id: String,
    pub name: Option<String>,
    pub rssi: Option<i16>,
    pub advertising: AdvertisingData,
}

impl PeripheralInfo {
    pub fn new(id: impl Into<String>, name: Option<String>, rssi: Option<i16>) -> Self {
        Self {
            id: id.into(),
            name,
            rssi,
            advertising: AdvertisingData::default(),
        }
    }
}

/// Connection status of a registry record.
///
/// A single enum keeps `connecting` and `connected` from ever being true together.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl LinkState {
    pub fn is_connecting(self) -> bool {
        self == Self::Connecting
    }

    pub fn is_connected(self) -> bool {
        self == Self::Connected
    }
}

/// Registry entry for one peripheral.
///
/// Records are never edited in place; every change produces a new record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeripheralRecord {
    pub id: String,
    pub name: Option<String>,
    pub advertising: AdvertisingData,
    pub rssi: Option<i16>,
    pub link: LinkState,
}

impl PeripheralRecord {
    /// Builds a record from a discovery report, substituting the placeholder name.
    pub fn discovered(info: PeripheralInfo) -> Self {
        let name = match info.name {
            Some(name) if !name.trim().is_empty() => name,
            _ => NO_NAME_PLACEHOLDER.to_string(),
        };
        Self {
            id: info.id,
            name: Some(name),
            advertising: info.advertising,
            rssi: info.rssi,
            link: LinkState::Disconnected,
        }
    }

    /// Builds a record for a peripheral the system reports as already connected.
    pub fn already_connected(info: PeripheralInfo) -> Self {
        Self {
            id: info.id,
            name: info.name,
            advertising: info.advertising,
            rssi: info.rssi,
            link: LinkState::Connected,
        }
    }

    pub fn with_link(&self, link: LinkState) -> Self {
        Self { link, ..self.clone() }
    }

    pub fn with_rssi(&self, rssi: i16) -> Self {
        Self {
            rssi: Some(rssi),
            ..self.clone()
        }
    }

    pub fn is_connecting(&self) -> bool {
        self.link.is_connecting()
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_connected()
    }

    /// Name for display: record name, then advertised local name, then the placeholder.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.is_empty())
            .or(self.advertising.local_name.as_deref())
            .unwrap_or(NO_NAME_PLACEHOLDER)
    }

    /// MAC address embedded in the identifier, when the platform exposes one.
    pub fn address(&self) -> Option<String> {
        let re = MAC_ADDRESS.as_ref()?;
        re.find_iter(&self.id)
            .last()
            .map(|m| m.as_str().replace('_', ":").to_uppercase())
    }
}

/// Characteristic flags reported by service discovery
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacteristicProperties {
    pub read: bool,
    pub write: bool,
    pub write_without_response: bool,
    pub notify: bool,
    pub indicate: bool,
}

/// One discovered characteristic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacteristicInfo {
    pub service: Uuid,
    pub characteristic: Uuid,
    pub properties: CharacteristicProperties,
}

/// Result of service discovery on a connected peripheral
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeripheralServices {
    pub peripheral_id: String,
    pub services: Vec<Uuid>,
    pub characteristics: Vec<CharacteristicInfo>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanMatchMode {
    Aggressive,
    #[default]
    Sticky,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanMode {
    Opportunistic,
    LowPower,
    Balanced,
    #[default]
    LowLatency,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanCallbackType {
    #[default]
    AllMatches,
    FirstMatch,
    MatchLost,
}

/// Platform scan hints. Backends that cannot honour them ignore them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanOptions {
    pub match_mode: ScanMatchMode,
    pub scan_mode: ScanMode,
    pub callback_type: ScanCallbackType,
}

/// Parameters of a single scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    pub service_filters: Vec<Uuid>,
    pub duration: Duration,
    pub allow_duplicates: bool,
    pub options: ScanOptions,
}

impl Default for ScanRequest {
    fn default() -> Self {
        Self {
            service_filters: Vec::new(),
            duration: Duration::from_secs(DEFAULT_SCAN_DURATION_SECS),
            allow_duplicates: DEFAULT_ALLOW_DUPLICATES,
            options: ScanOptions::default(),
        }
    }
}

/// Options passed when the transport is started
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StartOptions {
    /// Ask the OS to show its "Bluetooth is off" alert
    pub show_alert: bool,
}
