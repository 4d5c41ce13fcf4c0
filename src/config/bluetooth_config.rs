use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::bluetooth::constants::{
    DEFAULT_ALLOW_DUPLICATES, DEFAULT_PERMISSION_TIMEOUT_SECS, DEFAULT_SCAN_DURATION_SECS,
    DEFAULT_SETTLE_DELAY_MS,
};
use crate::core::bluetooth::types::ScanRequest;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BluetoothConfig {
    /// How long one scan runs before the adapter reports StopScan.
    pub scan_seconds: u64,

    /// Report every advertisement, not only the first per peripheral.
    pub allow_duplicates: bool,

    /// Pause between the connection being confirmed and service discovery.
    pub settle_delay_ms: u64,

    /// Subscribe to the LED characteristics after connecting.
    pub notify_on_connect: bool,

    pub permission_timeout_secs: u64,
}

impl Default for BluetoothConfig {
    fn default() -> Self {
        Self {
            scan_seconds: DEFAULT_SCAN_DURATION_SECS,
            allow_duplicates: DEFAULT_ALLOW_DUPLICATES,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            notify_on_connect: false,
            permission_timeout_secs: DEFAULT_PERMISSION_TIMEOUT_SECS,
        }
    }
}

impl BluetoothConfig {
    pub fn scan_request(&self) -> ScanRequest {
        ScanRequest {
            duration: Duration::from_secs(self.scan_seconds),
            allow_duplicates: self.allow_duplicates,
            ..Default::default()
        }
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn permission_timeout(&self) -> Duration {
        Duration::from_secs(self.permission_timeout_secs)
    }
}
