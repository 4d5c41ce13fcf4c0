//! Scan control
//! Guards against overlapping scans and clears the registry before each one.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, error, info};
use serde::Serialize;

use crate::core::bluetooth::registry::PeripheralRegistry;
use crate::core::bluetooth::transport::BleTransport;
use crate::core::bluetooth::types::ScanRequest;

/// Whether a scan is currently running
#[derive(Debug, Default)]
pub struct ScanState {
    scanning: AtomicBool,
}

impl ScanState {
    pub fn is_scanning(&self) -> bool {
        self.scanning.load(Ordering::SeqCst)
    }

    /// Marks a scan as started. False if one was already running.
    fn try_begin(&self) -> bool {
        self.scanning
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Marks the scan as finished. False if none was running.
    pub fn finish(&self) -> bool {
        self.scanning.swap(false, Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScanOutcome {
    Started,
    AlreadyScanning,
    Failed,
}

pub struct BluetoothScanner {
    transport: Arc<dyn BleTransport>,
    registry: Arc<PeripheralRegistry>,
    state: Arc<ScanState>,
    request: ScanRequest,
}

impl BluetoothScanner {
    pub fn new(
        transport: Arc<dyn BleTransport>,
        registry: Arc<PeripheralRegistry>,
        state: Arc<ScanState>,
        request: ScanRequest,
    ) -> Self {
        Self {
            transport,
            registry,
            state,
            request,
        }
    }

    pub fn state(&self) -> Arc<ScanState> {
        self.state.clone()
    }

    /// Clears the registry and starts a scan, unless one is already running.
    pub async fn start_scan(&self) -> ScanOutcome {
        if !self.state.try_begin() {
            debug!("Scan already in progress, ignoring request");
            return ScanOutcome::AlreadyScanning;
        }

        self.registry.reset();
        info!(
            "Starting scan for {:?} (duplicates: {}, options: {:?})",
            self.request.duration, self.request.allow_duplicates, self.request.options
        );

        match self.transport.scan(self.request.clone()).await {
            Ok(()) => {
                debug!("Scan started successfully");
                ScanOutcome::Started
            }
            Err(e) => {
                error!("BLE scan returned an error: {}", e);
                // no StopScan event will follow a scan that never started
                self.state.finish();
                ScanOutcome::Failed
            }
        }
    }

    pub async fn stop_scan(&self) {
        if !self.state.is_scanning() {
            debug!("No scan running");
            return;
        }
        info!("Stopping Bluetooth scan.");
        if let Err(e) = self.transport.stop_scan().await {
            error!("Failed to stop scan: {}", e);
        }
    }

    /// Handles the transport's StopScan event.
    pub fn handle_stop_scan(&self) {
        if self.state.finish() {
            info!("Scan is stopped.");
        }
    }
}
