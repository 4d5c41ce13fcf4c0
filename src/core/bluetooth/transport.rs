//! The BLE transport seam
//! Everything the app needs from a BLE binding: async operations plus the
//! lifecycle events published through an [`EventEmitter`].

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::core::bluetooth::error::BleError;
use crate::core::bluetooth::events::EventEmitter;
use crate::core::bluetooth::types::{PeripheralInfo, PeripheralServices, ScanRequest, StartOptions};

pub type TransportResult<T> = Result<T, BleError>;

#[async_trait]
pub trait BleTransport: Send + Sync {
    /// Prepares the binding for use.
    async fn start(&self, options: StartOptions) -> TransportResult<()>;

    /// Starts a scan and returns once it is running.
    ///
    /// Discoveries arrive as `DiscoverPeripheral` events and the end of the
    /// scan, by timeout or [`BleTransport::stop_scan`], as `StopScan`.
    async fn scan(&self, request: ScanRequest) -> TransportResult<()>;

    async fn stop_scan(&self) -> TransportResult<()>;

    async fn connect(&self, peripheral_id: &str) -> TransportResult<()>;

    async fn disconnect(&self, peripheral_id: &str) -> TransportResult<()>;

    /// Discovers every service and characteristic of a connected peripheral.
    async fn retrieve_services(&self, peripheral_id: &str) -> TransportResult<PeripheralServices>;

    async fn read(
        &self,
        peripheral_id: &str,
        service: Uuid,
        characteristic: Uuid,
    ) -> TransportResult<Vec<u8>>;

    async fn write(
        &self,
        peripheral_id: &str,
        service: Uuid,
        characteristic: Uuid,
        data: &[u8],
    ) -> TransportResult<()>;

    /// Subscribes to a characteristic; values arrive as `UpdateValueForCharacteristic` events.
    async fn start_notification(
        &self,
        peripheral_id: &str,
        service: Uuid,
        characteristic: Uuid,
    ) -> TransportResult<()>;

    async fn read_rssi(&self, peripheral_id: &str) -> TransportResult<i16>;

    /// Peripherals the system already holds a connection to, limited to `services` when non-empty.
    async fn connected_peripherals(&self, services: &[Uuid]) -> TransportResult<Vec<PeripheralInfo>>;

    fn events(&self) -> Arc<EventEmitter>;
}
