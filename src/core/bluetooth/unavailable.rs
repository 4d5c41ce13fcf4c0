//! Transport used when the host has no Bluetooth adapter
//! The app still opens and draws its screen; every BLE operation fails with
//! [`BleError::NoAdapter`].

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::core::bluetooth::error::BleError;
use crate::core::bluetooth::events::EventEmitter;
use crate::core::bluetooth::transport::{BleTransport, TransportResult};
use crate::core::bluetooth::types::{PeripheralInfo, PeripheralServices, ScanRequest, StartOptions};
use crate::core::permissions::AdapterAvailability;

#[derive(Default)]
pub struct UnavailableTransport {
    events: Arc<EventEmitter>,
}

impl UnavailableTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BleTransport for UnavailableTransport {
    async fn start(&self, _options: StartOptions) -> TransportResult<()> {
        Err(BleError::NoAdapter)
    }

    async fn scan(&self, _request: ScanRequest) -> TransportResult<()> {
        Err(BleError::NoAdapter)
    }

    async fn stop_scan(&self) -> TransportResult<()> {
        Err(BleError::NoAdapter)
    }

    async fn connect(&self, _peripheral_id: &str) -> TransportResult<()> {
        Err(BleError::NoAdapter)
    }

    async fn disconnect(&self, _peripheral_id: &str) -> TransportResult<()> {
        Err(BleError::NoAdapter)
    }

    async fn retrieve_services(&self, _peripheral_id: &str) -> TransportResult<PeripheralServices> {
        Err(BleError::NoAdapter)
    }

    async fn read(
        &self,
        _peripheral_id: &str,
        _service: Uuid,
        _characteristic: Uuid,
    ) -> TransportResult<Vec<u8>> {
        Err(BleError::NoAdapter)
    }

    async fn write(
        &self,
        _peripheral_id: &str,
        _service: Uuid,
        _characteristic: Uuid,
        _data: &[u8],
    ) -> TransportResult<()> {
        Err(BleError::NoAdapter)
    }

    async fn start_notification(
        &self,
        _peripheral_id: &str,
        _service: Uuid,
        _characteristic: Uuid,
    ) -> TransportResult<()> {
        Err(BleError::NoAdapter)
    }

    async fn read_rssi(&self, _peripheral_id: &str) -> TransportResult<i16> {
        Err(BleError::NoAdapter)
    }

    async fn connected_peripherals(&self, _services: &[Uuid]) -> TransportResult<Vec<PeripheralInfo>> {
        Err(BleError::NoAdapter)
    }

    fn events(&self) -> Arc<EventEmitter> {
        self.events.clone()
    }
}

#[async_trait]
impl AdapterAvailability for UnavailableTransport {
    async fn is_available(&self) -> bool {
        false
    }

    async fn wait_available(&self) -> bool {
        false
    }
}
