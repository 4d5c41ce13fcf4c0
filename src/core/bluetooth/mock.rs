//! In-memory transport used by the unit tests.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use uuid::Uuid;

use crate::core::bluetooth::error::BleError;
use crate::core::bluetooth::events::{EventEmitter, TransportEvent};
use crate::core::bluetooth::transport::{BleTransport, TransportResult};
use crate::core::bluetooth::types::{
    PeripheralInfo, PeripheralServices, ScanRequest, StartOptions,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    Start,
    Scan(ScanRequest),
    StopScan,
    Connect(String),
    Disconnect(String),
    RetrieveServices(String),
    Read(String, Uuid, Uuid),
    Write(String, Uuid, Uuid, Vec<u8>),
    StartNotification(String, Uuid, Uuid),
    ReadRssi(String),
    ConnectedPeripherals(Vec<Uuid>),
}

#[derive(Default)]
struct Script {
    fail_start: bool,
    fail_scan: bool,
    fail_connect: bool,
    fail_disconnect: bool,
    failing_reads: HashSet<Uuid>,
    failing_writes: HashSet<Uuid>,
    services: PeripheralServices,
    connected: Vec<PeripheralInfo>,
    rssi: i16,
}

#[derive(Default)]
pub struct MockTransport {
    calls: Mutex<Vec<TransportCall>>,
    script: Mutex<Script>,
    events: Arc<EventEmitter>,
}

impl MockTransport {
    pub fn new() -> Self {
        let mock = Self::default();
        mock.script.lock().unwrap().rssi = -60;
        mock
    }

    pub fn calls(&self) -> Vec<TransportCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&TransportCall) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    pub fn emit(&self, event: TransportEvent) {
        self.events.emit(event);
    }

    pub fn fail_start(&self, fail: bool) {
        self.script.lock().unwrap().fail_start = fail;
    }

    pub fn fail_scan(&self, fail: bool) {
        self.script.lock().unwrap().fail_scan = fail;
    }

    pub fn fail_connect(&self, fail: bool) {
        self.script.lock().unwrap().fail_connect = fail;
    }

    pub fn fail_disconnect(&self, fail: bool) {
        self.script.lock().unwrap().fail_disconnect = fail;
    }

    pub fn fail_read(&self, characteristic: Uuid) {
        self.script.lock().unwrap().failing_reads.insert(characteristic);
    }

    pub fn fail_write(&self, characteristic: Uuid, fail: bool) {
        let mut script = self.script.lock().unwrap();
        if fail {
            script.failing_writes.insert(characteristic);
        } else {
            script.failing_writes.remove(&characteristic);
        }
    }

    pub fn set_services(&self, services: PeripheralServices) {
        self.script.lock().unwrap().services = services;
    }

    pub fn set_connected(&self, peripherals: Vec<PeripheralInfo>) {
        self.script.lock().unwrap().connected = peripherals;
    }

    pub fn set_rssi(&self, rssi: i16) {
        self.script.lock().unwrap().rssi = rssi;
    }

    fn record(&self, call: TransportCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn scripted_failure(failed: bool, what: &str) -> TransportResult<()> {
        if failed {
            Err(BleError::Operation(format!("{} failed", what)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl BleTransport for MockTransport {
    async fn start(&self, _options: StartOptions) -> TransportResult<()> {
        self.record(TransportCall::Start);
        Self::scripted_failure(self.script.lock().unwrap().fail_start, "start")
    }

    async fn scan(&self, request: ScanRequest) -> TransportResult<()> {
        self.record(TransportCall::Scan(request));
        Self::scripted_failure(self.script.lock().unwrap().fail_scan, "scan")
    }

    async fn stop_scan(&self) -> TransportResult<()> {
        self.record(TransportCall::StopScan);
        self.events.emit(TransportEvent::StopScan);
        Ok(())
    }

    async fn connect(&self, peripheral_id: &str) -> TransportResult<()> {
        self.record(TransportCall::Connect(peripheral_id.to_string()));
        Self::scripted_failure(self.script.lock().unwrap().fail_connect, "connect")
    }

    async fn disconnect(&self, peripheral_id: &str) -> TransportResult<()> {
        self.record(TransportCall::Disconnect(peripheral_id.to_string()));
        Self::scripted_failure(self.script.lock().unwrap().fail_disconnect, "disconnect")
    }

    async fn retrieve_services(&self, peripheral_id: &str) -> TransportResult<PeripheralServices> {
        self.record(TransportCall::RetrieveServices(peripheral_id.to_string()));
        let mut services = self.script.lock().unwrap().services.clone();
        services.peripheral_id = peripheral_id.to_string();
        Ok(services)
    }

    async fn read(
        &self,
        peripheral_id: &str,
        service: Uuid,
        characteristic: Uuid,
    ) -> TransportResult<Vec<u8>> {
        self.record(TransportCall::Read(peripheral_id.to_string(), service, characteristic));
        if self.script.lock().unwrap().failing_reads.contains(&characteristic) {
            return Err(BleError::CharacteristicNotFound {
                service,
                characteristic,
            });
        }
        Ok(b"0".to_vec())
    }

    async fn write(
        &self,
        peripheral_id: &str,
        service: Uuid,
        characteristic: Uuid,
        data: &[u8],
    ) -> TransportResult<()> {
        self.record(TransportCall::Write(
            peripheral_id.to_string(),
            service,
            characteristic,
            data.to_vec(),
        ));
        let failed = self.script.lock().unwrap().failing_writes.contains(&characteristic);
        Self::scripted_failure(failed, "write")
    }

    async fn start_notification(
        &self,
        peripheral_id: &str,
        service: Uuid,
        characteristic: Uuid,
    ) -> TransportResult<()> {
        self.record(TransportCall::StartNotification(
            peripheral_id.to_string(),
            service,
            characteristic,
        ));
        Ok(())
    }

    async fn read_rssi(&self, peripheral_id: &str) -> TransportResult<i16> {
        self.record(TransportCall::ReadRssi(peripheral_id.to_string()));
        Ok(self.script.lock().unwrap().rssi)
    }

    async fn connected_peripherals(&self, services: &[Uuid]) -> TransportResult<Vec<PeripheralInfo>> {
        self.record(TransportCall::ConnectedPeripherals(services.to_vec()));
        Ok(self.script.lock().unwrap().connected.clone())
    }

    fn events(&self) -> Arc<EventEmitter> {
        self.events.clone()
    }
}
