//! BLE transport backed by bluest
//! This module drives the system adapter: scanning, connecting, GATT access
//! and turning adapter streams into transport events.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bluest::{Adapter, AdvertisingDevice, Characteristic, ConnectionEvent, Device};
use futures_util::{StreamExt, pin_mut};
use log::{debug, error, info, warn};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::core::bluetooth::error::BleError;
use crate::core::bluetooth::events::{EventEmitter, TransportEvent};
use crate::core::bluetooth::sessions::PeripheralSessions;
use crate::core::bluetooth::transport::{BleTransport, TransportResult};
use crate::core::bluetooth::types::{
    AdvertisingData, CharacteristicInfo, CharacteristicProperties, ManufacturerData,
    PeripheralInfo, PeripheralServices, ScanRequest, StartOptions,
};
use crate::core::permissions::AdapterAvailability;

/// Service and characteristic UUID
type CharacteristicKey = (Uuid, Uuid);
type Sessions = PeripheralSessions<CharacteristicKey, Characteristic>;

struct ScanTask {
    cancel_token: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct BluestTransport {
    adapter: Adapter,
    devices: Arc<Mutex<HashMap<String, Device>>>,
    scan_task: tokio::sync::Mutex<Option<ScanTask>>,
    sessions: Arc<Sessions>,
    events: Arc<EventEmitter>,
    permission_timeout: Duration,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl BluestTransport {
    pub async fn new(permission_timeout: Duration) -> TransportResult<Self> {
        let adapter = Adapter::default().await.ok_or(BleError::NoAdapter)?;
        info!("Bluetooth adapter initialized.");
        Ok(Self {
            adapter,
            devices: Arc::new(Mutex::new(HashMap::new())),
            scan_task: tokio::sync::Mutex::new(None),
            sessions: Arc::new(PeripheralSessions::new()),
            events: Arc::new(EventEmitter::new()),
            permission_timeout,
        })
    }

    fn device(&self, peripheral_id: &str) -> TransportResult<Device> {
        lock(&self.devices)
            .get(peripheral_id)
            .cloned()
            .ok_or_else(|| BleError::UnknownPeripheral(peripheral_id.to_string()))
    }

    async fn connected_device(&self, peripheral_id: &str) -> TransportResult<Device> {
        let device = self.device(peripheral_id)?;
        if !device.is_connected().await {
            return Err(BleError::NotConnected(peripheral_id.to_string()));
        }
        Ok(device)
    }

    async fn characteristic(
        &self,
        peripheral_id: &str,
        service: Uuid,
        characteristic: Uuid,
    ) -> TransportResult<Characteristic> {
        let key = (service, characteristic);
        if let Some(found) = self.sessions.cached(peripheral_id, &key) {
            return Ok(found);
        }

        let device = self.connected_device(peripheral_id).await?;
        for s in device.discover_services_with_uuid(service).await? {
            if let Some(c) = s
                .discover_characteristics_with_uuid(characteristic)
                .await?
                .into_iter()
                .next()
            {
                self.sessions.cache(peripheral_id, key, c.clone());
                return Ok(c);
            }
        }
        Err(BleError::CharacteristicNotFound {
            service,
            characteristic,
        })
    }

    fn peripheral_info(device: &Device, rssi: Option<i16>) -> PeripheralInfo {
        PeripheralInfo::new(device.id().to_string(), device.name().ok(), rssi)
    }

    fn advertised(discovered: &AdvertisingDevice) -> PeripheralInfo {
        let adv = &discovered.adv_data;
        let name = adv
            .local_name
            .clone()
            .or_else(|| discovered.device.name().ok());
        let mut info = PeripheralInfo::new(discovered.device.id().to_string(), name, discovered.rssi);
        info.advertising = AdvertisingData {
            local_name: adv.local_name.clone(),
            manufacturer_data: adv.manufacturer_data.as_ref().map(|m| ManufacturerData {
                company_id: m.company_id,
                data: m.data.clone(),
            }),
            service_uuids: adv.services.clone(),
            service_data: adv.service_data.clone(),
            tx_power_level: adv.tx_power_level,
            is_connectable: adv.is_connectable,
        };
        info
    }

    /// Runs one scan until its duration elapses or it is cancelled.
    async fn internal_scan_task(
        adapter: Adapter,
        devices: Arc<Mutex<HashMap<String, Device>>>,
        events: Arc<EventEmitter>,
        request: ScanRequest,
        cancel_token: CancellationToken,
        started: oneshot::Sender<TransportResult<()>>,
    ) {
        let scan_stream = match adapter.scan(&request.service_filters).await {
            Ok(stream) => stream,
            Err(e) => {
                let _ = started.send(Err(e.into()));
                return;
            }
        };
        let _ = started.send(Ok(()));
        pin_mut!(scan_stream);

        let deadline = tokio::time::sleep(request.duration);
        tokio::pin!(deadline);
        let mut seen = HashSet::new();

        loop {
            tokio::select! {
                result = scan_stream.next() => {
                    match result {
                        Some(discovered) => {
                            let id = discovered.device.id().to_string();
                            if !request.allow_duplicates && !seen.insert(id.clone()) {
                                continue;
                            }
                            debug!("Found device - ID: {}, RSSI: {:?}", id, discovered.rssi);
                            let info = Self::advertised(&discovered);
                            lock(&devices).insert(id, discovered.device);
                            events.emit(TransportEvent::DiscoverPeripheral(info));
                        }
                        None => {
                            info!("Bluetooth scan stream has ended.");
                            break;
                        }
                    }
                }
                _ = &mut deadline => {
                    debug!("Scan duration of {:?} elapsed", request.duration);
                    break;
                }
                _ = cancel_token.cancelled() => {
                    debug!("Scan cancelled");
                    break;
                }
            }
        }
        events.emit(TransportEvent::StopScan);
    }

    /// Reports an unsolicited disconnect of a connected device and ends its session.
    async fn watch_connection(
        adapter: Adapter,
        device: Device,
        events: Arc<EventEmitter>,
        sessions: Arc<Sessions>,
        cancel_token: CancellationToken,
    ) {
        let peripheral_id = device.id().to_string();
        let stream = match adapter.device_connection_events(&device).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!("[{}] cannot watch connection state: {}", peripheral_id, e);
                return;
            }
        };
        pin_mut!(stream);

        loop {
            tokio::select! {
                event = stream.next() => match event {
                    Some(ConnectionEvent::Disconnected) | None => {
                        info!("[{}] connection lost", peripheral_id);
                        sessions.end(&peripheral_id);
                        events.emit(TransportEvent::DisconnectPeripheral { peripheral_id });
                        return;
                    }
                    Some(ConnectionEvent::Connected) => debug!("[{}] connected", peripheral_id),
                },
                _ = cancel_token.cancelled() => return,
            }
        }
    }

    async fn forward_notifications(
        peripheral_id: String,
        characteristic: Characteristic,
        events: Arc<EventEmitter>,
        cancel_token: CancellationToken,
    ) {
        let uuid = characteristic.uuid();
        let stream = match characteristic.notify().await {
            Ok(stream) => stream,
            Err(e) => {
                error!("[{}] failed to subscribe to {}: {}", peripheral_id, uuid, e);
                return;
            }
        };
        pin_mut!(stream);

        loop {
            tokio::select! {
                value = stream.next() => match value {
                    Some(Ok(value)) => events.emit(TransportEvent::UpdateValueForCharacteristic {
                        peripheral_id: peripheral_id.clone(),
                        characteristic: uuid,
                        value,
                    }),
                    Some(Err(e)) => {
                        error!("[{}] error in notification stream: {}", peripheral_id, e);
                        break;
                    }
                    None => break,
                },
                _ = cancel_token.cancelled() => break,
            }
        }
        debug!("[{}] notification stream for {} ended", peripheral_id, uuid);
    }
}

#[async_trait]
impl BleTransport for BluestTransport {
    async fn start(&self, options: StartOptions) -> TransportResult<()> {
        debug!("Starting transport ({:?})", options);
        tokio::time::timeout(self.permission_timeout, self.adapter.wait_available())
            .await
            .map_err(|_| BleError::Timeout(self.permission_timeout))??;
        Ok(())
    }

    async fn scan(&self, request: ScanRequest) -> TransportResult<()> {
        let mut scan_task = self.scan_task.lock().await;
        if let Some(previous) = scan_task.take() {
            previous.cancel_token.cancel();
            let _ = previous.handle.await;
        }

        let cancel_token = CancellationToken::new();
        let (started_tx, started_rx) = oneshot::channel();
        let handle = tokio::spawn(Self::internal_scan_task(
            self.adapter.clone(),
            self.devices.clone(),
            self.events.clone(),
            request,
            cancel_token.clone(),
            started_tx,
        ));

        match started_rx.await {
            Ok(Ok(())) => {
                info!("Device scan task started.");
                *scan_task = Some(ScanTask {
                    cancel_token,
                    handle,
                });
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(BleError::Operation("scan task exited before starting".to_string())),
        }
    }

    async fn stop_scan(&self) -> TransportResult<()> {
        let Some(task) = self.scan_task.lock().await.take() else {
            info!("No active scan task handle found to wait for.");
            return Ok(());
        };
        task.cancel_token.cancel();
        match task.handle.await {
            Ok(()) => info!("Scan task finished after cancellation."),
            Err(e) if e.is_cancelled() => info!("Scan task was cancelled."),
            Err(e) => error!("Scan task finished with an unexpected join error: {:?}", e),
        }
        Ok(())
    }

    async fn connect(&self, peripheral_id: &str) -> TransportResult<()> {
        let device = self.device(peripheral_id)?;
        if device.is_connected().await {
            info!("[{}] already connected", peripheral_id);
        } else {
            info!("Initiating connection to {}...", peripheral_id);
            self.adapter.connect_device(&device).await?;
        }

        // a stale session may still hold handles of an earlier connection
        self.sessions.end(peripheral_id);
        tokio::spawn(Self::watch_connection(
            self.adapter.clone(),
            device,
            self.events.clone(),
            self.sessions.clone(),
            self.sessions.token(peripheral_id),
        ));
        Ok(())
    }

    async fn disconnect(&self, peripheral_id: &str) -> TransportResult<()> {
        let device = self.device(peripheral_id)?;
        self.sessions.end(peripheral_id);
        if device.is_connected().await {
            info!("Disconnecting from device {}", peripheral_id);
            self.adapter.disconnect_device(&device).await?;
        } else {
            info!("Device {} not connected", peripheral_id);
        }
        self.events.emit(TransportEvent::DisconnectPeripheral {
            peripheral_id: peripheral_id.to_string(),
        });
        Ok(())
    }

    async fn retrieve_services(&self, peripheral_id: &str) -> TransportResult<PeripheralServices> {
        let device = self.connected_device(peripheral_id).await?;
        let mut result = PeripheralServices {
            peripheral_id: peripheral_id.to_string(),
            ..Default::default()
        };

        for service in device.discover_services().await? {
            let service_uuid = service.uuid();
            result.services.push(service_uuid);

            for characteristic in service.discover_characteristics().await? {
                let props = characteristic.properties().await?;
                result.characteristics.push(CharacteristicInfo {
                    service: service_uuid,
                    characteristic: characteristic.uuid(),
                    properties: CharacteristicProperties {
                        read: props.read,
                        write: props.write,
                        write_without_response: props.write_without_response,
                        notify: props.notify,
                        indicate: props.indicate,
                    },
                });
                self.sessions.cache(
                    peripheral_id,
                    (service_uuid, characteristic.uuid()),
                    characteristic,
                );
            }
        }
        Ok(result)
    }

    async fn read(
        &self,
        peripheral_id: &str,
        service: Uuid,
        characteristic: Uuid,
    ) -> TransportResult<Vec<u8>> {
        let c = self.characteristic(peripheral_id, service, characteristic).await?;
        Ok(c.read().await?)
    }

    async fn write(
        &self,
        peripheral_id: &str,
        service: Uuid,
        characteristic: Uuid,
        data: &[u8],
    ) -> TransportResult<()> {
        let c = self.characteristic(peripheral_id, service, characteristic).await?;
        c.write(data).await?;
        Ok(())
    }

    async fn start_notification(
        &self,
        peripheral_id: &str,
        service: Uuid,
        characteristic: Uuid,
    ) -> TransportResult<()> {
        let c = self.characteristic(peripheral_id, service, characteristic).await?;
        tokio::spawn(Self::forward_notifications(
            peripheral_id.to_string(),
            c,
            self.events.clone(),
            self.sessions.token(peripheral_id),
        ));
        Ok(())
    }

    async fn read_rssi(&self, peripheral_id: &str) -> TransportResult<i16> {
        let device = self.connected_device(peripheral_id).await?;
        Ok(device.rssi().await?)
    }

    async fn connected_peripherals(&self, services: &[Uuid]) -> TransportResult<Vec<PeripheralInfo>> {
        let connected = if services.is_empty() {
            self.adapter.connected_devices().await?
        } else {
            self.adapter.connected_devices_with_services(services).await?
        };

        let mut peripherals = Vec::with_capacity(connected.len());
        for device in connected {
            let rssi = device.rssi().await.ok();
            peripherals.push(Self::peripheral_info(&device, rssi));
            lock(&self.devices).insert(device.id().to_string(), device);
        }
        Ok(peripherals)
    }

    fn events(&self) -> Arc<EventEmitter> {
        self.events.clone()
    }
}

#[async_trait]
impl AdapterAvailability for BluestTransport {
    async fn is_available(&self) -> bool {
        match self.adapter.is_available().await {
            Ok(available) => available,
            Err(e) => {
                warn!("Cannot query adapter state: {}", e);
                false
            }
        }
    }

    async fn wait_available(&self) -> bool {
        match tokio::time::timeout(self.permission_timeout, self.adapter.wait_available()).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                error!("Adapter did not become available: {}", e);
                false
            }
            Err(_) => {
                warn!("Adapter still unavailable after {:?}", self.permission_timeout);
                false
            }
        }
    }
}
