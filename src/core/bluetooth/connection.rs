//! Peripheral connection handling
//! Connects to and disconnects from peripherals, walks the post-connect
//! inspection sequence and imports peripherals the system already holds.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use log::{debug, error, info, warn};
use serde::Serialize;

use crate::codec;
use crate::core::bluetooth::commands::LedChannel;
use crate::core::bluetooth::constants::UUID_LED_SERVICE;
use crate::core::bluetooth::registry::PeripheralRegistry;
use crate::core::bluetooth::transport::BleTransport;
use crate::core::bluetooth::types::LinkState;
use crate::view::{Alert, ScreenRenderer};

/// Tunables of the connect sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionSettings {
    /// Wait between connection confirmation and service discovery
    pub settle_delay: Duration,
    /// Subscribe to the LED characteristics once connected
    pub notify_on_connect: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "count", rename_all = "kebab-case")]
pub enum RetrieveOutcome {
    /// Nothing connected; the user was alerted
    NoneConnected,
    Found(usize),
}

/// Connection manager for the peripherals in the registry
pub struct ConnectionManager {
    transport: Arc<dyn BleTransport>,
    registry: Arc<PeripheralRegistry>,
    renderer: ScreenRenderer,
    settings: ConnectionSettings,
}

impl ConnectionManager {
    pub fn new(
        transport: Arc<dyn BleTransport>,
        registry: Arc<PeripheralRegistry>,
        renderer: ScreenRenderer,
        settings: ConnectionSettings,
    ) -> Self {
        Self {
            transport,
            registry,
            renderer,
            settings,
        }
    }

    fn set_link(&self, peripheral_id: &str, link: LinkState) {
        if self.registry.set_link(peripheral_id, link) {
            self.renderer.refresh();
        }
    }

    /// Disconnects a connected peripheral, otherwise connects to it.
    pub async fn toggle_connection(&self, peripheral_id: &str) -> Result<()> {
        let record = self
            .registry
            .get(peripheral_id)
            .ok_or_else(|| anyhow!("Peripheral not found with ID: {}", peripheral_id))?;

        if record.is_connected() {
            self.disconnect(peripheral_id).await
        } else {
            self.connect(peripheral_id).await
        }
    }

    /// Connects, then inspects the peripheral.
    ///
    /// Only the connection itself can fail this call; inspection problems
    /// are logged and the peripheral stays connected.
    pub async fn connect(&self, peripheral_id: &str) -> Result<()> {
        self.set_link(peripheral_id, LinkState::Connecting);

        if let Err(e) = self.transport.connect(peripheral_id).await {
            error!("[{}] connect error: {}", peripheral_id, e);
            self.set_link(peripheral_id, LinkState::Disconnected);
            return Err(e.into());
        }
        info!("[{}] connected.", peripheral_id);
        self.set_link(peripheral_id, LinkState::Connected);

        // let bonding and connection finish before touching services
        tokio::time::sleep(self.settings.settle_delay).await;

        if let Err(e) = self.inspect(peripheral_id).await {
            error!("[{}] post-connect inspection failed: {}", peripheral_id, e);
        }
        Ok(())
    }

    /// Service discovery, RSSI read and a best-effort read of every characteristic.
    async fn inspect(&self, peripheral_id: &str) -> Result<()> {
        let services = self.transport.retrieve_services(peripheral_id).await?;
        debug!(
            "[{}] retrieved {} services, {} characteristics",
            peripheral_id,
            services.services.len(),
            services.characteristics.len()
        );

        let rssi = self.transport.read_rssi(peripheral_id).await?;
        info!("[{}] current RSSI value: {}", peripheral_id, rssi);
        if self.registry.set_rssi(peripheral_id, rssi) {
            self.renderer.refresh();
        }

        if self.settings.notify_on_connect {
            for channel in LedChannel::ALL {
                if let Err(e) = self
                    .transport
                    .start_notification(peripheral_id, UUID_LED_SERVICE, channel.characteristic())
                    .await
                {
                    warn!("[{}] could not subscribe to {} LED: {}", peripheral_id, channel.label(), e);
                }
            }
        }

        for characteristic in &services.characteristics {
            match self
                .transport
                .read(peripheral_id, characteristic.service, characteristic.characteristic)
                .await
            {
                Ok(data) => info!(
                    "[{}] {} read as {:?}",
                    peripheral_id,
                    characteristic.characteristic,
                    codec::decode(&data)
                ),
                Err(e) => error!(
                    "[{}] failed to read characteristic {}: {}",
                    peripheral_id, characteristic.characteristic, e
                ),
            }
        }
        Ok(())
    }

    pub async fn disconnect(&self, peripheral_id: &str) -> Result<()> {
        match self.transport.disconnect(peripheral_id).await {
            Ok(()) => {
                info!("[{}] disconnected by user.", peripheral_id);
                self.set_link(peripheral_id, LinkState::Disconnected);
                Ok(())
            }
            Err(e) => {
                error!("[{}] error when trying to disconnect device: {}", peripheral_id, e);
                Err(e.into())
            }
        }
    }

    /// Handles an unsolicited disconnect reported by the transport.
    pub fn handle_disconnected(&self, peripheral_id: &str) {
        if self.registry.get(peripheral_id).is_some() {
            info!("[{}] previously connected peripheral is disconnected.", peripheral_id);
            self.set_link(peripheral_id, LinkState::Disconnected);
        } else {
            debug!("[{}] disconnected.", peripheral_id);
        }
    }

    /// Imports the peripherals the system is already connected to.
    pub async fn retrieve_connected(&self) -> Result<RetrieveOutcome> {
        let peripherals = self
            .transport
            .connected_peripherals(&[UUID_LED_SERVICE])
            .await
            .map_err(|e| {
                error!("Unable to retrieve connected peripherals: {}", e);
                e
            })?;

        if peripherals.is_empty() {
            info!("No connected peripherals found");
            self.renderer.alert(Alert::device_not_found());
            return Ok(RetrieveOutcome::NoneConnected);
        }

        let count = peripherals.len();
        for peripheral in peripherals {
            self.registry.already_connected(peripheral);
        }
        self.renderer.refresh();
        Ok(RetrieveOutcome::Found(count))
    }
}
