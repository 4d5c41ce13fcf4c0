//! Bluetooth manager for the LED remote
//! This module provides the main interface for bluetooth operations and
//! owns the event subscriptions of the screen.

use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Result;
use log::{debug, error, info};

use crate::codec;
use crate::config::BluetoothConfig;
use crate::core::bluetooth::commands::{
    CommandExecutor, LedChannel, LedToggles, TransportCommandSender,
};
use crate::core::bluetooth::connection::{ConnectionManager, ConnectionSettings, RetrieveOutcome};
use crate::core::bluetooth::constants::TARGET_PERIPHERAL_ID;
use crate::core::bluetooth::events::{EventKind, Subscription, TransportEvent};
use crate::core::bluetooth::registry::PeripheralRegistry;
use crate::core::bluetooth::scanner::{BluetoothScanner, ScanOutcome, ScanState};
use crate::core::bluetooth::transport::BleTransport;
use crate::core::bluetooth::types::StartOptions;
use crate::core::permissions::{PermissionGate, PermissionOutcome, PermissionPrompt, Platform};
use crate::view::{ScreenRenderer, ScreenView, ViewSink};

/// Manages Bluetooth operations
pub struct BluetoothManager {
    transport: Arc<dyn BleTransport>,
    registry: Arc<PeripheralRegistry>,
    scanner: Arc<BluetoothScanner>,
    connection: Arc<ConnectionManager>,
    leds: CommandExecutor<TransportCommandSender>,
    permissions: PermissionGate,
    renderer: ScreenRenderer,
    /// Listeners registered by `attach`
    subscriptions: Mutex<Vec<Subscription>>,
}

impl BluetoothManager {
    /// Creates a new BluetoothManager
    pub fn new(
        transport: Arc<dyn BleTransport>,
        config: &BluetoothConfig,
        platform: Platform,
        sink: Arc<dyn ViewSink>,
    ) -> Self {
        let registry = Arc::new(PeripheralRegistry::new(TARGET_PERIPHERAL_ID));
        let scan_state = Arc::new(ScanState::default());
        let toggles = Arc::new(LedToggles::default());
        let renderer = ScreenRenderer::new(registry.clone(), scan_state.clone(), toggles.clone(), sink);

        let scanner = Arc::new(BluetoothScanner::new(
            transport.clone(),
            registry.clone(),
            scan_state,
            config.scan_request(),
        ));
        let connection = Arc::new(ConnectionManager::new(
            transport.clone(),
            registry.clone(),
            renderer.clone(),
            ConnectionSettings {
                settle_delay: config.settle_delay(),
                notify_on_connect: config.notify_on_connect,
            },
        ));
        let leds = CommandExecutor::new(
            TransportCommandSender::new(transport.clone(), TARGET_PERIPHERAL_ID),
            toggles,
        );

        Self {
            transport,
            registry,
            scanner,
            connection,
            leds,
            permissions: PermissionGate::new(platform),
            renderer,
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    /// Subscribes to transport events, starts the transport and acquires permissions.
    pub async fn start(&self, prompt: &dyn PermissionPrompt) -> PermissionOutcome {
        self.attach();
        match self.transport.start(StartOptions { show_alert: false }).await {
            Ok(()) => debug!("BLE transport started."),
            Err(e) => error!("BLE transport could not be started: {}", e),
        }
        let outcome = self.permissions.acquire(prompt).await;
        self.renderer.refresh();
        outcome
    }

    /// Registers one listener per transport event kind. Does nothing if already attached.
    pub fn attach(&self) {
        let mut subscriptions = self.subscriptions.lock().unwrap_or_else(PoisonError::into_inner);
        if !subscriptions.is_empty() {
            debug!("Event listeners already attached");
            return;
        }
        let events = self.transport.events();

        let registry = self.registry.clone();
        let renderer = self.renderer.clone();
        subscriptions.push(events.add_listener(
            EventKind::DiscoverPeripheral,
            Arc::new(move |event: &TransportEvent| {
                if let TransportEvent::DiscoverPeripheral(info) = event {
                    debug!("New BLE peripheral: {:?}", info);
                    if registry.discovered(info.clone()) {
                        renderer.refresh();
                    }
                }
            }),
        ));

        let scanner = self.scanner.clone();
        let renderer = self.renderer.clone();
        subscriptions.push(events.add_listener(
            EventKind::StopScan,
            Arc::new(move |_: &TransportEvent| {
                scanner.handle_stop_scan();
                renderer.refresh();
            }),
        ));

        let connection = self.connection.clone();
        subscriptions.push(events.add_listener(
            EventKind::DisconnectPeripheral,
            Arc::new(move |event: &TransportEvent| {
                if let TransportEvent::DisconnectPeripheral { peripheral_id } = event {
                    connection.handle_disconnected(peripheral_id);
                }
            }),
        ));

        subscriptions.push(events.add_listener(
            EventKind::UpdateValueForCharacteristic,
            Arc::new(|event: &TransportEvent| {
                if let TransportEvent::UpdateValueForCharacteristic {
                    peripheral_id,
                    characteristic,
                    value,
                } = event
                {
                    info!(
                        "Received data from '{}' with characteristic='{}' and value='{}'",
                        peripheral_id,
                        characteristic,
                        codec::decode(value)
                    );
                }
            }),
        ));
        info!("Attached {} event listeners", subscriptions.len());
    }

    /// Removes every listener registered by `attach`.
    pub fn detach(&self) {
        let mut subscriptions = self.subscriptions.lock().unwrap_or_else(PoisonError::into_inner);
        if subscriptions.is_empty() {
            return;
        }
        info!("Removing {} event listeners...", subscriptions.len());
        let events = self.transport.events();
        for subscription in subscriptions.drain(..) {
            if !events.remove_listener(subscription) {
                debug!("Listener for {:?} was already removed", subscription.kind());
            }
        }
    }

    pub fn is_attached(&self) -> bool {
        !self
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    pub async fn start_scan(&self) -> ScanOutcome {
        let outcome = self.scanner.start_scan().await;
        self.renderer.refresh();
        outcome
    }

    pub async fn stop_scan(&self) {
        self.scanner.stop_scan().await;
    }

    pub async fn toggle_connection(&self, peripheral_id: &str) -> Result<()> {
        self.connection.toggle_connection(peripheral_id).await
    }

    pub async fn retrieve_connected(&self) -> Result<RetrieveOutcome> {
        self.connection.retrieve_connected().await
    }

    /// Flips one LED and re-renders. Returns the LED's new state.
    pub async fn toggle_led(&self, channel: LedChannel) -> Result<bool> {
        let result = self.leds.toggle(channel).await;
        self.renderer.refresh();
        result
    }

    pub fn screen(&self) -> ScreenView {
        self.renderer.screen()
    }

    pub fn permission_outcome(&self) -> Option<PermissionOutcome> {
        self.permissions.outcome()
    }
}

impl Drop for BluetoothManager {
    fn drop(&mut self) {
        self.detach();
    }
}
