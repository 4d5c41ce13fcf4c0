//! Application state management
//! This module defines and manages the global application state.

use std::sync::Arc;

use log::{error, info};
use tauri::AppHandle;

use crate::config::AppConfig;
use crate::core::BluetoothManager;
use crate::core::bluetooth::{BleTransport, BluestTransport, UnavailableTransport};
use crate::core::permissions::{AdapterAvailability, AdapterPrompt, PermissionPrompt, Platform};
use crate::view::WindowViewSink;

/// Global application state
pub struct AppState {
    /// The Bluetooth manager instance
    pub bluetooth_manager: Arc<BluetoothManager>,
    pub config: AppConfig,
}

impl AppState {
    /// Opens the adapter and wires the manager to the window. Starting the
    /// manager runs in the background so the window is not held up by the
    /// adapter or the permission dialog.
    pub async fn new(app_handle: AppHandle, config: AppConfig) -> Self {
        info!("Initializing BluetoothManager...");
        let (transport, adapter): (Arc<dyn BleTransport>, Arc<dyn AdapterAvailability>) =
            match BluestTransport::new(config.bluetooth.permission_timeout()).await {
                Ok(transport) => {
                    let transport = Arc::new(transport);
                    (transport.clone(), transport)
                }
                Err(e) => {
                    error!("Bluetooth is unavailable, continuing without it: {}", e);
                    let transport = Arc::new(UnavailableTransport::new());
                    (transport.clone(), transport)
                }
            };

        let manager = Arc::new(BluetoothManager::new(
            transport,
            &config.bluetooth,
            Platform::current(),
            Arc::new(WindowViewSink::new(app_handle.clone())),
        ));

        let prompt = permission_prompt(&app_handle, adapter);
        let starting = manager.clone();
        tauri::async_runtime::spawn(async move {
            let outcome = starting.start(prompt.as_ref()).await;
            info!("BluetoothManager started, permissions: {:?}", outcome);
        });

        Self {
            bluetooth_manager: manager,
            config,
        }
    }

    /// Gets a reference to the Bluetooth manager
    pub fn get_bluetooth_manager_arc(&self) -> Arc<BluetoothManager> {
        self.bluetooth_manager.clone()
    }
}

/// The Android dialog when the mobile plugin is registered, otherwise the
/// adapter itself.
fn permission_prompt(
    app_handle: &AppHandle,
    adapter: Arc<dyn AdapterAvailability>,
) -> Arc<dyn PermissionPrompt> {
    #[cfg(target_os = "android")]
    {
        use tauri::Manager;

        use crate::core::permissions::NativePrompt;
        use crate::permissions_plugin::AndroidPermissions;

        if let Some(api) = app_handle.try_state::<AndroidPermissions<tauri::Wry>>() {
            return Arc::new(NativePrompt::new(Arc::new(api.inner().clone())));
        }
        error!("Permission plugin is not registered");
    }
    #[cfg(not(target_os = "android"))]
    let _ = app_handle;
    Arc::new(AdapterPrompt::new(adapter))
}
