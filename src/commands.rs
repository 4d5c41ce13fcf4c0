//! Tauri commands
//! This module defines all the commands that can be invoked from the frontend.
//! Screen changes reach the frontend as `screen-updated` events; the return
//! values only report the outcome of the call itself.

use tauri::State;

use crate::core::bluetooth::{LedChannel, RetrieveOutcome, ScanOutcome};
use crate::state::AppState;
use crate::view::ScreenView;

/// Clears the list and scans for the LED peripheral.
///
/// Ignored while a scan is already running. Emits:
/// - "screen-updated" whenever the list or the scanning flag changes
#[tauri::command]
pub async fn start_scan(app_state: State<'_, AppState>) -> Result<ScanOutcome, String> {
    let bluetooth_manager = app_state.get_bluetooth_manager_arc();
    match bluetooth_manager.start_scan().await {
        ScanOutcome::Failed => Err("Bluetooth scan could not be started".to_string()),
        outcome => Ok(outcome),
    }
}

#[tauri::command]
pub async fn stop_scan(app_state: State<'_, AppState>) -> Result<(), String> {
    app_state.get_bluetooth_manager_arc().stop_scan().await;
    Ok(())
}

/// Imports peripherals the system is already connected to.
///
/// Emits "alert" when there are none.
#[tauri::command]
pub async fn retrieve_connected(
    app_state: State<'_, AppState>,
) -> Result<RetrieveOutcome, String> {
    app_state
        .get_bluetooth_manager_arc()
        .retrieve_connected()
        .await
        .map_err(|e| e.to_string())
}

/// Connects to a listed peripheral, or disconnects it if it is connected.
///
/// # Arguments
/// * `peripheral_id` - The identifier shown on the peripheral's row
#[tauri::command]
pub async fn toggle_connection(
    peripheral_id: String,
    app_state: State<'_, AppState>,
) -> Result<(), String> {
    app_state
        .get_bluetooth_manager_arc()
        .toggle_connection(&peripheral_id)
        .await
        .map_err(|e| e.to_string())
}

/// Switches one LED. Returns whether it is now on.
#[tauri::command]
pub async fn toggle_led(
    channel: LedChannel,
    app_state: State<'_, AppState>,
) -> Result<bool, String> {
    app_state
        .get_bluetooth_manager_arc()
        .toggle_led(channel)
        .await
        .map_err(|e| e.to_string())
}

/// Current screen, for the first paint after the webview loads.
#[tauri::command]
pub fn get_screen(app_state: State<'_, AppState>) -> ScreenView {
    app_state.get_bluetooth_manager_arc().screen()
}
