//! BLE LED remote library
//! Finds one known BLE peripheral, connects to it and switches its three LEDs.
//! Everything but the Tauri shell and the bluest backend builds without the
//! `app` feature.

pub mod codec;
pub mod config;
pub mod core;
pub mod utils;
pub mod view;

#[cfg(feature = "app")]
pub mod commands;
#[cfg(feature = "app")]
pub mod logging;
#[cfg(feature = "app")]
pub mod permissions_plugin;
#[cfg(feature = "app")]
pub mod state;

#[cfg(feature = "app")]
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    use log::{error, info};
    use tauri::{Manager, WindowEvent};

    use crate::config::AppConfig;
    use crate::state::AppState;

    let builder = tauri::Builder::default();

    // one process owns the adapter
    #[cfg(desktop)]
    let builder = builder.plugin(tauri_plugin_single_instance::init(|app, _args, _cwd| {
        if let Some(window) = app.get_webview_window("main") {
            let _ = window.set_focus();
        }
    }));

    builder
        .plugin(permissions_plugin::init())
        // Register our commands
        .invoke_handler(tauri::generate_handler![
            commands::start_scan,
            commands::stop_scan,
            commands::retrieve_connected,
            commands::toggle_connection,
            commands::toggle_led,
            commands::get_screen,
        ])
        // Setup our application state
        .setup(|app| {
            let handle = app.handle().clone();
            logging::init(handle.clone());

            let config = tauri::async_runtime::block_on(AppConfig::load_or_init(&handle)).unwrap_or_else(|e| {
                error!("Failed to load config, using default for this session: {}", e);
                AppConfig::default()
            });
            logging::apply_level(config.log_level());

            let app_state = tauri::async_runtime::block_on(async {
                info!("Starting AppState initialization in Tauri setup.");
                AppState::new(handle.clone(), config).await
            });

            app.manage(app_state);
            Ok(())
        })
        .on_window_event(|window, event| {
            if let WindowEvent::Destroyed = event {
                match window.try_state::<AppState>() {
                    Some(state) => state.bluetooth_manager.detach(),
                    None => error!("Window destroyed before the app state was ready"),
                }
            }
        })
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
