//! Logger that mirrors every record to stderr and to the webview's `log-message` event.
//! The logger is installed before the config is read; the configured level
//! is applied afterwards through [`apply_level`].

use std::sync::OnceLock;

use chrono::Local;
use log::{Level, LevelFilter, Metadata, Record};
use serde::Serialize;
use tauri::Emitter;

static LOGGER: OnceLock<TauriLogger> = OnceLock::new();

/// Level used until the config has been read
pub const STARTUP_LEVEL: Level = Level::Info;

#[derive(Debug, Serialize, Clone)]
pub struct LogMessage {
    level: String,
    /// Module the record came from, without the crate prefix
    target: String,
    message: String,
    timestamp: String,
}

impl LogMessage {
    fn from_record(record: &Record) -> Self {
        Self {
            level: record.level().to_string(),
            target: short_target(record.target()).to_string(),
            message: record.args().to_string(),
            timestamp: Local::now().to_rfc3339(),
        }
    }
}

/// `ble_led_remote_lib::core::bluetooth::scanner` becomes `bluetooth::scanner`.
fn short_target(target: &str) -> &str {
    let target = target.strip_prefix("ble_led_remote_lib::").unwrap_or(target);
    target.strip_prefix("core::").unwrap_or(target)
}

pub struct TauriLogger {
    app_handle: tauri::AppHandle,
}

impl TauriLogger {
    fn emit_log(&self, record: &Record) {
        if let Err(e) = self.app_handle.emit("log-message", LogMessage::from_record(record)) {
            eprintln!("Failed to emit log message: {}", e);
        }
    }
}

impl log::Log for TauriLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{}] {}: {}", record.level(), short_target(record.target()), record.args());
            self.emit_log(record);
        }
    }

    fn flush(&self) {}
}

/// Installs the webview logger at [`STARTUP_LEVEL`], falling back to
/// env_logger when it cannot be set.
pub fn init(app_handle: tauri::AppHandle) {
    let logger = LOGGER.get_or_init(|| TauriLogger { app_handle });
    if log::set_logger(logger).is_err() {
        // the filter is left open so max_level alone decides
        if let Err(e) = env_logger::builder().filter_level(LevelFilter::Trace).try_init() {
            eprintln!("No logger could be installed: {}", e);
        }
    }
    apply_level(STARTUP_LEVEL);
}

pub fn apply_level(level: Level) {
    log::set_max_level(level.to_level_filter());
}
