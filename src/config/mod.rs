pub mod bluetooth_config;

use std::path::Path;

use anyhow::Result;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::fs;

pub use crate::config::bluetooth_config::BluetoothConfig;
use crate::utils::ensure_directory_exists;

pub const CONFIG_FILE_NAME: &str = "app_config.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub bluetooth: BluetoothConfig,
    /// One of error, warn, info, debug, trace
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            bluetooth: BluetoothConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Reads the config file, falling back to defaults when it does not exist.
    pub async fn load_from(file_path: &Path) -> Result<Self> {
        if !file_path.exists() {
            warn!("Config file not found at {:?}, using default.", file_path);
            return Ok(Self::default());
        }

        let config_json = fs::read_to_string(file_path).await?;
        let config: Self = serde_json::from_str(&config_json)?;

        info!("Config loaded from {:?}", file_path);
        Ok(config)
    }

    /// Like [`AppConfig::load_from`], but writes the defaults when the file
    /// does not exist yet. An existing file is never rewritten.
    pub async fn load_or_init_at(file_path: &Path) -> Result<Self> {
        if file_path.exists() {
            return Self::load_from(file_path).await;
        }

        let config = Self::default();
        if let Err(e) = config.save_to(file_path).await {
            error!("Failed to write default config: {}", e);
        }
        Ok(config)
    }

    pub async fn save_to(&self, file_path: &Path) -> Result<()> {
        if let Some(config_dir) = file_path.parent() {
            ensure_directory_exists(config_dir).await?;
        }

        let config_json = match serde_json::to_string_pretty(self) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize app config to JSON: {}", e);
                return Err(e.into());
            }
        };

        fs::write(file_path, config_json).await?;

        info!("App config saved to {:?}.", file_path);
        Ok(())
    }

    pub fn log_level(&self) -> log::Level {
        self.log_level.parse().unwrap_or_else(|_| {
            warn!("Unknown log level {:?}, using info", self.log_level);
            log::Level::Info
        })
    }
}

#[cfg(feature = "app")]
impl AppConfig {
    fn file_path(app_handle: &tauri::AppHandle) -> Result<std::path::PathBuf> {
        use tauri::Manager;
        Ok(app_handle.path().app_config_dir()?.join(CONFIG_FILE_NAME))
    }

    /// Loads the config, creating the file with defaults on first launch.
    pub async fn load_or_init(app_handle: &tauri::AppHandle) -> Result<Self> {
        Self::load_or_init_at(&Self::file_path(app_handle)?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("ble-led-remote-{}-{}", std::process::id(), name))
            .join(CONFIG_FILE_NAME)
    }

    #[tokio::test]
    async fn missing_file_gives_defaults() {
        let config = AppConfig::load_from(&scratch("missing")).await.unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.bluetooth.scan_request().duration, Duration::from_secs(5));
        assert!(config.bluetooth.scan_request().allow_duplicates);
        assert_eq!(config.bluetooth.settle_delay(), Duration::from_millis(900));
        assert_eq!(config.log_level(), log::Level::Info);
    }

    #[tokio::test]
    async fn partial_file_keeps_other_defaults() {
        let path = scratch("partial");
        ensure_directory_exists(path.parent().unwrap()).await.unwrap();
        fs::write(&path, r#"{ "bluetooth": { "settle_delay_ms": 250 }, "log_level": "debug" }"#)
            .await
            .unwrap();

        let config = AppConfig::load_from(&path).await.unwrap();
        assert_eq!(config.bluetooth.settle_delay_ms, 250);
        assert_eq!(config.bluetooth.scan_seconds, 5);
        assert!(!config.bluetooth.notify_on_connect);
        assert_eq!(config.log_level(), log::Level::Debug);

        fs::remove_dir_all(path.parent().unwrap()).await.unwrap();
    }

    #[tokio::test]
    async fn saved_config_loads_back() {
        let path = scratch("saved");
        let mut config = AppConfig::default();
        config.bluetooth.notify_on_connect = true;
        config.bluetooth.scan_seconds = 10;

        config.save_to(&path).await.unwrap();
        assert_eq!(AppConfig::load_from(&path).await.unwrap(), config);

        fs::remove_dir_all(path.parent().unwrap()).await.unwrap();
    }

    #[tokio::test]
    async fn malformed_file_is_an_error() {
        let path = scratch("malformed");
        ensure_directory_exists(path.parent().unwrap()).await.unwrap();
        fs::write(&path, "{ not json").await.unwrap();

        assert!(AppConfig::load_from(&path).await.is_err());

        fs::remove_dir_all(path.parent().unwrap()).await.unwrap();
    }

    #[tokio::test]
    async fn first_launch_writes_defaults() {
        let path = scratch("first-launch");

        let config = AppConfig::load_or_init_at(&path).await.unwrap();

        assert_eq!(config, AppConfig::default());
        assert_eq!(AppConfig::load_from(&path).await.unwrap(), config);

        fs::remove_dir_all(path.parent().unwrap()).await.unwrap();
    }

    #[tokio::test]
    async fn malformed_file_is_left_untouched() {
        let path = scratch("keep-malformed");
        ensure_directory_exists(path.parent().unwrap()).await.unwrap();
        fs::write(&path, r#"{ "log_level": "debug", "#).await.unwrap();

        assert!(AppConfig::load_or_init_at(&path).await.is_err());
        assert_eq!(fs::read_to_string(&path).await.unwrap(), r#"{ "log_level": "debug", "#);

        fs::remove_dir_all(path.parent().unwrap()).await.unwrap();
    }

    #[tokio::test]
    async fn existing_file_is_not_rewritten() {
        let path = scratch("existing");
        ensure_directory_exists(path.parent().unwrap()).await.unwrap();
        let written = r#"{"log_level":"warn"}"#;
        fs::write(&path, written).await.unwrap();

        let config = AppConfig::load_or_init_at(&path).await.unwrap();

        assert_eq!(config.log_level(), log::Level::Warn);
        assert_eq!(fs::read_to_string(&path).await.unwrap(), written);

        fs::remove_dir_all(path.parent().unwrap()).await.unwrap();
    }

    #[test]
    fn unknown_log_level_falls_back_to_info() {
        let config = AppConfig {
            log_level: "loud".into(),
            ..Default::default()
        };
        assert_eq!(config.log_level(), log::Level::Info);
    }
}
