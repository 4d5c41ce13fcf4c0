//! Screen view model
//! Projects the registry, the scan flag and the LED toggles into the single
//! screen the frontend draws, and pushes every re-render to a [`ViewSink`].

use std::sync::Arc;

use serde::Serialize;

use crate::core::bluetooth::{
    LedChannel, LedToggles, PeripheralRecord, PeripheralRegistry, ScanState,
};

pub const SCAN_LABEL: &str = "Scan Bluetooth";
pub const SCANNING_LABEL: &str = "Scanning...";
pub const RETRIEVE_LABEL: &str = "Retrieve Connected Device";
pub const EMPTY_HINT: &str = "No Peripherals, press \"Scan Bluetooth\" above.";
pub const CONNECTING_SUFFIX: &str = " - Connecting...";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeripheralRow {
    pub id: String,
    pub title: String,
    pub rssi_label: String,
    pub address: Option<String>,
    pub connecting: bool,
    pub connected: bool,
}

impl PeripheralRow {
    fn from_record(record: &PeripheralRecord) -> Self {
        let mut title = record.display_name().to_string();
        if record.is_connecting() {
            title.push_str(CONNECTING_SUFFIX);
        }
        let rssi_label = match record.rssi {
            Some(rssi) => format!("RSSI: {}", rssi),
            None => "RSSI: unknown".to_string(),
        };
        Self {
            id: record.id.clone(),
            title,
            rssi_label,
            address: record.address(),
            connecting: record.is_connecting(),
            connected: record.is_connected(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedControl {
    pub channel: LedChannel,
    pub label: String,
    pub active: bool,
}

/// Everything the screen shows
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenView {
    pub scanning: bool,
    pub scan_button_label: String,
    pub retrieve_button_label: String,
    /// Hidden once any peripheral is connected
    pub show_retrieve_button: bool,
    pub empty_hint: Option<String>,
    pub peripherals: Vec<PeripheralRow>,
    /// Empty until a peripheral is connected
    pub led_controls: Vec<LedControl>,
}

/// A modal message for the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alert {
    pub title: String,
    pub message: String,
}

impl Alert {
    pub fn device_not_found() -> Self {
        Self {
            title: "Device not found".to_string(),
            message: "You are currently not connected to any device".to_string(),
        }
    }
}

/// Builds the screen from a registry snapshot.
pub fn render<'a>(
    records: impl IntoIterator<Item = &'a PeripheralRecord>,
    scanning: bool,
    leds: [bool; 3],
) -> ScreenView {
    let mut peripherals: Vec<PeripheralRow> =
        records.into_iter().map(PeripheralRow::from_record).collect();
    peripherals.sort_by(|a, b| a.id.cmp(&b.id));

    let any_connected = peripherals.iter().any(|p| p.connected);
    let led_controls = if any_connected {
        LedChannel::ALL
            .iter()
            .zip(leds)
            .map(|(&channel, active)| LedControl {
                channel,
                label: format!(
                    "Turn {} {} LED",
                    if active { "off" } else { "on" },
                    channel.label()
                ),
                active,
            })
            .collect()
    } else {
        Vec::new()
    };

    ScreenView {
        scanning,
        scan_button_label: if scanning { SCANNING_LABEL } else { SCAN_LABEL }.to_string(),
        retrieve_button_label: RETRIEVE_LABEL.to_string(),
        show_retrieve_button: !any_connected,
        empty_hint: peripherals.is_empty().then(|| EMPTY_HINT.to_string()),
        peripherals,
        led_controls,
    }
}

/// Receives re-renders and alerts
pub trait ViewSink: Send + Sync {
    fn render(&self, view: &ScreenView);
    fn alert(&self, alert: &Alert);
}

/// Re-renders the screen from the shared state whenever asked
#[derive(Clone)]
pub struct ScreenRenderer {
    registry: Arc<PeripheralRegistry>,
    scan_state: Arc<ScanState>,
    leds: Arc<LedToggles>,
    sink: Arc<dyn ViewSink>,
}

impl ScreenRenderer {
    pub fn new(
        registry: Arc<PeripheralRegistry>,
        scan_state: Arc<ScanState>,
        leds: Arc<LedToggles>,
        sink: Arc<dyn ViewSink>,
    ) -> Self {
        Self {
            registry,
            scan_state,
            leds,
            sink,
        }
    }

    pub fn screen(&self) -> ScreenView {
        let snapshot = self.registry.snapshot();
        render(
            snapshot.values(),
            self.scan_state.is_scanning(),
            self.leds.snapshot(),
        )
    }

    pub fn refresh(&self) {
        self.sink.render(&self.screen());
    }

    pub fn alert(&self, alert: Alert) {
        self.sink.alert(&alert);
    }
}

#[cfg(feature = "app")]
pub use tauri_sink::WindowViewSink;

#[cfg(feature = "app")]
mod tauri_sink {
    use log::error;
    use tauri::{AppHandle, Emitter};

    use super::{Alert, ScreenView, ViewSink};

    /// Emits `screen-updated` and `alert` events to the webview
    pub struct WindowViewSink {
        app_handle: AppHandle,
    }

    impl WindowViewSink {
        pub fn new(app_handle: AppHandle) -> Self {
            Self { app_handle }
        }
    }

    impl ViewSink for WindowViewSink {
        fn render(&self, view: &ScreenView) {
            if let Err(e) = self.app_handle.emit("screen-updated", view) {
                error!("Failed to emit screen-updated event: {}", e);
            }
        }

        fn alert(&self, alert: &Alert) {
            if let Err(e) = self.app_handle.emit("alert", alert) {
                error!("Failed to emit alert event: {}", e);
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::core::bluetooth::{LinkState, PeripheralInfo, TARGET_PERIPHERAL_ID};

    /// Keeps every render and alert it receives
    #[derive(Default)]
    pub struct RecordingSink {
        pub renders: Mutex<Vec<ScreenView>>,
        pub alerts: Mutex<Vec<Alert>>,
    }

    impl RecordingSink {
        pub fn last(&self) -> Option<ScreenView> {
            self.renders.lock().unwrap().last().cloned()
        }

        pub fn alerts(&self) -> Vec<Alert> {
            self.alerts.lock().unwrap().clone()
        }
    }

    impl ViewSink for RecordingSink {
        fn render(&self, view: &ScreenView) {
            self.renders.lock().unwrap().push(view.clone());
        }

        fn alert(&self, alert: &Alert) {
            self.alerts.lock().unwrap().push(alert.clone());
        }
    }

    fn record(link: LinkState, rssi: Option<i16>) -> PeripheralRecord {
        PeripheralRecord::discovered(PeripheralInfo::new(
            TARGET_PERIPHERAL_ID,
            Some("BLE-Device".into()),
            rssi,
        ))
        .with_link(link)
    }

    #[test]
    fn empty_screen_offers_scan_and_retrieve() {
        let none: [&PeripheralRecord; 0] = [];
        let view = render(none, false, [false; 3]);
        assert_eq!(view.scan_button_label, SCAN_LABEL);
        assert!(view.show_retrieve_button);
        assert_eq!(view.empty_hint.as_deref(), Some(EMPTY_HINT));
        assert!(view.led_controls.is_empty());
    }

    #[test]
    fn scanning_changes_the_button_label() {
        let none: [&PeripheralRecord; 0] = [];
        let view = render(none, true, [false; 3]);
        assert_eq!(view.scan_button_label, SCANNING_LABEL);
    }

    #[test]
    fn connecting_row_gets_suffix() {
        let r = record(LinkState::Connecting, Some(-48));
        let view = render([&r], false, [false; 3]);
        assert_eq!(view.peripherals[0].title, "BLE-Device - Connecting...");
        assert_eq!(view.peripherals[0].rssi_label, "RSSI: -48");
        assert!(view.empty_hint.is_none());
        assert!(view.show_retrieve_button);
    }

    #[test]
    fn connected_peripheral_shows_led_controls() {
        let r = record(LinkState::Connected, None);
        let view = render([&r], false, [true, false, false]);

        assert!(!view.show_retrieve_button);
        assert!(view.peripherals[0].connected);
        let labels: Vec<_> = view.led_controls.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(
            labels,
            ["Turn off RED LED", "Turn on GREEN LED", "Turn on YELLOW LED"]
        );
        assert!(view.led_controls[0].active);
    }

    #[test]
    fn rows_are_ordered_by_id() {
        let a = PeripheralRecord::already_connected(PeripheralInfo::new("b", None, None));
        let b = PeripheralRecord::already_connected(PeripheralInfo::new("a", None, None));
        let view = render([&a, &b], false, [false; 3]);
        let ids: Vec<_> = view.peripherals.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
    }
}
