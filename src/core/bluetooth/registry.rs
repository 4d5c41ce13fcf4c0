//! Peripheral registry
//! Maps peripheral identifiers to their current record. The map is an
//! immutable snapshot: every update builds a new map and swaps it in, so a
//! reader holding a snapshot never sees a half-applied change.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, info};

use crate::core::bluetooth::types::{LinkState, PeripheralInfo, PeripheralRecord};

pub type RegistrySnapshot = Arc<HashMap<String, PeripheralRecord>>;

pub struct PeripheralRegistry {
    target_id: String,
    snapshot: Mutex<RegistrySnapshot>,
}

impl PeripheralRegistry {
    /// Creates an empty registry keeping discoveries of `target_id` only
    pub fn new(target_id: impl Into<String>) -> Self {
        Self {
            target_id: target_id.into(),
            snapshot: Mutex::new(Arc::new(HashMap::new())),
        }
    }

    fn current(&self) -> MutexGuard<'_, RegistrySnapshot> {
        self.snapshot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copies the current map, applies `f` and publishes the copy if `f` reports a change.
    fn replace<F>(&self, f: F) -> bool
    where
        F: FnOnce(&mut HashMap<String, PeripheralRecord>) -> bool,
    {
        let mut current = self.current();
        let mut next = (**current).clone();
        let changed = f(&mut next);
        if changed {
            *current = Arc::new(next);
        }
        changed
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        self.current().clone()
    }

    pub fn get(&self, peripheral_id: &str) -> Option<PeripheralRecord> {
        self.current().get(peripheral_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.current().len()
    }

    pub fn is_empty(&self) -> bool {
        self.current().is_empty()
    }

    pub fn any_connected(&self) -> bool {
        self.current().values().any(PeripheralRecord::is_connected)
    }

    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    /// Drops every record.
    pub fn reset(&self) {
        *self.current() = Arc::new(HashMap::new());
        debug!("Peripheral registry cleared");
    }

    /// Records a discovery report. Returns false when the filter rejected it.
    ///
    /// Rediscovering a known peripheral refreshes its advertised data and
    /// keeps its link state.
    pub fn discovered(&self, info: PeripheralInfo) -> bool {
        if info.id != self.target_id {
            debug!("Ignoring peripheral {} (not the target)", info.id);
            return false;
        }
        self.replace(|map| {
            let link = map.get(&info.id).map(|r| r.link).unwrap_or_default();
            let record = PeripheralRecord::discovered(info).with_link(link);
            info!("Peripheral {} discovered as {:?}", record.id, record.display_name());
            map.insert(record.id.clone(), record);
            true
        })
    }

    /// Records a peripheral the system reports as already connected.
    pub fn already_connected(&self, info: PeripheralInfo) {
        self.replace(|map| {
            let record = PeripheralRecord::already_connected(info);
            map.insert(record.id.clone(), record);
            true
        });
    }

    /// Moves a known peripheral to `link`. Unknown identifiers are ignored.
    pub fn set_link(&self, peripheral_id: &str, link: LinkState) -> bool {
        self.replace(|map| match map.get(peripheral_id) {
            Some(record) if record.link != link => {
                let record = record.with_link(link);
                map.insert(record.id.clone(), record);
                true
            }
            _ => false,
        })
    }

    pub fn set_rssi(&self, peripheral_id: &str, rssi: i16) -> bool {
        self.replace(|map| match map.get(peripheral_id) {
            Some(record) => {
                let record = record.with_rssi(rssi);
                map.insert(record.id.clone(), record);
                true
            }
            None => false,
        })
    }
}
