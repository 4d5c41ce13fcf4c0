//! Transport lifecycle events and the listener registry they are delivered through.
//!
//! Listeners subscribe to one [`EventKind`] each and get back a
//! [`Subscription`]. Removing every subscription a screen took is what
//! tears its handlers down.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, warn};
use serde::Serialize;
use uuid::Uuid;

use crate::core::bluetooth::types::PeripheralInfo;

/// Events emitted by a transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TransportEvent {
    DiscoverPeripheral(PeripheralInfo),
    StopScan,
    DisconnectPeripheral {
        peripheral_id: String,
    },
    UpdateValueForCharacteristic {
        peripheral_id: String,
        characteristic: Uuid,
        value: Vec<u8>,
    },
}

impl TransportEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::DiscoverPeripheral(_) => EventKind::DiscoverPeripheral,
            Self::StopScan => EventKind::StopScan,
            Self::DisconnectPeripheral { .. } => EventKind::DisconnectPeripheral,
            Self::UpdateValueForCharacteristic { .. } => EventKind::UpdateValueForCharacteristic,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    DiscoverPeripheral,
    StopScan,
    DisconnectPeripheral,
    UpdateValueForCharacteristic,
}

pub type EventHandler = Arc<dyn Fn(&TransportEvent) + Send + Sync>;

/// Handle returned by [`EventEmitter::add_listener`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription {
    id: u64,
    kind: EventKind,
}

impl Subscription {
    pub fn kind(&self) -> EventKind {
        self.kind
    }
}

struct Listener {
    id: u64,
    kind: EventKind,
    handler: EventHandler,
}

/// Fan-out of transport events to registered listeners
#[derive(Default)]
pub struct EventEmitter {
    next_id: AtomicU64,
    listeners: Mutex<Vec<Listener>>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    fn listeners(&self) -> MutexGuard<'_, Vec<Listener>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_listener(&self, kind: EventKind, handler: EventHandler) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners().push(Listener { id, kind, handler });
        debug!("Listener {} added for {:?}", id, kind);
        Subscription { id, kind }
    }

    /// Removes a listener. Returns false if it was already gone.
    pub fn remove_listener(&self, subscription: Subscription) -> bool {
        let mut listeners = self.listeners();
        let before = listeners.len();
        listeners.retain(|l| l.id != subscription.id);
        before != listeners.len()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners().len()
    }

    /// Delivers an event to every listener of its kind.
    ///
    /// Handlers run after the listener lock is released, so they may add or
    /// remove listeners themselves.
    pub fn emit(&self, event: TransportEvent) {
        let kind = event.kind();
        let handlers: Vec<EventHandler> = self
            .listeners()
            .iter()
            .filter(|l| l.kind == kind)
            .map(|l| l.handler.clone())
            .collect();

        if handlers.is_empty() {
            warn!("No listener for {:?}, event dropped", kind);
            return;
        }
        for handler in handlers {
            handler(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter(kind: EventKind, emitter: &EventEmitter) -> (Arc<AtomicUsize>, Subscription) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let sub = emitter.add_listener(
            kind,
            Arc::new(move |_: &TransportEvent| {
                c.fetch_add(1, Ordering::SeqCst);
            }),
        );
        (count, sub)
    }

    #[test]
    fn delivers_only_to_matching_kind() {
        let emitter = EventEmitter::new();
        let (stops, _) = counter(EventKind::StopScan, &emitter);
        let (discoveries, _) = counter(EventKind::DiscoverPeripheral, &emitter);

        emitter.emit(TransportEvent::StopScan);
        emitter.emit(TransportEvent::StopScan);

        assert_eq!(stops.load(Ordering::SeqCst), 2);
        assert_eq!(discoveries.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn removed_listener_receives_nothing() {
        let emitter = EventEmitter::new();
        let (stops, sub) = counter(EventKind::StopScan, &emitter);

        assert!(emitter.remove_listener(sub));
        assert!(!emitter.remove_listener(sub));
        emitter.emit(TransportEvent::StopScan);

        assert_eq!(stops.load(Ordering::SeqCst), 0);
        assert_eq!(emitter.listener_count(), 0);
    }

    #[test]
    fn handler_may_unsubscribe_during_emit() {
        let emitter = Arc::new(EventEmitter::new());
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let e = emitter.clone();
        let s = slot.clone();
        let sub = emitter.add_listener(
            EventKind::StopScan,
            Arc::new(move |_: &TransportEvent| {
                if let Some(sub) = s.lock().unwrap().take() {
                    e.remove_listener(sub);
                }
            }),
        );
        *slot.lock().unwrap() = Some(sub);

        emitter.emit(TransportEvent::StopScan);
        assert_eq!(emitter.listener_count(), 0);
    }
}
