//! Per-peripheral connection sessions
//! A session owns the cancel token of the tasks spawned for a connected
//! peripheral and the GATT handles resolved while it was connected.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::debug;
use tokio_util::sync::CancellationToken;

struct Session<K, H> {
    cancel_token: CancellationToken,
    handles: HashMap<K, H>,
}

impl<K, H> Session<K, H> {
    fn new() -> Self {
        Self {
            cancel_token: CancellationToken::new(),
            handles: HashMap::new(),
        }
    }
}

pub struct PeripheralSessions<K, H> {
    sessions: Mutex<HashMap<String, Session<K, H>>>,
}

impl<K, H> Default for PeripheralSessions<K, H> {
    fn default() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash, H: Clone> PeripheralSessions<K, H> {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Session<K, H>>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Token of the current session, opening one if needed.
    pub fn token(&self, peripheral_id: &str) -> CancellationToken {
        self.lock()
            .entry(peripheral_id.to_string())
            .or_insert_with(Session::new)
            .cancel_token
            .clone()
    }

    pub fn cached(&self, peripheral_id: &str, key: &K) -> Option<H> {
        self.lock().get(peripheral_id)?.handles.get(key).cloned()
    }

    pub fn cache(&self, peripheral_id: &str, key: K, handle: H) {
        self.lock()
            .entry(peripheral_id.to_string())
            .or_insert_with(Session::new)
            .handles
            .insert(key, handle);
    }

    /// Cancels the session's tasks and forgets its handles. Returns false if
    /// there was no session.
    pub fn end(&self, peripheral_id: &str) -> bool {
        match self.lock().remove(peripheral_id) {
            Some(session) => {
                session.cancel_token.cancel();
                debug!("[{}] session ended", peripheral_id);
                true
            }
            None => false,
        }
    }

    pub fn is_open(&self, peripheral_id: &str) -> bool {
        self.lock().contains_key(peripheral_id)
    }
}
