// src/session.rs
use log::debug;
use std::sync::Arc;
use tokio::sync::watch;

/// Single slot holding the bearer token.
///
/// Cloning is cheap and every clone sees the same slot, so the request layer
/// and the views observe an invalidation as soon as it happens. Writes only
/// come from login, logout and a 401 response; the last one wins.
#[derive(Clone, Debug)]
pub struct Session {
    slot: Arc<watch::Sender<Option<String>>>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { slot: Arc::new(tx) }
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        let session = Self::new();
        session.set_token(token);
        session
    }

    pub fn token(&self) -> Option<String> {
        self.slot.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.slot.borrow().is_some()
    }

    pub fn set_token(&self, token: impl Into<String>) {
        self.slot.send_replace(Some(token.into()));
        debug!("session token stored");
    }

    pub fn clear(&self) {
        if self.slot.send_replace(None).is_some() {
            debug!("session token cleared");
        }
    }

    /// Receiver that wakes on every login, logout or invalidation.
    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.slot.subscribe()
    }
}
