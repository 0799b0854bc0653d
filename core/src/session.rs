//! Process-wide session token and session events.
//!
//! # Design
//! The bearer token lives behind `Session`, a cheap-to-clone handle shared
//! by the executor and whatever owns login/logout. Storage is pluggable
//! through `TokenStore` so tests can observe reads and clears.
//!
//! Session teardown on 401 is published on a broadcast channel rather than
//! calling into navigation code: the executor only knows that the session
//! expired, a subscriber decides what to do about it. Clearing the token and
//! sending the event happen under the same lock, so nobody observes one
//! without the other.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;
use tracing::{debug, warn};

const EVENT_CAPACITY: usize = 16;

/// Storage for the bearer token.
pub trait TokenStore: Send {
    fn get(&self) -> Option<String>;
    fn set(&mut self, token: String);
    /// Remove and return the stored token.
    fn take(&mut self) -> Option<String>;
}

/// In-memory token storage.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: Option<String>,
}

impl TokenStore for MemoryTokenStore {
    fn get(&self) -> Option<String> {
        self.token.clone()
    }

    fn set(&mut self, token: String) {
        self.token = Some(token);
    }

    fn take(&mut self) -> Option<String> {
        self.token.take()
    }
}

/// Events published by `Session`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn,
    /// A request came back 401 and the stored token was discarded.
    Unauthorized,
}

struct Inner {
    store: Mutex<Box<dyn TokenStore>>,
    events: broadcast::Sender<SessionEvent>,
}

/// Shared handle to the session token.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

impl Session {
    pub fn new() -> Self {
        Self::with_store(MemoryTokenStore::default())
    }

    pub fn with_store(store: impl TokenStore + 'static) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                store: Mutex::new(Box::new(store)),
                events,
            }),
        }
    }

    pub fn token(&self) -> Option<String> {
        self.lock().get()
    }

    pub fn set_token(&self, token: impl Into<String>) {
        let mut store = self.lock();
        store.set(token.into());
        // No receivers is fine.
        let _ = self.inner.events.send(SessionEvent::SignedIn);
    }

    /// Explicit logout. Returns the discarded token; publishes nothing.
    pub fn clear(&self) -> Option<String> {
        self.lock().take()
    }

    /// Tear the session down after a 401.
    ///
    /// Only the call that actually removes a token publishes
    /// `SessionEvent::Unauthorized`; later calls find the store empty and
    /// return `false`.
    pub fn expire(&self) -> bool {
        let mut store = self.lock();
        if store.take().is_none() {
            debug!("session already cleared");
            return false;
        }
        warn!("session expired, token cleared");
        let _ = self.inner.events.send(SessionEvent::Unauthorized);
        true
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, Box<dyn TokenStore>> {
        self.inner.store.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("signed_in", &self.token().is_some())
            .finish()
    }
}
