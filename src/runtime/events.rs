//! Sync lifecycle events and listener registry.

use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{
        Arc, Mutex, Weak,
        atomic::{AtomicU64, Ordering},
    },
};

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::warn;

use crate::mutation::MutationRecord;

/// Events emitted by [`crate::engine::sync::SyncEngine`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SyncEvent {
    /// A pass began.
    SyncStart,
    /// A pass finished.
    #[serde(rename_all = "camelCase")]
    SyncComplete {
        /// Records delivered and removed.
        success_count: usize,
        /// Records moved to `failed`.
        failure_count: usize,
    },
    /// The pending set could not be fetched; the pass was abandoned.
    SyncError {
        /// Error description.
        error: String,
    },
    /// One record was delivered.
    MutationSynced {
        /// Record as fetched at the start of the pass.
        mutation: MutationRecord,
    },
    /// One record failed.
    MutationFailed {
        /// Record as fetched at the start of the pass.
        mutation: MutationRecord,
        /// Failure description.
        error: String,
    },
}

impl SyncEvent {
    /// Wire name of the event kind, e.g. `sync-start`.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncEvent::SyncStart => "sync-start",
            SyncEvent::SyncComplete { .. } => "sync-complete",
            SyncEvent::SyncError { .. } => "sync-error",
            SyncEvent::MutationSynced { .. } => "mutation-synced",
            SyncEvent::MutationFailed { .. } => "mutation-failed",
        }
    }
}

type Listener = Arc<dyn Fn(&SyncEvent) + Send + Sync>;

struct Registry {
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_id: AtomicU64,
}

/// Fan-out of [`SyncEvent`]s to callback listeners and broadcast subscribers.
///
/// Nothing is retained: events emitted with no listener are dropped.
#[derive(Clone)]
pub struct EventBus {
    registry: Arc<Registry>,
    tx: broadcast::Sender<SyncEvent>,
}

/// Registration returned by [`EventBus::add_listener`].
///
/// Dropping it leaves the listener registered; call [`ListenerHandle::remove`]
/// to unregister.
pub struct ListenerHandle {
    id: u64,
    registry: Weak<Registry>,
}

impl ListenerHandle {
    /// Unregisters the listener. Safe to call after the bus is gone.
    pub fn remove(self) {
        if let Some(registry) = self.registry.upgrade() {
            let mut listeners = registry
                .listeners
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            listeners.retain(|(id, _)| *id != self.id);
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl EventBus {
    /// Creates a bus whose broadcast channel keeps `capacity` events per lagging subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            registry: Arc::new(Registry {
                listeners: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
            }),
            tx,
        }
    }

    /// Registers a callback invoked synchronously for every later event.
    pub fn add_listener<F>(&self, listener: F) -> ListenerHandle
    where
        F: Fn(&SyncEvent) + Send + Sync + 'static,
    {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        self.registry
            .listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((id, Arc::new(listener)));
        ListenerHandle {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Opens an async subscription receiving every later event.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.tx.subscribe()
    }

    /// Number of registered callback listeners.
    pub fn listener_count(&self) -> usize {
        self.registry
            .listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Delivers `event` to every listener in registration order, then to subscribers.
    ///
    /// A panicking listener is logged and skipped.
    pub fn emit(&self, event: SyncEvent) {
        let snapshot: Vec<Listener> = self
            .registry
            .listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();

        for listener in snapshot {
            if catch_unwind(AssertUnwindSafe(|| listener(&event))).is_err() {
                warn!(event = event.kind(), "sync listener panicked");
            }
        }

        let _ = self.tx.send(event);
    }
}
