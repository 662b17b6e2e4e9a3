//! Sync pass over the pending set.
//!
//! Failed records are never retried on a timer. They stay `failed` until
//! something calls [`QueueHandle::retry`] or [`QueueHandle::retry_all_failed`]
//! and then runs another pass.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use tracing::{debug, error, info, warn};

use crate::{
    mutation::MutationRecord,
    runtime::{
        events::{EventBus, ListenerHandle, SyncEvent},
        handle::{QueueHandle, RuntimeError},
        trigger::Connectivity,
    },
    types::MutationStatus,
};

use super::{
    dispatch::DispatchTable,
    remote::RemoteClient,
};

/// A pass could not start because the pending set was unreadable.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Fetching `pending` records failed.
    #[error("could not fetch pending mutations: {0}")]
    Fetch(#[source] RuntimeError),
}

/// Counts from one completed pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    /// Records delivered and removed.
    pub success: usize,
    /// Records moved to `failed`.
    pub failed: usize,
}

/// Result of asking for a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The pass ran to completion.
    Completed(SyncSummary),
    /// Another pass was in flight; this request merged into it.
    AlreadyRunning,
    /// The host reports no network.
    Offline,
}

struct Inner {
    queue: QueueHandle,
    remote: Arc<dyn RemoteClient>,
    table: DispatchTable,
    events: EventBus,
    connectivity: Connectivity,
    in_flight: AtomicBool,
}

/// Drains `pending` mutations against the remote service.
///
/// Cheap to clone; clones share the in-flight guard, so at most one pass runs
/// per engine.
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<Inner>,
}

enum Processed {
    Synced,
    /// Removed from the queue after the pass took its snapshot.
    Vanished,
}

struct PassGuard<'a>(&'a AtomicBool);

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl SyncEngine {
    /// Creates an engine over an injected queue and remote.
    pub fn new(
        queue: QueueHandle,
        remote: Arc<dyn RemoteClient>,
        table: DispatchTable,
        connectivity: Connectivity,
    ) -> Self {
        Self::with_events(queue, remote, table, connectivity, EventBus::default())
    }

    /// Like [`SyncEngine::new`] with a caller-owned event bus.
    pub fn with_events(
        queue: QueueHandle,
        remote: Arc<dyn RemoteClient>,
        table: DispatchTable,
        connectivity: Connectivity,
        events: EventBus,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                queue,
                remote,
                table,
                events,
                connectivity,
                in_flight: AtomicBool::new(false),
            }),
        }
    }

    /// Queue this engine drains.
    pub fn queue(&self) -> &QueueHandle {
        &self.inner.queue
    }

    /// Event bus this engine publishes to.
    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    /// Connectivity signal consulted by [`SyncEngine::should_sync`].
    pub fn connectivity(&self) -> &Connectivity {
        &self.inner.connectivity
    }

    /// Registers a sync event callback.
    pub fn add_listener<F>(&self, listener: F) -> ListenerHandle
    where
        F: Fn(&SyncEvent) + Send + Sync + 'static,
    {
        self.inner.events.add_listener(listener)
    }

    /// True when the host reports the network as available.
    pub fn should_sync(&self) -> bool {
        self.inner.connectivity.is_online()
    }

    /// True while a pass is running.
    pub fn is_syncing(&self) -> bool {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    /// Runs one pass over every `pending` record, oldest first.
    ///
    /// Per-record failures are reported through events and record status;
    /// only a failure to fetch the pending set is returned as an error.
    pub async fn sync_queue(&self) -> Result<SyncOutcome, SyncError> {
        if self
            .inner
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("sync pass already running");
            return Ok(SyncOutcome::AlreadyRunning);
        }
        let _guard = PassGuard(&self.inner.in_flight);

        self.run_pass().await.map(SyncOutcome::Completed)
    }

    /// Runs a pass only when [`SyncEngine::should_sync`] holds.
    pub async fn sync_if_online(&self) -> Result<SyncOutcome, SyncError> {
        if !self.should_sync() {
            debug!("offline, sync skipped");
            return Ok(SyncOutcome::Offline);
        }
        self.sync_queue().await
    }

    /// Runs another pass. Only records already moved back to `pending` are
    /// picked up.
    pub async fn retry_failed_mutations(&self) -> Result<SyncOutcome, SyncError> {
        info!("retrying failed mutations");
        self.sync_queue().await
    }

    async fn run_pass(&self) -> Result<SyncSummary, SyncError> {
        let events = &self.inner.events;
        info!("starting sync pass");
        events.emit(SyncEvent::SyncStart);

        let pending = match self.inner.queue.list_by_status(MutationStatus::Pending).await {
            Ok(pending) => pending,
            Err(err) => {
                error!(error = %err, "could not fetch pending mutations");
                events.emit(SyncEvent::SyncError {
                    error: err.to_string(),
                });
                return Err(SyncError::Fetch(err));
            }
        };

        let mut summary = SyncSummary::default();
        if pending.is_empty() {
            info!("no pending mutations to sync");
            events.emit(SyncEvent::SyncComplete {
                success_count: 0,
                failure_count: 0,
            });
            return Ok(summary);
        }

        info!(count = pending.len(), "found pending mutations");
        for mutation in pending {
            match self.process(&mutation).await {
                Ok(Processed::Synced) => {
                    summary.success += 1;
                    events.emit(SyncEvent::MutationSynced { mutation });
                }
                Ok(Processed::Vanished) => {}
                Err(message) => {
                    warn!(
                        id = %mutation.id,
                        operation = %mutation.operation_type,
                        error = %message,
                        "mutation failed to sync"
                    );
                    match self
                        .inner
                        .queue
                        .set_status(&mutation.id, MutationStatus::Failed, Some(message.clone()))
                        .await
                    {
                        Ok(None) => {
                            debug!(id = %mutation.id, "mutation removed before marking failed");
                            continue;
                        }
                        Ok(Some(_)) => {}
                        Err(err) => {
                            error!(id = %mutation.id, error = %err, "could not mark failed");
                        }
                    }
                    summary.failed += 1;
                    events.emit(SyncEvent::MutationFailed {
                        mutation,
                        error: message,
                    });
                }
            }
        }

        info!(
            succeeded = summary.success,
            failed = summary.failed,
            "sync pass complete"
        );
        events.emit(SyncEvent::SyncComplete {
            success_count: summary.success,
            failure_count: summary.failed,
        });
        Ok(summary)
    }

    /// Moves one record through `syncing` to removal; `Err` carries the text
    /// recorded as `last_error`.
    async fn process(&self, mutation: &MutationRecord) -> Result<Processed, String> {
        let queue = &self.inner.queue;
        let claimed = queue
            .set_status(&mutation.id, MutationStatus::Syncing, None)
            .await
            .map_err(|e| e.to_string())?;
        if claimed.is_none() {
            debug!(id = %mutation.id, "mutation removed since the pass started, skipping");
            return Ok(Processed::Vanished);
        }

        let request = self
            .inner
            .table
            .resolve(mutation.operation_type, &mutation.payload)
            .map_err(|e| e.to_string())?;

        debug!(
            id = %mutation.id,
            method = %request.method,
            path = %request.path(),
            "sending mutation"
        );
        self.inner
            .remote
            .send(&request)
            .await
            .map_err(|e| e.to_string())?;

        queue.remove(&mutation.id).await.map_err(|e| e.to_string())?;
        debug!(id = %mutation.id, "mutation synced");
        Ok(Processed::Synced)
    }
}
