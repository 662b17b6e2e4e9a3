use serde::Deserialize;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::{
    core::store::{QueueStore, StoreError},
    mutation::{MutationRecord, QueueStats},
    types::{MutationId, MutationStatus, OperationType},
};

/// Failure of a call through [`QueueHandle`].
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// The store rejected the operation.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The queue task has stopped.
    #[error("queue task is not running")]
    ChannelClosed,
}

/// Tuning for the queue task.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Bound of the command channel.
    pub command_bound: usize,
    /// Return records left `syncing` by a previous process to `pending` on start.
    pub requeue_interrupted: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            command_bound: 256,
            requeue_interrupted: true,
        }
    }
}

/// Cloneable async front of a [`QueueStore`] owned by a single writer task.
#[derive(Clone)]
pub struct QueueHandle {
    cmd_tx: mpsc::Sender<Command>,
}

enum Command {
    Enqueue {
        operation_type: OperationType,
        payload: Value,
        correlation_id: Option<String>,
        resp: oneshot::Sender<Result<MutationId, RuntimeError>>,
    },
    Get {
        id: MutationId,
        resp: oneshot::Sender<Option<MutationRecord>>,
    },
    ListByStatus {
        status: MutationStatus,
        resp: oneshot::Sender<Vec<MutationRecord>>,
    },
    ListAll {
        resp: oneshot::Sender<Vec<MutationRecord>>,
    },
    SetStatus {
        id: MutationId,
        status: MutationStatus,
        error: Option<String>,
        resp: oneshot::Sender<Result<Option<MutationRecord>, RuntimeError>>,
    },
    Remove {
        id: MutationId,
        resp: oneshot::Sender<Result<bool, RuntimeError>>,
    },
    Clear {
        resp: oneshot::Sender<Result<usize, RuntimeError>>,
    },
    Stats {
        resp: oneshot::Sender<QueueStats>,
    },
    Import {
        records: Vec<MutationRecord>,
        resp: oneshot::Sender<Result<usize, RuntimeError>>,
    },
    Retry {
        id: MutationId,
        resp: oneshot::Sender<Result<bool, RuntimeError>>,
    },
    RetryAllFailed {
        resp: oneshot::Sender<Result<usize, RuntimeError>>,
    },
    Shutdown {
        resp: oneshot::Sender<Result<(), RuntimeError>>,
    },
}

/// Moves `store` onto a blocking writer task and returns its handle.
///
/// Must be called from within a tokio runtime.
pub fn spawn_queue(mut store: QueueStore, config: QueueConfig) -> QueueHandle {
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<Command>(config.command_bound.max(1));

    tokio::task::spawn_blocking(move || {
        if config.requeue_interrupted {
            if let Err(err) = store.requeue_interrupted() {
                warn!(error = %err, "could not requeue interrupted mutations");
            }
        }

        while let Some(cmd) = cmd_rx.blocking_recv() {
            if handle_command(cmd, &mut store) {
                break;
            }
        }
        debug!("queue task stopped");
    });

    QueueHandle { cmd_tx }
}

impl QueueHandle {
    async fn call<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(build(tx))
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    /// Records a new `pending` mutation; the write is durable on return.
    pub async fn enqueue(
        &self,
        operation_type: OperationType,
        payload: Value,
        correlation_id: Option<String>,
    ) -> Result<MutationId, RuntimeError> {
        self.call(|resp| Command::Enqueue {
            operation_type,
            payload,
            correlation_id,
            resp,
        })
        .await?
    }

    /// Looks up a record by id.
    pub async fn get(&self, id: &MutationId) -> Result<Option<MutationRecord>, RuntimeError> {
        let id = id.clone();
        self.call(|resp| Command::Get { id, resp }).await
    }

    /// Records with `status`, oldest first.
    pub async fn list_by_status(
        &self,
        status: MutationStatus,
    ) -> Result<Vec<MutationRecord>, RuntimeError> {
        self.call(|resp| Command::ListByStatus { status, resp }).await
    }

    /// Every record, oldest first. Doubles as the export operation.
    pub async fn list_all(&self) -> Result<Vec<MutationRecord>, RuntimeError> {
        self.call(|resp| Command::ListAll { resp }).await
    }

    /// Moves a record to `status`; `None` when the id is not queued.
    pub async fn set_status(
        &self,
        id: &MutationId,
        status: MutationStatus,
        error: Option<String>,
    ) -> Result<Option<MutationRecord>, RuntimeError> {
        let id = id.clone();
        self.call(|resp| Command::SetStatus {
            id,
            status,
            error,
            resp,
        })
        .await?
    }

    /// Idempotent delete.
    pub async fn remove(&self, id: &MutationId) -> Result<bool, RuntimeError> {
        let id = id.clone();
        self.call(|resp| Command::Remove { id, resp }).await?
    }

    /// Destructive reset for tests and debugging.
    pub async fn clear(&self) -> Result<usize, RuntimeError> {
        self.call(|resp| Command::Clear { resp }).await?
    }

    /// Record counts by status.
    pub async fn stats(&self) -> Result<QueueStats, RuntimeError> {
        self.call(|resp| Command::Stats { resp }).await
    }

    /// Bulk upsert, mainly for fixtures.
    pub async fn import(&self, records: Vec<MutationRecord>) -> Result<usize, RuntimeError> {
        self.call(|resp| Command::Import { records, resp }).await?
    }

    /// Flips one `failed` record to `pending`.
    pub async fn retry(&self, id: &MutationId) -> Result<bool, RuntimeError> {
        let id = id.clone();
        self.call(|resp| Command::Retry { id, resp }).await?
    }

    /// Flips every `failed` record to `pending`; a later pass picks them up.
    pub async fn retry_all_failed(&self) -> Result<usize, RuntimeError> {
        self.call(|resp| Command::RetryAllFailed { resp }).await?
    }

    /// Flushes the sink and stops the writer task.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        self.call(|resp| Command::Shutdown { resp }).await?
    }
}

fn handle_command(cmd: Command, store: &mut QueueStore) -> bool {
    match cmd {
        Command::Enqueue {
            operation_type,
            payload,
            correlation_id,
            resp,
        } => {
            let res = store
                .enqueue(operation_type, payload, correlation_id)
                .map_err(RuntimeError::from);
            let _ = resp.send(res);
        }
        Command::Get { id, resp } => {
            let _ = resp.send(store.get_cloned(&id));
        }
        Command::ListByStatus { status, resp } => {
            let _ = resp.send(store.list_by_status_cloned(status));
        }
        Command::ListAll { resp } => {
            let _ = resp.send(store.list_all_cloned());
        }
        Command::SetStatus {
            id,
            status,
            error,
            resp,
        } => {
            let res = store
                .set_status(&id, status, error)
                .map_err(RuntimeError::from);
            let _ = resp.send(res);
        }
        Command::Remove { id, resp } => {
            let _ = resp.send(store.remove(&id).map_err(RuntimeError::from));
        }
        Command::Clear { resp } => {
            let _ = resp.send(store.clear().map_err(RuntimeError::from));
        }
        Command::Stats { resp } => {
            let _ = resp.send(store.stats());
        }
        Command::Import { records, resp } => {
            let _ = resp.send(store.import(records).map_err(RuntimeError::from));
        }
        Command::Retry { id, resp } => {
            let _ = resp.send(store.retry(&id).map_err(RuntimeError::from));
        }
        Command::RetryAllFailed { resp } => {
            let _ = resp.send(store.retry_all_failed().map_err(RuntimeError::from));
        }
        Command::Shutdown { resp } => {
            let _ = resp.send(store.flush().map_err(RuntimeError::from));
            return true;
        }
    }

    false
}
