//! Authoritative mutation queue with synchronous write-through.

use hashbrown::HashMap;
use serde_json::Value;
use tracing::{debug, info};

use crate::{
    mutation::{MutationRecord, QueueStats},
    op::Op,
    persist::{PersistError, QueueSink},
    types::{MutationId, MutationStatus, OperationType, QueueSeq, now_ms},
};

use super::indices::StatusIndex;

/// Failure of a queue store operation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The durable medium could not complete the write.
    #[error("storage error: {0}")]
    Persist(#[from] PersistError),
}

/// Keyed mutation records indexed by status and FIFO position.
///
/// Every mutating call hands its ops to the sink first and only updates
/// memory once the sink accepted them, so a returned `Ok` means the change
/// is in storage and a returned `Err` means nothing changed.
#[derive(Default)]
pub struct QueueStore {
    records: HashMap<MutationId, MutationRecord>,
    index: StatusIndex,
    next_seq: QueueSeq,
    sink: Option<Box<dyn QueueSink>>,
}

impl std::fmt::Debug for QueueStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueStore")
            .field("records", &self.records.len())
            .field("next_seq", &self.next_seq)
            .field("durable", &self.sink.is_some())
            .finish()
    }
}

impl QueueStore {
    /// Creates an empty, memory-only store.
    pub fn new() -> Self {
        Self {
            next_seq: 1,
            ..Self::default()
        }
    }

    /// Creates an empty store writing through to `sink`.
    pub fn with_sink(sink: Box<dyn QueueSink>) -> Self {
        Self {
            next_seq: 1,
            sink: Some(sink),
            ..Self::default()
        }
    }

    /// Rebuilds a store from already persisted records.
    pub fn from_records(records: Vec<MutationRecord>, sink: Option<Box<dyn QueueSink>>) -> Self {
        let mut store = Self {
            next_seq: 1,
            sink,
            ..Self::default()
        };
        for rec in records {
            store.next_seq = store.next_seq.max(rec.seq.saturating_add(1));
            store.apply_op(Op::Put { record: rec });
        }
        store
    }

    /// Returns true when writes reach a durable sink.
    pub fn is_durable(&self) -> bool {
        self.sink.is_some()
    }

    /// Records a new `pending` mutation and returns its id.
    pub fn enqueue(
        &mut self,
        operation_type: OperationType,
        payload: Value,
        correlation_id: Option<String>,
    ) -> Result<MutationId, StoreError> {
        let id = MutationId::generate();
        let seq = self.next_seq;
        let record = MutationRecord::new_pending(
            id.clone(),
            operation_type,
            payload,
            correlation_id,
            now_ms(),
            seq,
        );

        self.commit(vec![Op::Put { record }])?;
        self.next_seq += 1;
        info!(%id, operation = %operation_type, "mutation queued");
        Ok(id)
    }

    /// Looks up a record by id.
    pub fn get(&self, id: &MutationId) -> Option<&MutationRecord> {
        self.records.get(id)
    }

    /// Owned variant of [`QueueStore::get`].
    pub fn get_cloned(&self, id: &MutationId) -> Option<MutationRecord> {
        self.get(id).cloned()
    }

    /// Records with `status`, oldest first.
    pub fn list_by_status(&self, status: MutationStatus) -> Vec<&MutationRecord> {
        self.index
            .ordered_with(status)
            .filter_map(|id| self.records.get(id))
            .collect()
    }

    /// Owned variant of [`QueueStore::list_by_status`].
    pub fn list_by_status_cloned(&self, status: MutationStatus) -> Vec<MutationRecord> {
        self.list_by_status(status).into_iter().cloned().collect()
    }

    /// Every record, oldest first.
    pub fn list_all(&self) -> Vec<&MutationRecord> {
        self.index
            .ordered()
            .filter_map(|id| self.records.get(id))
            .collect()
    }

    /// Owned variant of [`QueueStore::list_all`].
    pub fn list_all_cloned(&self) -> Vec<MutationRecord> {
        self.list_all().into_iter().cloned().collect()
    }

    /// Moves a record to `status`.
    ///
    /// Returns the updated record, or `None` when `id` is not queued.
    pub fn set_status(
        &mut self,
        id: &MutationId,
        status: MutationStatus,
        error: Option<String>,
    ) -> Result<Option<MutationRecord>, StoreError> {
        let Some(current) = self.records.get(id) else {
            return Ok(None);
        };
        let record = current.transitioned(status, error);
        self.commit(vec![Op::Put {
            record: record.clone(),
        }])?;
        debug!(%id, %status, "mutation status updated");
        Ok(Some(record))
    }

    /// Deletes a record. Removing an absent id is a no-op returning `false`.
    pub fn remove(&mut self, id: &MutationId) -> Result<bool, StoreError> {
        if !self.records.contains_key(id) {
            return Ok(false);
        }
        self.commit(vec![Op::Remove { id: id.clone() }])?;
        debug!(%id, "mutation removed");
        Ok(true)
    }

    /// Drops every record. Debug/test use only.
    pub fn clear(&mut self) -> Result<usize, StoreError> {
        let count = self.records.len();
        self.commit(vec![Op::Clear])?;
        info!(count, "queue cleared");
        Ok(count)
    }

    /// Record counts by status.
    pub fn stats(&self) -> QueueStats {
        QueueStats {
            total: self.index.len(),
            pending: self.index.count(MutationStatus::Pending),
            syncing: self.index.count(MutationStatus::Syncing),
            failed: self.index.count(MutationStatus::Failed),
        }
    }

    /// Upserts `records` by id in one batch.
    ///
    /// Insertion sequences are reassigned in input order and `last_error` is
    /// dropped from records that are not `failed`.
    pub fn import(&mut self, records: Vec<MutationRecord>) -> Result<usize, StoreError> {
        let mut seq = self.next_seq;
        let ops: Vec<Op> = records
            .into_iter()
            .map(|mut record| {
                record.seq = seq;
                seq += 1;
                if record.status != MutationStatus::Failed {
                    record.last_error = None;
                }
                Op::Put { record }
            })
            .collect();
        let count = ops.len();

        self.commit(ops)?;
        self.next_seq = seq;
        info!(count, "mutations imported");
        Ok(count)
    }

    /// Moves one `failed` record back to `pending`, keeping its retry count.
    pub fn retry(&mut self, id: &MutationId) -> Result<bool, StoreError> {
        match self.records.get(id) {
            Some(rec) if rec.status == MutationStatus::Failed => {
                let record = rec.requeued();
                self.commit(vec![Op::Put { record }])?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Moves every `failed` record back to `pending` in one batch.
    pub fn retry_all_failed(&mut self) -> Result<usize, StoreError> {
        let count = self.requeue_all(MutationStatus::Failed)?;
        info!(count, "retrying failed mutations");
        Ok(count)
    }

    /// Returns records stranded in `syncing` by an interrupted pass to
    /// `pending`.
    pub fn requeue_interrupted(&mut self) -> Result<usize, StoreError> {
        let count = self.requeue_all(MutationStatus::Syncing)?;
        if count > 0 {
            info!(count, "requeued interrupted mutations");
        }
        Ok(count)
    }

    /// Forces sink buffers to stable storage.
    pub fn flush(&mut self) -> Result<(), StoreError> {
        if let Some(sink) = self.sink.as_mut() {
            sink.flush()?;
        }
        Ok(())
    }

    fn requeue_all(&mut self, from: MutationStatus) -> Result<usize, StoreError> {
        let ops: Vec<Op> = self
            .list_by_status(from)
            .into_iter()
            .map(|rec| Op::Put {
                record: rec.requeued(),
            })
            .collect();
        let count = ops.len();
        if count > 0 {
            self.commit(ops)?;
        }
        Ok(count)
    }

    fn commit(&mut self, ops: Vec<Op>) -> Result<(), StoreError> {
        if let Some(sink) = self.sink.as_mut() {
            sink.apply_ops(&ops)?;
        }
        for op in ops {
            self.apply_op(op);
        }
        Ok(())
    }

    fn apply_op(&mut self, op: Op) {
        match op {
            Op::Put { record } => {
                if let Some(prev) = self.records.get(&record.id) {
                    self.index.remove(prev);
                }
                self.index.insert(&record);
                self.records.insert(record.id.clone(), record);
            }
            Op::Remove { id } => {
                if let Some(prev) = self.records.remove(&id) {
                    self.index.remove(&prev);
                }
            }
            Op::Clear => {
                self.records.clear();
                self.index.clear();
            }
        }
    }
}
