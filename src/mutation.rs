//! Queued mutation record and queue statistics.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{MutationId, MutationStatus, OperationType, QueueSeq, TimestampMs};

/// Durable unit of work: one recorded user intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationRecord {
    /// Primary key.
    pub id: MutationId,
    /// Selects the remote route.
    pub operation_type: OperationType,
    /// Opaque data forwarded to the remote call.
    pub payload: Value,
    /// Enqueue time; orders records within a pass.
    pub created_at: TimestampMs,
    /// Number of transitions into [`MutationStatus::Failed`].
    pub retry_count: u32,
    /// Current lifecycle status.
    pub status: MutationStatus,
    /// Last failure text, only set while failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Caller-supplied handle for an optimistic local entity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    /// Tie-breaker for records sharing `created_at`.
    #[serde(default)]
    pub seq: QueueSeq,
}

impl MutationRecord {
    /// Builds a fresh `pending` record.
    pub fn new_pending(
        id: MutationId,
        operation_type: OperationType,
        payload: Value,
        correlation_id: Option<String>,
        created_at: TimestampMs,
        seq: QueueSeq,
    ) -> Self {
        Self {
            id,
            operation_type,
            payload,
            created_at,
            retry_count: 0,
            status: MutationStatus::Pending,
            last_error: None,
            correlation_id,
            seq,
        }
    }

    /// Returns a copy moved to `status`.
    ///
    /// Entering `Failed` bumps `retry_count` and records `error`; any other
    /// status drops `last_error`.
    pub fn transitioned(&self, status: MutationStatus, error: Option<String>) -> Self {
        let mut next = self.clone();
        next.status = status;
        if status == MutationStatus::Failed {
            next.retry_count = next.retry_count.saturating_add(1);
            next.last_error = Some(
                error
                    .filter(|e| !e.is_empty())
                    .unwrap_or_else(|| "Unknown error".to_string()),
            );
        } else {
            next.last_error = None;
        }
        next
    }

    /// Returns a copy moved back to `pending` without touching `retry_count`.
    pub fn requeued(&self) -> Self {
        let mut next = self.clone();
        next.status = MutationStatus::Pending;
        next.last_error = None;
        next
    }
}

/// Record counts by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    /// All records.
    pub total: usize,
    /// Records waiting for a pass.
    pub pending: usize,
    /// Records with a call in flight.
    pub syncing: usize,
    /// Records awaiting explicit retry.
    pub failed: usize,
}
