/// SQLite-backed sink.
pub mod sqlite;

use crate::op::Op;

/// Failure of the durable medium.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// SQLite rejected a statement.
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A record could not be encoded or decoded.
    #[error("serde: {0}")]
    Serde(#[from] serde_json::Error),
    /// Any other storage failure.
    #[error("{0}")]
    Message(String),
}

/// Result alias for sink operations.
pub type PersistResult<T> = Result<T, PersistError>;

/// Durable write target for store ops.
///
/// `apply_ops` must have taken effect in storage when it returns `Ok`; a
/// batch is applied atomically.
pub trait QueueSink: Send {
    /// Applies `ops` in order as one atomic batch.
    fn apply_ops(&mut self, ops: &[Op]) -> PersistResult<()>;
    /// Forces buffered writes to stable storage.
    fn flush(&mut self) -> PersistResult<()> {
        Ok(())
    }
}
