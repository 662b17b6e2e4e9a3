//! SQLite-backed keyed mutation table.

use std::path::Path;

use rusqlite::{Connection, params};

use crate::{
    core::store::QueueStore,
    mutation::MutationRecord,
    op::{Op, RECORD_FORMAT_VERSION, RecordEnvelope},
};

use super::{PersistResult, QueueSink};

/// SQLite implementation of [`crate::persist::QueueSink`].
pub struct SqliteQueueSink {
    conn: Connection,
}

impl SqliteQueueSink {
    /// Opens or creates a SQLite-backed sink at `path`.
    ///
    /// Enables WAL mode and sets `synchronous=NORMAL`.
    pub fn open(path: impl AsRef<Path>) -> PersistResult<Self> {
        let conn = Connection::open(path)?;
        Self::init_connection(conn)
    }

    /// Opens an in-memory SQLite sink.
    pub fn open_in_memory() -> PersistResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_connection(conn)
    }

    fn init_connection(conn: Connection) -> PersistResult<Self> {
        conn.execute_batch(include_str!("schema.sql"))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Ok(Self { conn })
    }

    /// Loads every persisted record and hands this sink to a new store.
    pub fn load_store(self) -> PersistResult<QueueStore> {
        let records = self.load_records()?;
        Ok(QueueStore::from_records(records, Some(Box::new(self))))
    }

    /// Loads all records in FIFO order.
    pub fn load_records(&self) -> PersistResult<Vec<MutationRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT payload FROM mutations ORDER BY created_at ASC, seq ASC")?;

        let rows = stmt.query_map([], |row| {
            let payload: Vec<u8> = row.get(0)?;
            decode_record_payload(&payload).map_err(|err| {
                rusqlite::Error::FromSqlConversionFailure(
                    payload.len(),
                    rusqlite::types::Type::Blob,
                    Box::new(std::io::Error::other(err)),
                )
            })
        })?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Number of stored rows.
    pub fn row_count(&self) -> PersistResult<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM mutations", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

impl QueueSink for SqliteQueueSink {
    fn apply_ops(&mut self, ops: &[Op]) -> PersistResult<()> {
        if ops.is_empty() {
            return Ok(());
        }

        let tx = self.conn.transaction()?;
        {
            let mut put = tx.prepare(
                "INSERT INTO mutations(id, status, created_at, seq, payload) VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(id) DO UPDATE SET
                    status = excluded.status,
                    created_at = excluded.created_at,
                    seq = excluded.seq,
                    payload = excluded.payload",
            )?;
            let mut remove = tx.prepare("DELETE FROM mutations WHERE id = ?1")?;

            for op in ops {
                match op {
                    Op::Put { record } => {
                        let payload = serde_json::to_vec(&RecordEnvelope::new(record.clone()))?;
                        put.execute(params![
                            record.id.as_str(),
                            record.status.as_str(),
                            record.created_at as i64,
                            record.seq as i64,
                            payload,
                        ])?;
                    }
                    Op::Remove { id } => {
                        remove.execute(params![id.as_str()])?;
                    }
                    Op::Clear => {
                        tx.execute("DELETE FROM mutations", [])?;
                    }
                }
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn flush(&mut self) -> PersistResult<()> {
        self.conn.execute_batch("PRAGMA wal_checkpoint(PASSIVE);")?;
        Ok(())
    }
}

fn decode_record_payload(payload: &[u8]) -> Result<MutationRecord, String> {
    let envelope: RecordEnvelope = serde_json::from_slice(payload)
        .map_err(|e| format!("record payload decode failed: {e}"))?;
    if envelope.format_version != RECORD_FORMAT_VERSION {
        return Err(format!(
            "unsupported record format version: {}",
            envelope.format_version
        ));
    }
    Ok(envelope.record)
}

