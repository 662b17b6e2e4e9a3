//! Store mutation ops and the versioned on-disk record envelope.

use serde::{Deserialize, Serialize};

use crate::{mutation::MutationRecord, types::MutationId};

/// Version number for serialized [`RecordEnvelope`] payloads.
pub const RECORD_FORMAT_VERSION: u16 = 1;

/// One write applied to the sink and then to memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Op {
    /// Insert or replace a record by id.
    Put {
        /// Full record state after the write.
        record: MutationRecord,
    },
    /// Delete a record by id.
    Remove {
        /// Record id to delete.
        id: MutationId,
    },
    /// Delete every record.
    Clear,
}

/// Versioned wrapper for stable on-disk payload decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordEnvelope {
    /// Payload format version.
    pub format_version: u16,
    /// Wrapped record.
    pub record: MutationRecord,
}

impl RecordEnvelope {
    /// Constructs an envelope using [`RECORD_FORMAT_VERSION`].
    pub fn new(record: MutationRecord) -> Self {
        Self {
            format_version: RECORD_FORMAT_VERSION,
            record,
        }
    }
}
