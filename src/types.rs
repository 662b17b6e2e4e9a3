//! Shared primitive IDs, operation kinds, and statuses.

use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Milliseconds since the Unix epoch.
pub type TimestampMs = u64;
/// Store-assigned insertion sequence.
pub type QueueSeq = u64;

/// Opaque, never reused mutation identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MutationId(String);

impl MutationId {
    /// Generates a fresh random identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Returns the identifier text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for MutationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for MutationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for MutationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Closed set of intents the queue can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationType {
    /// Create a task.
    CreateTask,
    /// Update a task.
    UpdateTask,
    /// Delete a task.
    DeleteTask,
    /// Create a habit.
    CreateHabit,
    /// Update a habit.
    UpdateHabit,
    /// Record a mood entry.
    LogMood,
    /// Create a journal entry.
    CreateJournal,
    /// Update a journal entry.
    UpdateJournal,
    /// Create a calendar event.
    CreateEvent,
    /// Update a calendar event.
    UpdateEvent,
    /// Delete a calendar event.
    DeleteEvent,
    /// Record an activity.
    LogActivity,
    /// Create a goal.
    CreateGoal,
    /// Update a goal.
    UpdateGoal,
}

impl OperationType {
    /// Every operation type, in declaration order.
    pub const ALL: [OperationType; 14] = [
        OperationType::CreateTask,
        OperationType::UpdateTask,
        OperationType::DeleteTask,
        OperationType::CreateHabit,
        OperationType::UpdateHabit,
        OperationType::LogMood,
        OperationType::CreateJournal,
        OperationType::UpdateJournal,
        OperationType::CreateEvent,
        OperationType::UpdateEvent,
        OperationType::DeleteEvent,
        OperationType::LogActivity,
        OperationType::CreateGoal,
        OperationType::UpdateGoal,
    ];

    /// Wire name, e.g. `create-task`.
    pub fn as_str(self) -> &'static str {
        match self {
            OperationType::CreateTask => "create-task",
            OperationType::UpdateTask => "update-task",
            OperationType::DeleteTask => "delete-task",
            OperationType::CreateHabit => "create-habit",
            OperationType::UpdateHabit => "update-habit",
            OperationType::LogMood => "log-mood",
            OperationType::CreateJournal => "create-journal",
            OperationType::UpdateJournal => "update-journal",
            OperationType::CreateEvent => "create-event",
            OperationType::UpdateEvent => "update-event",
            OperationType::DeleteEvent => "delete-event",
            OperationType::LogActivity => "log-activity",
            OperationType::CreateGoal => "create-goal",
            OperationType::UpdateGoal => "update-goal",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OperationType::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| format!("unknown operation type: {s}"))
    }
}

/// Queue-side lifecycle status. Success has no status: the record is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationStatus {
    /// Waiting for the next sync pass.
    Pending,
    /// Remote call in flight.
    Syncing,
    /// Last remote call failed; waits for an explicit retry.
    Failed,
}

impl MutationStatus {
    /// Column value used by the SQLite sink.
    pub fn as_str(self) -> &'static str {
        match self {
            MutationStatus::Pending => "pending",
            MutationStatus::Syncing => "syncing",
            MutationStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for MutationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub(crate) fn now_ms() -> TimestampMs {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
