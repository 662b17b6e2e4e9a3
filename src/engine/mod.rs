//! Sync engine: routing, remote calls, and the pass loop.

/// Operation type → route table.
pub mod dispatch;
/// Remote client trait and HTTP implementation.
pub mod remote;
/// Sync pass, retry, and in-flight guard.
pub mod sync;
