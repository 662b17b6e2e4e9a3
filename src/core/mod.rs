//! Core queue store and index helpers.

/// Per-status ordered index structures.
pub(crate) mod indices;
/// Authoritative queue store with write-through persistence.
pub mod store;
