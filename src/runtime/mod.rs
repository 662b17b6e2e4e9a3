//! Single-writer queue task, sync events, and triggers.

/// Sync event types and listener registry.
pub mod events;
/// Queue handle and command loop implementation.
pub mod handle;
/// Connectivity signal and auto-sync trigger.
pub mod trigger;
