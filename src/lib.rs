//! Durable offline mutation queue with a background sync engine.
//!
//! # Examples
//!
//! In-memory usage with [`core::store::QueueStore`]:
//! ```
//! use offlineq::{
//!     core::store::QueueStore,
//!     types::{MutationStatus, OperationType},
//! };
//! use serde_json::json;
//!
//! let mut store = QueueStore::new();
//! let id = store
//!     .enqueue(OperationType::CreateTask, json!({"title": "A"}), None)
//!     .expect("enqueue");
//! assert_eq!(store.get(&id).map(|r| r.status), Some(MutationStatus::Pending));
//! assert_eq!(store.stats().pending, 1);
//! ```
//!
//! Runtime usage with a SQLite sink and the HTTP remote:
//! ```no_run
//! use std::sync::Arc;
//!
//! use offlineq::{
//!     engine::{
//!         dispatch::DispatchTable,
//!         remote::{HttpRemote, RemoteConfig},
//!         sync::SyncEngine,
//!     },
//!     persist::sqlite::SqliteQueueSink,
//!     runtime::{
//!         handle::{spawn_queue, QueueConfig},
//!         trigger::{connectivity, spawn_auto_sync, TriggerConfig},
//!     },
//!     types::OperationType,
//! };
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let store = SqliteQueueSink::open("queue.db")
//!     .expect("open sqlite")
//!     .load_store()
//!     .expect("load");
//! let queue = spawn_queue(store, QueueConfig::default());
//! let remote = HttpRemote::new(&RemoteConfig::default()).expect("remote");
//! let (network, online) = connectivity(false);
//! let engine = SyncEngine::new(queue.clone(), Arc::new(remote), DispatchTable::default(), online);
//!
//! let _listener = engine.add_listener(|event| println!("{}", event.kind()));
//! let _trigger = spawn_auto_sync(engine.clone(), TriggerConfig::default());
//!
//! queue
//!     .enqueue(OperationType::LogMood, json!({"rating": 4}), None)
//!     .await
//!     .expect("enqueue");
//! network.set_online(true);
//! # }
//! ```
#![deny(missing_docs)]

/// Core queue store and index helpers.
pub mod core;
/// Dispatch table, remote client, and sync pass.
pub mod engine;
/// Queued mutation record and statistics.
pub mod mutation;
/// Store ops and on-disk envelope types.
pub mod op;
/// Persistence abstraction and SQLite implementation.
pub mod persist;
/// Queue task handle, events, and triggers.
pub mod runtime;
/// Shared primitive types and enums.
pub mod types;
