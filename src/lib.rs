//! mirrorkv - Process-local synchronized TTL cache.
//!
//! mirrorkv keeps a path-addressed, TTL-aware key-value tree consistent
//! across sibling processes of the same machine-local cluster without an
//! external cache server. Every process holds a full in-memory copy;
//! mutations are broadcast to siblings over a named group channel; the
//! elected leader periodically persists a snapshot file that late joiners
//! pull in through a bounded sync handshake.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────┐   mutate / sync events   ┌───────────────┐
//! │  MirrorStore  │◄────────────────────────►│  MirrorStore  │
//! │  (process A)  │       GroupChannel       │  (process B)  │
//! └───────┬───────┘                          └───────┬───────┘
//!         │ leader flush                             │ sync load
//!         ▼                                          ▼
//!       ┌──────────────────────────────────────────────┐
//!       │            <dir>/<name>.cache                │
//!       │     (atomic snapshot, single-writer)         │
//!       └──────────────────────────────────────────────┘
//! ```
//!
//! # Module Organization
//!
//! ## Core
//! - [`core::config`] - Store configuration and validation
//! - [`core::error`] - Error types and result alias
//! - [`core::time`] - Epoch-millisecond clock helpers
//!
//! ## Store
//! - [`store::path`] - Dotted key path parsing
//! - [`store::tree`] - Nested entry tree with expiry sweep
//!
//! ## Storage
//! - [`storage::snapshot`] - Snapshot file codec with atomic replace
//!
//! ## Sync
//! - [`sync::event`] - Wire events exchanged between siblings
//! - [`sync::channel`] - Group transport seam and in-process implementation
//! - [`sync::election`] - Leader election seam
//!
//! ## Replica
//! - [`replica::store`] - Public store handle and mutation protocol
//! - [`replica::listener`] - Broadcast apply loop
//! - [`replica::gc`] - Periodic expiry sweep and leader flush
//!
//! # Consistency model
//!
//! Local reads and writes are synchronous against the process's own copy.
//! Siblings converge eventually: broadcasts carry no version vector, so
//! contradictory concurrent writes race and the last one applied locally
//! wins. The channel promises per-sender ordering at best, and may echo a
//! process's own events back to it — receivers drop echoes by origin
//! token. The snapshot file has a single writer (the leader, by election)
//! and any number of readers.
//!
//! # Example
//!
//! ```no_run
//! use mirrorkv::{FixedLeader, LocalGroupChannel, MirrorStore, StoreConfig};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn run() -> mirrorkv::StoreResult<()> {
//! let channel = Arc::new(LocalGroupChannel::new());
//! let store = MirrorStore::new(
//!     "sessions",
//!     StoreConfig::default(),
//!     channel,
//!     Arc::new(FixedLeader::leader()),
//! )?;
//!
//! store.set("bar.name", json!("World"), 0)?;
//! store.set("bar.greeting", json!("Hi"), 1_000)?;
//! assert_eq!(store.get("bar.name")?, Some(json!("World")));
//!
//! store.close().await?;
//! # Ok(())
//! # }
//! ```

// Core infrastructure
pub mod core;

// Path-addressed TTL tree
pub mod store;

// Snapshot persistence
pub mod storage;

// Cross-process synchronization
pub mod sync;

// The replicated store
pub mod replica;

// Re-exports for convenience
pub use crate::core::config::StoreConfig;
pub use crate::core::error::{StoreError, StoreResult};
pub use crate::replica::{MirrorStore, StoreStats};
pub use crate::store::path::KeyPath;
pub use crate::store::tree::{Entry, StoreTree};
pub use crate::sync::channel::{GroupChannel, LocalGroupChannel, Subscription};
pub use crate::sync::election::{FixedLeader, LeaderElection, SharedLeaderFlag};
pub use crate::sync::event::OriginId;
