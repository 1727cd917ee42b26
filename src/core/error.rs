//! Error types for store operations.
//!
//! Two propagation regimes apply:
//! - direct API calls (`set`/`get`/`has`/`delete`/`sync`/`close`/`destroy`)
//!   surface errors synchronously to the caller;
//! - background work (GC sweep, leader flush, remote event application)
//!   reports failures through `tracing` and keeps running.

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by [`MirrorStore`](crate::replica::MirrorStore) operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Store construction rejected the supplied configuration.
    #[error("invalid configuration: {message}")]
    Config { message: String },

    /// Operation attempted after `close()` or `destroy()`.
    #[error("store '{name}' is closed")]
    Closed { name: String },

    /// A key path was empty or contained an empty segment.
    #[error("invalid key path '{path}'")]
    InvalidPath { path: String },

    /// No matching sync response arrived within the configured bound.
    ///
    /// The in-memory store is left untouched; the caller may retry.
    #[error("sync request timed out after {waited_ms}ms")]
    SyncTimeout { waited_ms: u64 },

    /// Snapshot file I/O failed.
    #[error("snapshot i/o failed for {path:?}")]
    SnapshotIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Snapshot file content could not be decoded.
    #[error("snapshot at {path:?} is not a valid snapshot document")]
    SnapshotDecode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Snapshot file carries an unsupported format version.
    #[error("snapshot at {path:?} has unsupported version {version}")]
    SnapshotVersion { path: PathBuf, version: u32 },

    /// The group channel rejected a publish.
    #[error("group channel rejected event '{event}': {message}")]
    Channel { event: String, message: String },
}

impl StoreError {
    /// Create a `Closed` error for the named store.
    pub fn closed(name: impl Into<String>) -> Self {
        Self::Closed { name: name.into() }
    }

    /// Create an `InvalidPath` error for the given raw path.
    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath { path: path.into() }
    }

    /// Check whether this error came from the persistence layer.
    ///
    /// Decode failures count: a snapshot that cannot be decoded is a
    /// persistence failure from the caller's point of view.
    pub fn is_persistence(&self) -> bool {
        matches!(
            self,
            Self::SnapshotIo { .. } | Self::SnapshotDecode { .. } | Self::SnapshotVersion { .. }
        )
    }

    /// Check whether the operation may be retried without intervention.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::SyncTimeout { .. })
    }
}

/// Result type using [`StoreError`].
pub type StoreResult<T> = Result<T, StoreError>;
