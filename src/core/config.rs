//! Store configuration and validation.
//!
//! Configuration is plain data with serde defaults so embedding
//! applications can deserialize it straight out of their own config files.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for a [`MirrorStore`](crate::replica::MirrorStore) instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding the snapshot file.
    ///
    /// Siblings of the same logical store must agree on this directory;
    /// the sync handshake hands state over through the file inside it.
    #[serde(default = "default_snapshot_dir")]
    pub snapshot_dir: PathBuf,

    /// Period of the expiry sweep / leader flush cycle, in milliseconds.
    #[serde(default = "default_gc_interval_ms")]
    pub gc_interval_ms: u64,

    /// Upper bound on waiting for a sync handshake response, in milliseconds.
    #[serde(default = "default_sync_timeout_ms")]
    pub sync_timeout_ms: u64,
}

fn default_snapshot_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_gc_interval_ms() -> u64 {
    120_000
}

fn default_sync_timeout_ms() -> u64 {
    5_000
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            snapshot_dir: default_snapshot_dir(),
            gc_interval_ms: default_gc_interval_ms(),
            sync_timeout_ms: default_sync_timeout_ms(),
        }
    }
}

impl StoreConfig {
    /// Set the snapshot directory.
    pub fn with_snapshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.snapshot_dir = dir.into();
        self
    }

    /// Set the GC interval in milliseconds.
    pub fn with_gc_interval_ms(mut self, ms: u64) -> Self {
        self.gc_interval_ms = ms;
        self
    }

    /// Set the sync timeout in milliseconds.
    pub fn with_sync_timeout_ms(mut self, ms: u64) -> Self {
        self.sync_timeout_ms = ms;
        self
    }

    /// GC interval as a [`Duration`].
    pub fn gc_interval(&self) -> Duration {
        Duration::from_millis(self.gc_interval_ms)
    }

    /// Sync timeout as a [`Duration`].
    pub fn sync_timeout(&self) -> Duration {
        Duration::from_millis(self.sync_timeout_ms)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.gc_interval_ms == 0 {
            anyhow::bail!("gc_interval_ms must be > 0");
        }
        if self.sync_timeout_ms == 0 {
            anyhow::bail!("sync_timeout_ms must be > 0");
        }
        Ok(())
    }
}
