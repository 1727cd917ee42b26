//! Snapshot file codec.
//!
//! The snapshot is a self-contained versioned JSON document holding the
//! whole tree, expiries inlined with their values. Writes go to a sibling
//! temp file first and are renamed into place, so a concurrent reader
//! observes either the previous snapshot or the new one — never a partial
//! file. The file is single-writer by leader election, not by locking.

use crate::core::error::{StoreError, StoreResult};
use crate::core::time::now_ms;
use crate::store::tree::StoreTree;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Snapshot document format version.
const FORMAT_VERSION: u32 = 1;

/// File extension for snapshot files.
pub const SNAPSHOT_EXTENSION: &str = "cache";

/// The on-disk snapshot document.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SnapshotDoc {
    /// Format version for forward-compatibility checks.
    version: u32,

    /// When this snapshot was flushed, epoch milliseconds.
    flushed_at: u64,

    /// The full tree, expiries inlined per leaf.
    root: StoreTree,
}

/// Handle to a store's snapshot file.
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    /// Snapshot file handle for the named store inside `dir`.
    ///
    /// The file is `<dir>/<name>.cache`; siblings of the same logical
    /// store derive the same path from their shared name and directory.
    pub fn for_store(dir: &Path, name: &str) -> Self {
        Self {
            path: dir.join(format!("{name}.{SNAPSHOT_EXTENSION}")),
        }
    }

    /// Full path of the snapshot file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serialize `tree` and atomically replace the snapshot file.
    pub fn write(&self, tree: &StoreTree) -> StoreResult<()> {
        let doc = SnapshotDoc {
            version: FORMAT_VERSION,
            flushed_at: now_ms(),
            root: tree.clone(),
        };

        let io_err = |source| StoreError::SnapshotIo {
            path: self.path.clone(),
            source,
        };

        let bytes = serde_json::to_vec(&doc).map_err(|err| io_err(err.into()))?;
        let tmp = self.path.with_extension("tmp");

        let mut file = std::fs::File::create(&tmp).map_err(io_err)?;
        file.write_all(&bytes).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        drop(file);

        std::fs::rename(&tmp, &self.path).map_err(io_err)
    }

    /// Read and decode the snapshot file.
    ///
    /// A missing file is a first boot and reads as an empty tree. Decode
    /// failures and unsupported versions are errors; the caller must not
    /// apply a partial result over live state.
    pub fn read(&self) -> StoreResult<StoreTree> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(StoreTree::new());
            }
            Err(source) => {
                return Err(StoreError::SnapshotIo {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let doc: SnapshotDoc =
            serde_json::from_slice(&bytes).map_err(|source| StoreError::SnapshotDecode {
                path: self.path.clone(),
                source,
            })?;

        if doc.version != FORMAT_VERSION {
            return Err(StoreError::SnapshotVersion {
                path: self.path.clone(),
                version: doc.version,
            });
        }

        Ok(doc.root)
    }

    /// Delete the snapshot file; a file that never existed is fine.
    pub fn remove(&self) -> StoreResult<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::SnapshotIo {
                path: self.path.clone(),
                source,
            }),
        }
    }
}
