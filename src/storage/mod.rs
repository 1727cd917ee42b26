//! Snapshot persistence.
//!
//! One file per store instance holds the full serialized tree, written
//! only by the elected leader and read by late joiners during the sync
//! handshake.
//!
//! - [`snapshot`] - Snapshot file codec with atomic replace

pub mod snapshot;
