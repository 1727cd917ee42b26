//! Wire events exchanged between sibling stores.
//!
//! Every payload on the group channel is a JSON-encoded event carrying the
//! origin token of the process that produced it. The channel may deliver a
//! process's own events back to it; receivers drop those echoes by
//! comparing origins.

use crate::store::path::KeyPath;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event name for mutation broadcasts.
pub const EVENT_MUTATE: &str = "mutate";

/// Event name for sync handshake requests.
pub const EVENT_SYNC_REQUEST: &str = "sync-request";

/// Event name for sync handshake completions.
pub const EVENT_SYNC_COMPLETE: &str = "sync-complete";

/// Random per-process token distinguishing locally-caused events from
/// echoes of a process's own writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OriginId(u64);

impl OriginId {
    /// Generate a fresh random origin token.
    pub fn generate() -> Self {
        Self(rand::random())
    }
}

impl std::fmt::Display for OriginId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// A state change to apply to a sibling's tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Mutation {
    /// An entry was written.
    Set {
        path: KeyPath,
        value: Value,
        expires_at: Option<u64>,
    },
    /// An entry (or subtree) was removed.
    Delete { path: KeyPath },
}

/// A broadcast mutation, stamped with its origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationEvent {
    pub origin: OriginId,
    #[serde(flatten)]
    pub mutation: Mutation,
}

/// A late joiner asking the leader for a fresh snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRequest {
    pub id: u64,
    pub origin: OriginId,
}

/// The leader's answer: the snapshot file now holds its current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncComplete {
    pub id: u64,
    pub origin: OriginId,
}

/// Encode an event for the wire.
pub fn encode<T: Serialize>(event: &T) -> Result<Bytes, serde_json::Error> {
    serde_json::to_vec(event).map(Bytes::from)
}

/// Decode an event received from the wire.
pub fn decode<'a, T: Deserialize<'a>>(payload: &'a [u8]) -> Result<T, serde_json::Error> {
    serde_json::from_slice(payload)
}
