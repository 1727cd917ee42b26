//! Leader election seam.
//!
//! Exactly one sibling should act as leader under normal operation, but
//! the store assumes no more than "eventually one": leadership is queried
//! fresh at every GC tick, at close, and when answering a sync request,
//! and concurrent leader flushes merely race on the atomic snapshot
//! replace.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Provider of the "am I the leader" answer for this process.
#[async_trait]
pub trait LeaderElection: Send + Sync {
    /// Whether this process currently holds leadership.
    async fn is_leader(&self) -> bool;
}

/// A leadership answer fixed at construction.
///
/// Useful for single-process deployments and tests where one store is
/// simply designated the leader.
#[derive(Debug, Clone, Copy)]
pub struct FixedLeader(bool);

impl FixedLeader {
    /// Always the leader.
    pub fn leader() -> Self {
        Self(true)
    }

    /// Never the leader.
    pub fn follower() -> Self {
        Self(false)
    }
}

#[async_trait]
impl LeaderElection for FixedLeader {
    async fn is_leader(&self) -> bool {
        self.0
    }
}

/// A reassignable leadership flag shared with an external elector.
///
/// The electing side keeps a clone and flips it as leadership moves; the
/// store observes the current value at each query point.
#[derive(Debug, Clone, Default)]
pub struct SharedLeaderFlag {
    flag: Arc<AtomicBool>,
}

impl SharedLeaderFlag {
    /// Create a flag starting as follower.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reassign leadership.
    pub fn set(&self, is_leader: bool) {
        self.flag.store(is_leader, Ordering::Release);
    }

    /// Current value of the flag.
    pub fn get(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

#[async_trait]
impl LeaderElection for SharedLeaderFlag {
    async fn is_leader(&self) -> bool {
        self.get()
    }
}
