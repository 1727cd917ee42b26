//! Common test utilities.
//!
//! This module contains shared helpers for integration tests.
//! Import with `mod common;` in test files.

#![allow(dead_code)]

use bytes::Bytes;
use mirrorkv::{
    FixedLeader, GroupChannel, LeaderElection, LocalGroupChannel, MirrorStore, StoreConfig,
    Subscription,
};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// A machine-local "cluster": one shared in-process channel and one shared
/// snapshot directory. Each store created through it simulates one sibling
/// process.
pub struct Cluster {
    pub channel: Arc<LocalGroupChannel>,
    pub dir: TempDir,
}

impl Cluster {
    pub fn new() -> Self {
        // First caller wins; later calls are no-ops.
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();

        Self {
            channel: Arc::new(LocalGroupChannel::new()),
            dir: tempfile::tempdir().expect("Failed to create temp directory"),
        }
    }

    /// Base configuration: shared snapshot dir, GC parked far away so it
    /// never interferes unless a test asks for it.
    pub fn config(&self) -> StoreConfig {
        StoreConfig::default()
            .with_snapshot_dir(self.dir.path())
            .with_gc_interval_ms(60_000)
            .with_sync_timeout_ms(5_000)
    }

    /// Spawn a sibling with an explicit election provider and config.
    pub fn store_with(
        &self,
        name: &str,
        config: StoreConfig,
        election: Arc<dyn LeaderElection>,
    ) -> MirrorStore {
        MirrorStore::new(name, config, self.channel.clone(), election)
            .expect("Failed to create store")
    }

    /// Spawn the leader sibling for `name`.
    pub fn leader(&self, name: &str) -> MirrorStore {
        self.store_with(name, self.config(), Arc::new(FixedLeader::leader()))
    }

    /// Spawn a follower sibling for `name`.
    pub fn follower(&self, name: &str) -> MirrorStore {
        self.store_with(name, self.config(), Arc::new(FixedLeader::follower()))
    }

    /// Raw tap on one of the group's event topics, for counting what
    /// actually went over the wire.
    pub fn tap(&self, name: &str, event: &str) -> Subscription {
        self.channel.subscribe(name, event)
    }

    /// Publish a raw payload into the group, as a misbehaving or foreign
    /// sibling would.
    pub fn inject(&self, name: &str, event: &str, payload: Bytes) {
        self.channel
            .publish(name, event, payload)
            .expect("Failed to publish");
    }
}

impl Default for Cluster {
    fn default() -> Self {
        Self::new()
    }
}

/// Give the listener tasks a turn to drain pending events.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

/// Sleep a test-scaled real duration.
pub async fn sleep_ms(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

/// Next payload on a tap, or `None` if nothing arrives promptly.
pub async fn try_next(sub: &mut Subscription) -> Option<Bytes> {
    tokio::time::timeout(Duration::from_millis(100), sub.recv())
        .await
        .ok()
        .flatten()
}

/// Count the payloads currently drainable from a tap.
pub async fn drain(sub: &mut Subscription) -> usize {
    let mut count = 0;
    while try_next(sub).await.is_some() {
        count += 1;
    }
    count
}
