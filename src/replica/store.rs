//! Public store handle, lifecycle, and mutation protocol.
//!
//! A [`MirrorStore`] owns the local copy of the tree and two background
//! tasks: the broadcast listener and the GC loop. Local reads and writes
//! are synchronous; the broadcast of a write happens independently and
//! siblings apply it when it arrives. The lifecycle is a one-way
//! `Connected → Closed` machine gating every public operation.

use crate::core::config::StoreConfig;
use crate::core::error::{StoreError, StoreResult};
use crate::core::time::{expiry_for_ttl, now_ms};
use crate::storage::snapshot::SnapshotFile;
use crate::store::path::KeyPath;
use crate::store::tree::{Entry, StoreTree};
use crate::sync::channel::GroupChannel;
use crate::sync::election::LeaderElection;
use crate::sync::event::{
    self, Mutation, MutationEvent, OriginId, SyncRequest, EVENT_MUTATE, EVENT_SYNC_REQUEST,
};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

/// Lifecycle state of a store instance. The transition is one-way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Lifecycle {
    Connected,
    Closed,
}

/// Mutable state behind the store's lock.
pub(crate) struct StoreState {
    pub(crate) tree: StoreTree,
    pub(crate) lifecycle: Lifecycle,
}

/// State shared between the public handle and the background tasks.
pub(crate) struct Shared {
    pub(crate) name: String,
    pub(crate) origin: OriginId,
    pub(crate) config: StoreConfig,
    pub(crate) snapshot: SnapshotFile,
    pub(crate) channel: Arc<dyn GroupChannel>,
    pub(crate) election: Arc<dyn LeaderElection>,
    pub(crate) state: Mutex<StoreState>,
    pub(crate) pending_syncs: Mutex<HashMap<u64, oneshot::Sender<()>>>,
    shutdown: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Shared {
    pub(crate) fn ensure_connected(&self, state: &StoreState) -> StoreResult<()> {
        match state.lifecycle {
            Lifecycle::Connected => Ok(()),
            Lifecycle::Closed => Err(StoreError::closed(&self.name)),
        }
    }

    /// Encode and publish an event on this store's group.
    pub(crate) fn publish<T: Serialize>(&self, event_name: &str, event: &T) -> StoreResult<()> {
        let payload = event::encode(event).map_err(|err| StoreError::Channel {
            event: event_name.to_owned(),
            message: err.to_string(),
        })?;
        self.channel.publish(&self.name, event_name, payload)
    }

    /// Broadcast a mutation, best-effort.
    ///
    /// The local write has already been applied; a failed broadcast is
    /// logged and siblings converge at their next sync.
    pub(crate) fn broadcast_mutation(&self, mutation: Mutation) {
        let event = MutationEvent {
            origin: self.origin,
            mutation,
        };
        if let Err(err) = self.publish(EVENT_MUTATE, &event) {
            tracing::warn!(store = %self.name, error = %err, "mutation broadcast failed");
        }
    }

    /// Write the current tree to the snapshot file.
    ///
    /// A closed store has nothing left to flush.
    pub(crate) fn flush(&self) -> StoreResult<()> {
        let tree = {
            let state = self.state.lock();
            if state.lifecycle == Lifecycle::Closed {
                return Ok(());
            }
            state.tree.clone()
        };
        self.snapshot.write(&tree)
    }

    /// Stop background tasks and fail pending sync requests.
    async fn teardown(&self) {
        let _ = self.shutdown.send(true);

        let tasks: Vec<JoinHandle<()>> = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            let _ = task.await;
        }

        // Dropping the senders fails in-flight sync() calls with Closed.
        self.pending_syncs.lock().clear();
    }
}

/// Counters describing a store instance.
#[derive(Debug, Clone)]
pub struct StoreStats {
    /// Entries in the tree, expired-but-unswept included.
    pub total_entries: usize,
    /// Entries currently live.
    pub live_entries: usize,
    /// Whether the store is still connected.
    pub connected: bool,
}

/// A process's copy of a TTL store shared across machine-local siblings.
///
/// Cloning the handle is cheap; every clone drives the same instance.
/// Call [`close`](Self::close) (or [`destroy`](Self::destroy)) when done —
/// the background tasks run until told to stop.
#[derive(Clone)]
pub struct MirrorStore {
    shared: Arc<Shared>,
}

impl MirrorStore {
    /// Create a store, subscribe it to its group, and start its
    /// background tasks. Must be called from within a tokio runtime.
    ///
    /// `name` identifies the logical store: it is both the group channel
    /// name and the snapshot file's base name, and must be unique per
    /// logical store on the machine. The store starts empty; call
    /// [`sync`](Self::sync) to bootstrap from the leader's snapshot.
    pub fn new(
        name: impl Into<String>,
        config: StoreConfig,
        channel: Arc<dyn GroupChannel>,
        election: Arc<dyn LeaderElection>,
    ) -> StoreResult<Self> {
        config
            .validate()
            .map_err(|err| StoreError::Config {
                message: err.to_string(),
            })?;

        let name = name.into();
        let snapshot = SnapshotFile::for_store(&config.snapshot_dir, &name);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let shared = Arc::new(Shared {
            origin: OriginId::generate(),
            snapshot,
            channel,
            election,
            state: Mutex::new(StoreState {
                tree: StoreTree::new(),
                lifecycle: Lifecycle::Connected,
            }),
            pending_syncs: Mutex::new(HashMap::new()),
            shutdown: shutdown_tx,
            tasks: Mutex::new(Vec::new()),
            config,
            name,
        });

        let listener = super::listener::spawn(shared.clone(), shutdown_rx.clone());
        let gc = super::gc::spawn(shared.clone(), shutdown_rx);
        shared.tasks.lock().extend([listener, gc]);

        tracing::info!(
            store = %shared.name,
            origin = %shared.origin,
            snapshot = %shared.snapshot.path().display(),
            "store connected"
        );

        Ok(Self { shared })
    }

    /// The store's cluster-wide name.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// This process's origin token.
    pub fn origin(&self) -> OriginId {
        self.shared.origin
    }

    /// Directory holding the snapshot file.
    pub fn snapshot_dir(&self) -> &Path {
        &self.shared.config.snapshot_dir
    }

    /// Full path of the snapshot file.
    pub fn snapshot_path(&self) -> &Path {
        self.shared.snapshot.path()
    }

    /// Whether the store is still usable.
    pub fn connected(&self) -> bool {
        self.shared.state.lock().lifecycle == Lifecycle::Connected
    }

    /// Whether the store has been closed or destroyed.
    pub fn closed(&self) -> bool {
        !self.connected()
    }

    /// Current entry counters.
    pub fn stats(&self) -> StoreStats {
        let now = now_ms();
        let state = self.shared.state.lock();
        StoreStats {
            total_entries: state.tree.total_count(),
            live_entries: state.tree.live_count(now),
            connected: state.lifecycle == Lifecycle::Connected,
        }
    }

    /// Write `value` at `path` with a TTL in milliseconds (0 = permanent).
    ///
    /// The write is applied locally at once and broadcast to siblings.
    /// Writing a value and expiry identical to the current live entry is
    /// a no-op: no tree write, no broadcast. Returns the value as stored.
    pub fn set(&self, path: &str, value: Value, ttl_ms: u64) -> StoreResult<Value> {
        let path = KeyPath::parse(path)?;
        let now = now_ms();
        let expires_at = expiry_for_ttl(now, ttl_ms);

        {
            let mut state = self.shared.state.lock();
            self.shared.ensure_connected(&state)?;

            if let Some(current) = state.tree.live(&path, now) {
                if current.value == value && current.expires_at == expires_at {
                    tracing::trace!(store = %self.shared.name, %path, "unchanged set suppressed");
                    return Ok(current.value.clone());
                }
            }

            state.tree.set(&path, Entry::new(value.clone(), expires_at));
        }

        self.shared.broadcast_mutation(Mutation::Set {
            path,
            value: value.clone(),
            expires_at,
        });
        Ok(value)
    }

    /// Read the live value at `path`, if any.
    ///
    /// Returns a deep copy; mutating it never touches store state. An
    /// expired entry reads as absent even before the sweep removes it.
    pub fn get(&self, path: &str) -> StoreResult<Option<Value>> {
        let path = KeyPath::parse(path)?;
        let state = self.shared.state.lock();
        self.shared.ensure_connected(&state)?;
        Ok(state
            .tree
            .live(&path, now_ms())
            .map(|entry| entry.value.clone()))
    }

    /// Whether a live entry exists at `path`.
    pub fn has(&self, path: &str) -> StoreResult<bool> {
        let path = KeyPath::parse(path)?;
        let state = self.shared.state.lock();
        self.shared.ensure_connected(&state)?;
        Ok(state.tree.live(&path, now_ms()).is_some())
    }

    /// Remove the entry (or subtree) at `path`, unconditionally.
    ///
    /// Broadcasts only when something was actually removed.
    pub fn delete(&self, path: &str) -> StoreResult<bool> {
        let path = KeyPath::parse(path)?;

        let removed = {
            let mut state = self.shared.state.lock();
            self.shared.ensure_connected(&state)?;
            state.tree.remove(&path)
        };

        if removed {
            self.shared.broadcast_mutation(Mutation::Delete { path });
        }
        Ok(removed)
    }

    /// Resynchronize from the leader's snapshot.
    ///
    /// Broadcasts a sync request and waits, bounded by the configured
    /// timeout, for the leader to flush and acknowledge; then loads the
    /// snapshot file and replaces the whole in-memory tree with it. On
    /// timeout or read failure the local tree is left untouched.
    pub async fn sync(&self) -> StoreResult<()> {
        {
            let state = self.shared.state.lock();
            self.shared.ensure_connected(&state)?;
        }

        let id: u64 = rand::random();
        let (tx, rx) = oneshot::channel();
        self.shared.pending_syncs.lock().insert(id, tx);

        let request = SyncRequest {
            id,
            origin: self.shared.origin,
        };
        if let Err(err) = self.shared.publish(EVENT_SYNC_REQUEST, &request) {
            self.shared.pending_syncs.lock().remove(&id);
            return Err(err);
        }

        match tokio::time::timeout(self.shared.config.sync_timeout(), rx).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => {
                // The pending sender was dropped: the store closed under us.
                return Err(StoreError::closed(&self.shared.name));
            }
            Err(_) => {
                self.shared.pending_syncs.lock().remove(&id);
                return Err(StoreError::SyncTimeout {
                    waited_ms: self.shared.config.sync_timeout_ms,
                });
            }
        }

        let tree = self.shared.snapshot.read()?;

        let mut state = self.shared.state.lock();
        self.shared.ensure_connected(&state)?;
        state.tree.replace(tree);
        tracing::debug!(store = %self.shared.name, "replaced state from snapshot");
        Ok(())
    }

    /// Close the store: flush once if leader, stop the background tasks,
    /// and drop all in-memory data. Idempotent; the transition is final.
    pub async fn close(&self) -> StoreResult<()> {
        let tree = {
            let mut state = self.shared.state.lock();
            if state.lifecycle == Lifecycle::Closed {
                return Ok(());
            }
            state.lifecycle = Lifecycle::Closed;
            std::mem::take(&mut state.tree)
        };

        // Final flush covers writes landed since the last GC tick.
        let flush_result = if self.shared.election.is_leader().await {
            self.shared.snapshot.write(&tree)
        } else {
            Ok(())
        };

        self.shared.teardown().await;
        tracing::info!(store = %self.shared.name, "store closed");

        flush_result
    }

    /// Tear the store down and delete its snapshot file.
    ///
    /// No final flush: the persisted state is being discarded, not
    /// preserved. Idempotent, and also removes the file when called after
    /// `close()`.
    pub async fn destroy(&self) -> StoreResult<()> {
        {
            let mut state = self.shared.state.lock();
            state.lifecycle = Lifecycle::Closed;
            state.tree.clear();
        }

        self.shared.teardown().await;
        self.shared.snapshot.remove()?;
        tracing::info!(store = %self.shared.name, "store destroyed");
        Ok(())
    }
}

impl std::fmt::Debug for MirrorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MirrorStore")
            .field("name", &self.shared.name)
            .field("origin", &self.shared.origin)
            .field("connected", &self.connected())
            .finish()
    }
}
