//! Broadcast apply loop.
//!
//! One task per store instance drains the group subscriptions and applies
//! what arrives: remote mutations go straight into the tree (echoes of
//! this process's own writes are dropped by origin, and nothing is ever
//! re-broadcast), sync requests are answered when this process is the
//! leader, and sync completions wake the matching local waiter. A
//! malformed payload from a bad sibling is logged and skipped.

use super::store::{Lifecycle, Shared};
use crate::store::tree::Entry;
use crate::sync::event::{
    self, Mutation, MutationEvent, SyncComplete, SyncRequest, EVENT_MUTATE, EVENT_SYNC_COMPLETE,
    EVENT_SYNC_REQUEST,
};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Subscribe to the store's group and start the apply loop.
///
/// Subscriptions are taken before the task starts so no event published
/// after construction can be missed.
pub(crate) fn spawn(shared: Arc<Shared>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
    let mut mutations = shared.channel.subscribe(&shared.name, EVENT_MUTATE);
    let mut sync_requests = shared.channel.subscribe(&shared.name, EVENT_SYNC_REQUEST);
    let mut sync_completions = shared.channel.subscribe(&shared.name, EVENT_SYNC_COMPLETE);

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                payload = mutations.recv() => match payload {
                    Some(payload) => apply_mutation(&shared, &payload),
                    None => break,
                },
                payload = sync_requests.recv() => match payload {
                    Some(payload) => answer_sync_request(&shared, &payload).await,
                    None => break,
                },
                payload = sync_completions.recv() => match payload {
                    Some(payload) => complete_sync(&shared, &payload),
                    None => break,
                },
            }
        }
        tracing::debug!(store = %shared.name, "listener stopped");
    })
}

/// Apply a remotely-originated mutation to the local tree.
fn apply_mutation(shared: &Shared, payload: &[u8]) {
    let event: MutationEvent = match event::decode(payload) {
        Ok(event) => event,
        Err(err) => {
            tracing::warn!(store = %shared.name, error = %err, "dropping undecodable mutation");
            return;
        }
    };

    if event.origin == shared.origin {
        tracing::trace!(store = %shared.name, "ignoring echo of own write");
        return;
    }

    let mut state = shared.state.lock();
    if state.lifecycle == Lifecycle::Closed {
        return;
    }

    match event.mutation {
        Mutation::Set {
            path,
            value,
            expires_at,
        } => {
            tracing::debug!(store = %shared.name, %path, from = %event.origin, "applying remote set");
            state.tree.set(&path, Entry::new(value, expires_at));
        }
        Mutation::Delete { path } => {
            tracing::debug!(store = %shared.name, %path, from = %event.origin, "applying remote delete");
            state.tree.remove(&path);
        }
    }
}

/// Answer a sibling's sync request if this process is the leader.
///
/// Flush first, acknowledge second: the requester loads the file on
/// receipt of the ack, so the ack must never precede the data. A failed
/// flush leaves the request unanswered — the requester times out instead
/// of loading a stale snapshot.
async fn answer_sync_request(shared: &Shared, payload: &[u8]) {
    let request: SyncRequest = match event::decode(payload) {
        Ok(request) => request,
        Err(err) => {
            tracing::warn!(store = %shared.name, error = %err, "dropping undecodable sync request");
            return;
        }
    };

    if !shared.election.is_leader().await {
        return;
    }

    if let Err(err) = shared.flush() {
        tracing::warn!(
            store = %shared.name,
            error = %err,
            id = request.id,
            "flush failed; leaving sync request unanswered"
        );
        return;
    }

    let ack = SyncComplete {
        id: request.id,
        origin: shared.origin,
    };
    if let Err(err) = shared.publish(EVENT_SYNC_COMPLETE, &ack) {
        tracing::warn!(store = %shared.name, error = %err, id = request.id, "sync ack failed");
    }
}

/// Wake the local waiter matching a sync completion, if any.
fn complete_sync(shared: &Shared, payload: &[u8]) {
    let done: SyncComplete = match event::decode(payload) {
        Ok(done) => done,
        Err(err) => {
            tracing::warn!(store = %shared.name, error = %err, "dropping undecodable sync ack");
            return;
        }
    };

    if let Some(waiter) = shared.pending_syncs.lock().remove(&done.id) {
        tracing::debug!(store = %shared.name, id = done.id, from = %done.origin, "sync answered");
        let _ = waiter.send(());
    }
}
