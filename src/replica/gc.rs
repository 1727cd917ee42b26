//! Periodic expiry sweep and leader flush.
//!
//! One timer per store instance. Each tick sweeps expired entries out of
//! the tree and, when this process is the leader, flushes a snapshot.
//! Both steps are best-effort: a flush failure is reported through
//! `tracing` and the loop continues on the next tick.

use super::store::{Lifecycle, Shared};
use crate::core::time::now_ms;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Start the GC loop. The first tick fires one full interval after start.
pub(crate) fn spawn(shared: Arc<Shared>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = shared.config.gc_interval();
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => run_cycle(&shared).await,
            }
        }
        tracing::debug!(store = %shared.name, "gc loop stopped");
    })
}

/// One sweep/flush cycle.
async fn run_cycle(shared: &Shared) {
    let removed = {
        let mut state = shared.state.lock();
        if state.lifecycle == Lifecycle::Closed {
            return;
        }
        state.tree.sweep_expired(now_ms())
    };

    if removed > 0 {
        tracing::debug!(store = %shared.name, removed, "swept expired entries");
    }

    if shared.election.is_leader().await {
        if let Err(err) = shared.flush() {
            tracing::warn!(store = %shared.name, error = %err, "leader flush failed");
        }
    }
}
