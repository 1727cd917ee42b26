//! Group transport seam.
//!
//! The store never talks to a transport directly; it publishes and
//! subscribes through [`GroupChannel`]. The contract is a named
//! publish/subscribe group with at-least-once delivery to every live
//! member and, at best, per-sender ordering. Delivery back to the sender
//! is allowed — receivers handle echoes by origin comparison, not by
//! transport guarantees.
//!
//! [`LocalGroupChannel`] is the in-process implementation used by tests
//! and by single-process deployments. Out-of-process transports implement
//! [`GroupChannel`] by pumping received frames into a topic fan-out of the
//! same shape.

use crate::core::error::StoreResult;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::broadcast;

/// Default per-topic buffer for the in-process channel.
const DEFAULT_TOPIC_CAPACITY: usize = 256;

/// A named publish/subscribe transport shared by sibling stores.
pub trait GroupChannel: Send + Sync {
    /// Publish `payload` to every subscriber of `(group, event)`.
    ///
    /// Publishing to a topic nobody subscribes to is not an error.
    fn publish(&self, group: &str, event: &str, payload: Bytes) -> StoreResult<()>;

    /// Subscribe to `(group, event)`.
    ///
    /// Only events published after the subscription exist for it.
    fn subscribe(&self, group: &str, event: &str) -> Subscription;
}

/// A live subscription to one `(group, event)` topic.
///
/// Dropping the subscription detaches it from the topic.
pub struct Subscription {
    rx: broadcast::Receiver<Bytes>,
}

impl Subscription {
    /// Wrap a broadcast receiver as a subscription.
    pub fn new(rx: broadcast::Receiver<Bytes>) -> Self {
        Self { rx }
    }

    /// Receive the next payload.
    ///
    /// Returns `None` once the topic is gone. A slow receiver that missed
    /// events skips them with a warning and keeps going; the sync
    /// handshake exists to repair exactly this kind of gap.
    pub async fn recv(&mut self) -> Option<Bytes> {
        loop {
            match self.rx.recv().await {
                Ok(payload) => return Some(payload),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "subscription lagged; events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// In-process group channel over tokio broadcast topics.
///
/// Every `(group, event)` pair gets its own fan-out; publishes are
/// delivered to all current subscribers, the publisher's own included.
pub struct LocalGroupChannel {
    capacity: usize,
    topics: Mutex<HashMap<(String, String), broadcast::Sender<Bytes>>>,
}

impl LocalGroupChannel {
    /// Create a channel with the default per-topic buffer.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_TOPIC_CAPACITY)
    }

    /// Create a channel with a custom per-topic buffer.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            topics: Mutex::new(HashMap::new()),
        }
    }

    fn topic(&self, group: &str, event: &str) -> broadcast::Sender<Bytes> {
        let mut topics = self.topics.lock();
        topics
            .entry((group.to_owned(), event.to_owned()))
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }
}

impl Default for LocalGroupChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl GroupChannel for LocalGroupChannel {
    fn publish(&self, group: &str, event: &str, payload: Bytes) -> StoreResult<()> {
        // A send error only means there are no subscribers right now.
        let _ = self.topic(group, event).send(payload);
        Ok(())
    }

    fn subscribe(&self, group: &str, event: &str) -> Subscription {
        Subscription::new(self.topic(group, event).subscribe())
    }
}

impl std::fmt::Debug for LocalGroupChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalGroupChannel")
            .field("capacity", &self.capacity)
            .field("topics", &self.topics.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fan_out_reaches_all_subscribers() {
        let channel = LocalGroupChannel::new();
        let mut a = channel.subscribe("cache", "mutate");
        let mut b = channel.subscribe("cache", "mutate");

        channel
            .publish("cache", "mutate", Bytes::from_static(b"hello"))
            .unwrap();

        assert_eq!(a.recv().await.unwrap(), Bytes::from_static(b"hello"));
        assert_eq!(b.recv().await.unwrap(), Bytes::from_static(b"hello"));
    }

    #[tokio::test]
    async fn test_topics_are_isolated() {
        let channel = LocalGroupChannel::new();
        let mut other_group = channel.subscribe("other", "mutate");
        let mut other_event = channel.subscribe("cache", "sync-request");
        let mut target = channel.subscribe("cache", "mutate");

        channel
            .publish("cache", "mutate", Bytes::from_static(b"x"))
            .unwrap();

        assert_eq!(target.recv().await.unwrap(), Bytes::from_static(b"x"));
        assert!(other_group.rx.try_recv().is_err());
        assert!(other_event.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_ok() {
        let channel = LocalGroupChannel::new();
        channel
            .publish("cache", "mutate", Bytes::from_static(b"void"))
            .unwrap();
    }

    #[tokio::test]
    async fn test_late_subscriber_misses_earlier_events() {
        let channel = LocalGroupChannel::new();
        channel
            .publish("cache", "mutate", Bytes::from_static(b"early"))
            .unwrap();

        let mut late = channel.subscribe("cache", "mutate");
        channel
            .publish("cache", "mutate", Bytes::from_static(b"later"))
            .unwrap();

        assert_eq!(late.recv().await.unwrap(), Bytes::from_static(b"later"));
    }
}
