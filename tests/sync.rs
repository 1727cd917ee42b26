//! Cross-replica behavior: mutation propagation, echo suppression, and the
//! sync handshake.

mod common;

use common::{drain, settle, sleep_ms, Cluster};
use mirrorkv::sync::event::{
    encode, Mutation, MutationEvent, OriginId, EVENT_MUTATE,
};
use mirrorkv::{KeyPath, StoreError};
use serde_json::json;

#[tokio::test]
async fn test_mutations_propagate_between_siblings() {
    let cluster = Cluster::new();
    let a = cluster.leader("shared");
    let b = cluster.follower("shared");

    a.set("bar.name", json!("World"), 0).unwrap();
    settle().await;
    assert_eq!(b.get("bar.name").unwrap(), Some(json!("World")));

    b.set("bar.reply", json!("Hello"), 0).unwrap();
    settle().await;
    assert_eq!(a.get("bar.reply").unwrap(), Some(json!("Hello")));

    a.delete("bar.name").unwrap();
    settle().await;
    assert_eq!(b.get("bar.name").unwrap(), None);

    a.close().await.unwrap();
    b.close().await.unwrap();
}

#[tokio::test]
async fn test_two_process_ttl_scenario() {
    let cluster = Cluster::new();
    let a = cluster.leader("greetings");
    // B sweeps aggressively so expiry is observed quickly.
    let b = cluster.store_with(
        "greetings",
        cluster.config().with_gc_interval_ms(25),
        std::sync::Arc::new(mirrorkv::FixedLeader::follower()),
    );

    a.set("bar.name", json!("World"), 0).unwrap();
    a.set("bar.greeting", json!("Hi"), 80).unwrap();

    settle().await;
    assert_eq!(b.get("bar.greeting").unwrap(), Some(json!("Hi")));
    assert_eq!(b.get("bar.name").unwrap(), Some(json!("World")));

    // Past the TTL plus at least one sweep interval.
    sleep_ms(200).await;
    assert_eq!(b.get("bar.greeting").unwrap(), None);
    assert!(!b.has("bar.greeting").unwrap());
    assert_eq!(b.get("bar.name").unwrap(), Some(json!("World")));

    a.close().await.unwrap();
    b.close().await.unwrap();
}

#[tokio::test]
async fn test_echo_of_own_origin_is_ignored() {
    let cluster = Cluster::new();
    let store = cluster.leader("echoes");

    // An event stamped with the store's own origin is an echo, even if
    // the content is new: it must not be applied.
    let echo = MutationEvent {
        origin: store.origin(),
        mutation: Mutation::Set {
            path: KeyPath::parse("ghost").unwrap(),
            value: json!(42),
            expires_at: None,
        },
    };
    cluster.inject("echoes", EVENT_MUTATE, encode(&echo).unwrap());
    settle().await;
    assert_eq!(store.get("ghost").unwrap(), None);

    // The same event from a foreign origin is applied.
    let foreign = MutationEvent {
        origin: OriginId::generate(),
        mutation: Mutation::Set {
            path: KeyPath::parse("ghost").unwrap(),
            value: json!(42),
            expires_at: None,
        },
    };
    cluster.inject("echoes", EVENT_MUTATE, encode(&foreign).unwrap());
    settle().await;
    assert_eq!(store.get("ghost").unwrap(), Some(json!(42)));

    store.close().await.unwrap();
}

#[tokio::test]
async fn test_remote_apply_is_not_rebroadcast() {
    let cluster = Cluster::new();
    let store = cluster.leader("relay");
    let mut tap = cluster.tap("relay", EVENT_MUTATE);

    let foreign = MutationEvent {
        origin: OriginId::generate(),
        mutation: Mutation::Set {
            path: KeyPath::parse("k").unwrap(),
            value: json!(1),
            expires_at: None,
        },
    };
    cluster.inject("relay", EVENT_MUTATE, encode(&foreign).unwrap());
    settle().await;

    assert_eq!(store.get("k").unwrap(), Some(json!(1)));
    // Only the injected event went over the wire; applying it produced
    // no relay.
    assert_eq!(drain(&mut tap).await, 1);

    store.close().await.unwrap();
}

#[tokio::test]
async fn test_malformed_events_are_skipped() {
    let cluster = Cluster::new();
    let store = cluster.leader("garbage");

    cluster.inject("garbage", EVENT_MUTATE, bytes::Bytes::from_static(b"{oops"));
    settle().await;

    // The listener survives and keeps applying good events.
    let foreign = MutationEvent {
        origin: OriginId::generate(),
        mutation: Mutation::Set {
            path: KeyPath::parse("after").unwrap(),
            value: json!("still alive"),
            expires_at: None,
        },
    };
    cluster.inject("garbage", EVENT_MUTATE, encode(&foreign).unwrap());
    settle().await;
    assert_eq!(store.get("after").unwrap(), Some(json!("still alive")));

    store.close().await.unwrap();
}

#[tokio::test]
async fn test_sync_replaces_diverged_state_wholesale() {
    let cluster = Cluster::new();
    let a = cluster.leader("authority");
    let b = cluster.follower("authority");

    a.set("x", json!(1), 0).unwrap();
    a.set("y", json!(2), 0).unwrap();
    settle().await;

    // Diverge B only: stamp the event with A's origin so A drops it as
    // an echo while B applies it.
    let divergence = MutationEvent {
        origin: a.origin(),
        mutation: Mutation::Set {
            path: KeyPath::parse("ghost").unwrap(),
            value: json!("only-on-b"),
            expires_at: None,
        },
    };
    cluster.inject("authority", EVENT_MUTATE, encode(&divergence).unwrap());
    settle().await;
    assert_eq!(b.get("ghost").unwrap(), Some(json!("only-on-b")));
    assert_eq!(a.get("ghost").unwrap(), None);

    // The handshake replaces B's tree with the leader's snapshot; the
    // divergent entry does not survive a merge-free reload.
    b.sync().await.unwrap();
    assert_eq!(b.get("ghost").unwrap(), None);
    assert_eq!(b.get("x").unwrap(), Some(json!(1)));
    assert_eq!(b.get("y").unwrap(), Some(json!(2)));

    a.close().await.unwrap();
    b.close().await.unwrap();
}

#[tokio::test]
async fn test_sync_times_out_when_nobody_answers() {
    let cluster = Cluster::new();
    let store = cluster.store_with(
        "orphan",
        cluster.config().with_sync_timeout_ms(100),
        std::sync::Arc::new(mirrorkv::FixedLeader::follower()),
    );

    store.set("local", json!("state"), 0).unwrap();

    match store.sync().await {
        Err(StoreError::SyncTimeout { waited_ms }) => assert_eq!(waited_ms, 100),
        other => panic!("expected SyncTimeout, got {other:?}"),
    }

    // Prior local state is untouched.
    assert_eq!(store.get("local").unwrap(), Some(json!("state")));

    store.close().await.unwrap();
}

#[tokio::test]
async fn test_leader_can_sync_against_itself() {
    let cluster = Cluster::new();
    let store = cluster.leader("selfie");

    store.set("k", json!("v"), 0).unwrap();
    store.sync().await.unwrap();
    assert_eq!(store.get("k").unwrap(), Some(json!("v")));

    store.close().await.unwrap();
}

#[tokio::test]
async fn test_close_fails_a_sync_in_flight() {
    let cluster = Cluster::new();
    let store = cluster.follower("impatient");

    let waiting = {
        let store = store.clone();
        tokio::spawn(async move { store.sync().await })
    };

    sleep_ms(50).await;
    store.close().await.unwrap();

    let result = waiting.await.unwrap();
    assert!(matches!(result, Err(StoreError::Closed { .. })));
}

#[tokio::test]
async fn test_leadership_can_move_between_siblings() {
    let cluster = Cluster::new();
    let flag_a = mirrorkv::SharedLeaderFlag::new();
    let flag_b = mirrorkv::SharedLeaderFlag::new();
    flag_a.set(true);

    let a = cluster.store_with(
        "handover",
        cluster.config().with_sync_timeout_ms(300),
        std::sync::Arc::new(flag_a.clone()),
    );
    let b = cluster.store_with(
        "handover",
        cluster.config().with_sync_timeout_ms(300),
        std::sync::Arc::new(flag_b.clone()),
    );

    a.set("owner", json!("a"), 0).unwrap();
    settle().await;

    // A answers while it leads.
    b.sync().await.unwrap();
    assert_eq!(b.get("owner").unwrap(), Some(json!("a")));

    // Move leadership to B; now B answers A's handshake.
    flag_a.set(false);
    flag_b.set(true);
    b.set("owner", json!("b"), 0).unwrap();
    settle().await;
    a.sync().await.unwrap();
    assert_eq!(a.get("owner").unwrap(), Some(json!("b")));

    a.close().await.unwrap();
    b.close().await.unwrap();
}
