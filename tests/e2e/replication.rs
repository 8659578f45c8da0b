//! End-to-end coverage of the pubsub binding: head broadcast, the
//! peer handshake, ancestor fetching and shared-write replication.

mod common;

use common::*;

use orbiter::OpenOptions;
use orbiter_core::{AccessSpec, StoreEvent};
use serde_json::json;

#[tokio::test]
async fn appends_replicate_to_a_connected_peer() {
    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();

    let (db_a, objects, pubsub) = peer_controller("peer-a", dir_a.path(), None).await;
    let (db_b, _, _) = peer_controller("peer-b", dir_b.path(), Some((&objects, &pubsub))).await;

    let store_a = db_a
        .create("shared", "feed", OpenOptions::default())
        .await
        .unwrap();
    let address = store_a.address().to_string();

    let store_b = db_b.open(&address, OpenOptions::default()).await.unwrap();

    as_toy(&store_a).append(json!("hello")).await.unwrap();

    let probe = store_b.clone();
    wait_until(move || as_toy(&probe).entries().len() == 1).await;

    assert_eq!(as_toy(&store_b).entries()[0].payload, json!("hello"));

    db_a.stop().await.unwrap();
    db_b.stop().await.unwrap();
}

#[tokio::test]
async fn handshake_delivers_existing_entries_with_ancestors() {
    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();

    let (db_a, objects, pubsub) = peer_controller("peer-a", dir_a.path(), None).await;
    let (db_b, _, _) = peer_controller("peer-b", dir_b.path(), Some((&objects, &pubsub))).await;

    let store_a = db_a
        .create("history", "feed", OpenOptions::default())
        .await
        .unwrap();

    // two entries before the peer ever joins; the handshake sends only
    // the tip and the replica pulls the ancestor from the object store
    as_toy(&store_a).append(json!("one")).await.unwrap();
    as_toy(&store_a).append(json!("two")).await.unwrap();

    let address = store_a.address().to_string();

    let store_b = db_b.open(&address, OpenOptions::default()).await.unwrap();

    let probe = store_b.clone();
    wait_until(move || as_toy(&probe).entries().len() == 2).await;

    let payloads: Vec<_> = as_toy(&store_b)
        .iterator(-1)
        .into_iter()
        .map(|entry| entry.payload)
        .collect();

    assert_eq!(payloads, vec![json!("one"), json!("two")]);

    db_a.stop().await.unwrap();
    db_b.stop().await.unwrap();
}

#[tokio::test]
async fn peer_event_fires_after_first_exchange() {
    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();

    let (db_a, objects, pubsub) = peer_controller("peer-a", dir_a.path(), None).await;
    let (db_b, _, _) = peer_controller("peer-b", dir_b.path(), Some((&objects, &pubsub))).await;

    let store_a = db_a
        .create("observable", "feed", OpenOptions::default())
        .await
        .unwrap();

    let mut events = store_a.events().subscribe();

    let address = store_a.address().to_string();
    let _store_b = db_b.open(&address, OpenOptions::default()).await.unwrap();

    let peer = tokio::time::timeout(std::time::Duration::from_secs(5), async {
        loop {
            match events.recv().await {
                Ok(StoreEvent::Peer { peer, .. }) => break peer,
                Ok(_) => continue,
                Err(error) => panic!("event bus ended early: {error}"),
            }
        }
    })
    .await
    .unwrap();

    assert_eq!(peer, "peer-b");

    db_a.stop().await.unwrap();
    db_b.stop().await.unwrap();
}

#[tokio::test]
async fn open_write_lists_replicate_both_ways() {
    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();

    let (db_a, objects, pubsub) = peer_controller("peer-a", dir_a.path(), None).await;
    let (db_b, _, _) = peer_controller("peer-b", dir_b.path(), Some((&objects, &pubsub))).await;

    let store_a = db_a
        .create(
            "shared-kv",
            "keyvalue",
            OpenOptions {
                access_controller: Some(AccessSpec {
                    write: Some(vec!["*".to_string()]),
                    ..Default::default()
                }),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let address = store_a.address().to_string();
    let store_b = db_b.open(&address, OpenOptions::default()).await.unwrap();

    as_toy(&store_a).put("from-a", json!(1)).await.unwrap();
    as_toy(&store_b).put("from-b", json!(2)).await.unwrap();

    let probe_a = store_a.clone();
    wait_until(move || as_toy(&probe_a).get("from-b").is_some()).await;

    let probe_b = store_b.clone();
    wait_until(move || as_toy(&probe_b).get("from-a").is_some()).await;

    assert_eq!(as_toy(&store_a).get("from-b"), Some(json!(2)));
    assert_eq!(as_toy(&store_b).get("from-a"), Some(json!(1)));

    db_a.stop().await.unwrap();
    db_b.stop().await.unwrap();
}

#[tokio::test]
async fn closing_a_store_stops_dispatch_to_it() {
    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();

    let (db_a, objects, pubsub) = peer_controller("peer-a", dir_a.path(), None).await;
    let (db_b, _, _) = peer_controller("peer-b", dir_b.path(), Some((&objects, &pubsub))).await;

    let store_a = db_a
        .create("short-lived", "feed", OpenOptions::default())
        .await
        .unwrap();
    let address = store_a.address().to_string();

    let store_b = db_b.open(&address, OpenOptions::default()).await.unwrap();

    store_b.close().await.unwrap();
    assert!(db_b.store(&address).is_none());

    // a write on the other side must not resurrect or crash anything
    as_toy(&store_a).append(json!("after-close")).await.unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    assert!(db_b.store(&address).is_none());

    db_a.stop().await.unwrap();
    db_b.stop().await.unwrap();
}
