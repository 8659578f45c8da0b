//! End-to-end coverage of the controller façade: addressing, creation,
//! opening, cache indexing, migrations and teardown.

mod common;

use common::*;

use orbiter::{Error, OpenOptions};
use orbiter_core::{CacheStore, Identity, RegistryError, StoreError};
use orbiter_testing::{register_toy_types, toy_registry};
use serde_json::json;

#[tokio::test]
async fn create_with_invalid_type_fails() {
    let dir = tempfile::tempdir().unwrap();
    let (db, _, _) = peer_controller("peer-local", dir.path(), None).await;

    let error = db
        .create("first", "invalid-type", local_options())
        .await
        .unwrap_err();

    assert!(matches!(error, Error::InvalidType(_)));
    assert_eq!(error.to_string(), "Invalid database type 'invalid-type'");
}

#[tokio::test]
async fn create_with_address_as_name_fails() {
    let dir = tempfile::tempdir().unwrap();
    let (db, _, _) = peer_controller("peer-local", dir.path(), None).await;

    let error = db
        .create(
            "/orbitdb/Qmc9PMho3LwTXSaUXJ8WjeBZyXesAwUofdkGeadFXsqMzW/first",
            "feed",
            local_options(),
        )
        .await
        .unwrap_err();

    assert!(matches!(error, Error::NameIsAddress(_)));
}

#[tokio::test]
async fn create_twice_fails_without_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let (db, _, _) = peer_controller("peer-local", dir.path(), None).await;

    db.create("first", "feed", local_options()).await.unwrap();

    let error = db
        .create("first", "feed", local_options())
        .await
        .unwrap_err();

    assert!(matches!(error, Error::AlreadyExists(_)));
}

#[tokio::test]
async fn opening_under_a_different_type_fails() {
    let dir = tempfile::tempdir().unwrap();
    let (db, _, _) = peer_controller("peer-local", dir.path(), None).await;

    let store = db.kvstore("keyvalue", local_options()).await.unwrap();
    let address = store.address().to_string();

    let error = db.eventlog(&address, local_options()).await.unwrap_err();

    match error {
        Error::TypeMismatch {
            actual, requested, ..
        } => {
            assert_eq!(actual, "keyvalue");
            assert_eq!(requested, "eventlog");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn create_persists_manifest_and_cache_entry() {
    let dir = tempfile::tempdir().unwrap();
    let (db, objects, _) = peer_controller("peer-local", dir.path(), None).await;

    let store = db.create("second", "feed", local_options()).await.unwrap();
    let address = store.address().clone();

    assert!(address.to_string().starts_with("/orbitdb/"));

    let cache = db.cache(None).await.unwrap();
    let entry = cache.get(&format!("{address}/_manifest")).await.unwrap();
    assert_eq!(entry.as_deref(), Some(address.root()));

    let manifest = objects.get(address.root()).unwrap();
    assert_eq!(manifest["name"], "second");
    assert_eq!(manifest["type"], "feed");

    let ac_path = manifest["accessController"].as_str().unwrap();
    assert!(ac_path.starts_with("/ipfs"));
}

#[tokio::test]
async fn recreate_preserves_data_and_root() {
    let dir = tempfile::tempdir().unwrap();

    let root_before = {
        let (db, _, _) = peer_controller("peer-local", dir.path(), None).await;

        let store = db
            .keyvalue("cache-schema-test", local_options())
            .await
            .unwrap();

        as_toy(&store).put("key", json!("value")).await.unwrap();

        let root = store.address().root().to_string();

        db.stop().await.unwrap();

        root
    };

    // a fresh controller over the same directory; recreating runs the
    // migration pass again, which finds nothing to do
    let (db, _, _) = peer_controller("peer-local", dir.path(), None).await;

    let store = db
        .keyvalue("cache-schema-test", local_options())
        .await
        .unwrap();

    store.load().await.unwrap();

    assert_eq!(as_toy(&store).get("key"), Some(json!("value")));
    assert_eq!(store.address().root(), root_before);
}

#[tokio::test]
async fn local_only_open_of_unknown_address_fails() {
    let dir = tempfile::tempdir().unwrap();
    let (db, _, _) = peer_controller("peer-local", dir.path(), None).await;

    let store = db.create("third", "feed", local_options()).await.unwrap();
    let address = store.address().to_string();

    let mut tampered = address.clone();
    let last = tampered.pop().unwrap();
    tampered.push(if last == 'X' { 'Y' } else { 'X' });

    let error = db
        .open(
            &tampered,
            OpenOptions {
                local_only: true,
                ..Default::default()
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(error, Error::NotFoundLocally(_)));
}

#[tokio::test]
async fn reopening_by_address_preserves_insertion_order() {
    let dir = tempfile::tempdir().unwrap();
    let (db, _, _) = peer_controller("peer-local", dir.path(), None).await;

    let store = db
        .open(
            "ZZZ",
            OpenOptions {
                create: true,
                db_type: Some("feed".to_string()),
                replicate: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    as_toy(&store).append(json!("hello1")).await.unwrap();
    as_toy(&store).append(json!("hello2")).await.unwrap();

    let address = store.address().to_string();

    let reopened = db.open(&address, local_options()).await.unwrap();
    reopened.load().await.unwrap();

    let payloads: Vec<_> = as_toy(&reopened)
        .iterator(-1)
        .into_iter()
        .map(|entry| entry.payload)
        .collect();

    assert_eq!(payloads, vec![json!("hello1"), json!("hello2")]);
}

#[tokio::test]
async fn open_without_create_rejects_names() {
    let dir = tempfile::tempdir().unwrap();
    let (db, _, _) = peer_controller("peer-local", dir.path(), None).await;

    let error = db.open("nope", OpenOptions::default()).await.unwrap_err();
    assert!(matches!(error, Error::CreateNotSet(_)));
}

#[tokio::test]
async fn open_with_create_requires_a_type() {
    let dir = tempfile::tempdir().unwrap();
    let (db, _, _) = peer_controller("peer-local", dir.path(), None).await;

    let error = db
        .open(
            "nope",
            OpenOptions {
                create: true,
                ..Default::default()
            },
        )
        .await
        .unwrap_err();

    match error {
        Error::TypeMissing(tags) => {
            assert!(tags.contains("feed"));
            assert!(tags.contains("keyvalue"));
            assert!(tags.contains("eventlog"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn determine_address_matches_create_without_side_effects() {
    let dir = tempfile::tempdir().unwrap();
    let (db, objects, _) = peer_controller("peer-local", dir.path(), None).await;

    let address = db
        .determine_address("det", "feed", &OpenOptions::default())
        .await
        .unwrap();

    // the manifest hash was computed without persisting, and nothing was
    // recorded locally
    assert!(!objects.contains(address.root()));

    let cache = db.cache(None).await.unwrap();
    let entry = cache.get(&format!("{address}/_manifest")).await.unwrap();
    assert!(entry.is_none());

    let store = db.create("det", "feed", local_options()).await.unwrap();
    assert_eq!(store.address(), &address);
}

#[tokio::test]
async fn live_store_map_tracks_open_and_close() {
    let dir = tempfile::tempdir().unwrap();
    let (db, _, _) = peer_controller("peer-local", dir.path(), None).await;

    let a = db.create("a", "feed", local_options()).await.unwrap();
    let b = db.create("b", "feed", local_options()).await.unwrap();

    assert_eq!(db.stores().len(), 2);

    a.close().await.unwrap();

    assert_eq!(db.stores(), vec![b.address().to_string()]);

    // closing again is a no-op
    a.close().await.unwrap();
    assert_eq!(db.stores().len(), 1);
}

#[tokio::test]
async fn manifest_defaults_merge_under_caller_options() {
    let dir = tempfile::tempdir().unwrap();
    let (db, _, _) = peer_controller("peer-local", dir.path(), None).await;

    let mut defaults = serde_json::Map::new();
    defaults.insert("ref".to_string(), json!(42));

    let store = db
        .create(
            "with-defaults",
            "feed",
            OpenOptions {
                defaults: Some(defaults),
                replicate: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let address = store.address().to_string();

    let plain = db.open(&address, local_options()).await.unwrap();
    assert!(as_toy(&plain).options().defaults.is_empty());

    let merged = db
        .open(
            &address,
            OpenOptions {
                merge_defaults: true,
                replicate: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(as_toy(&merged).options().defaults["ref"], json!(42));

    let mut overriding = serde_json::Map::new();
    overriding.insert("ref".to_string(), json!(7));

    let overridden = db
        .open(
            &address,
            OpenOptions {
                merge_defaults: true,
                defaults: Some(overriding),
                replicate: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(as_toy(&overridden).options().defaults["ref"], json!(7));
}

#[tokio::test]
async fn identities_outside_the_write_list_cannot_append() {
    let dir = tempfile::tempdir().unwrap();
    let (db, _, _) = peer_controller("peer-local", dir.path(), None).await;

    let store = db.create("locked", "feed", local_options()).await.unwrap();
    let address = store.address().to_string();

    let stranger = Identity {
        id: "stranger".to_string(),
        pub_key: "stranger-pub".to_string(),
    };

    let opened = db
        .open(
            &address,
            OpenOptions {
                identity: Some(stranger),
                replicate: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let error = as_toy(&opened).append(json!("nope")).await.unwrap_err();
    assert!(matches!(error, StoreError::WriteNotAllowed(_)));
}

#[tokio::test]
async fn stop_tears_everything_down() {
    let dir = tempfile::tempdir().unwrap();
    let (db, _, _) = peer_controller("peer-local", dir.path(), None).await;

    db.create("one", "feed", local_options()).await.unwrap();
    db.create("two", "keyvalue", local_options()).await.unwrap();

    db.stop().await.unwrap();

    assert!(db.stores().is_empty());

    // safe to invoke when nothing is open
    db.stop().await.unwrap();
}

#[tokio::test]
async fn registry_rejects_duplicate_tags_and_keeps_order() {
    let mut registry = toy_registry();

    assert_eq!(
        registry.tags(),
        vec!["counter", "eventlog", "feed", "docstore", "keyvalue"]
    );

    let error = register_toy_types(&mut registry).unwrap_err();
    assert!(matches!(error, RegistryError::AlreadyRegistered(_)));
}
