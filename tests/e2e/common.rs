#![allow(dead_code)]

use std::path::Path;
use std::time::Duration;

use orbiter::{OpenOptions, OrbitDb, OrbitDbOptions};
use orbiter_core::SharedStore;
use orbiter_testing::{
    toy_registry, MemoryObjectStore, MemoryPubSub, ToyAccessFactory, ToyPlatform,
    ToyPlatformStore,
};

/// Controller over the toy platform. Pass an existing peer's object store
/// and pubsub to join its network; `None` starts a fresh one.
pub async fn peer_controller(
    peer_id: &str,
    dir: &Path,
    network: Option<(&MemoryObjectStore, &MemoryPubSub)>,
) -> (OrbitDb<ToyPlatform>, MemoryObjectStore, MemoryPubSub) {
    let (object_store, pubsub) = match network {
        Some((objects, pubsub)) => (objects.join(peer_id), pubsub.join(peer_id)),
        None => {
            let (_, pubsub) = MemoryPubSub::network(peer_id);
            (MemoryObjectStore::new(peer_id), pubsub)
        }
    };

    let options = OrbitDbOptions {
        directory: Some(dir.to_path_buf()),
        pubsub: Some(pubsub.clone()),
        ..OrbitDbOptions::new(toy_registry(), ToyAccessFactory)
    };

    let controller = OrbitDb::new(object_store.clone(), options).await.unwrap();

    (controller, object_store, pubsub)
}

pub fn as_toy(store: &SharedStore) -> &ToyPlatformStore {
    store
        .as_any()
        .downcast_ref::<ToyPlatformStore>()
        .expect("not a toy store")
}

pub fn local_options() -> OpenOptions {
    OpenOptions {
        replicate: Some(false),
        ..Default::default()
    }
}

/// Poll a condition until it holds or a five second deadline passes.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);

    while !condition() {
        if tokio::time::Instant::now() > deadline {
            panic!("condition not reached in time");
        }

        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
