use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tokio::sync::Notify;
use xxhash_rust::xxh3::xxh3_128;

use orbiter_core::{Object, ObjectHash, ObjectStore, ObjectStoreError, PeerId, WriteOptions};

/// Content-addressed store fake. Reads of unknown hashes wait for the
/// object to be written, matching the blocking semantics of a real
/// network-backed store.
#[derive(Clone)]
pub struct MemoryObjectStore {
    peer_id: PeerId,
    objects: Arc<RwLock<HashMap<ObjectHash, Object>>>,
    arrivals: Arc<Notify>,
}

impl MemoryObjectStore {
    pub fn new(peer_id: impl Into<PeerId>) -> Self {
        Self {
            peer_id: peer_id.into(),
            objects: Default::default(),
            arrivals: Arc::new(Notify::new()),
        }
    }

    /// A second client for another peer backed by the same content, the
    /// way two nodes see one network.
    pub fn join(&self, peer_id: impl Into<PeerId>) -> Self {
        Self {
            peer_id: peer_id.into(),
            objects: self.objects.clone(),
            arrivals: self.arrivals.clone(),
        }
    }

    /// Synchronous lookup for assertions.
    pub fn get(&self, hash: &str) -> Option<Object> {
        self.objects.read().unwrap().get(hash).cloned()
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.objects.read().unwrap().contains_key(hash)
    }

    fn hash_of(value: &Object) -> Result<ObjectHash, ObjectStoreError> {
        // serde_json maps are sorted, so the rendering is canonical
        let bytes =
            serde_json::to_vec(value).map_err(|error| ObjectStoreError::Codec(error.to_string()))?;

        Ok(format!("zdpu{:032x}", xxh3_128(&bytes)))
    }
}

impl ObjectStore for MemoryObjectStore {
    async fn read(&self, hash: &str) -> Result<Object, ObjectStoreError> {
        loop {
            let waiter = self.arrivals.notified();

            if let Some(object) = self.objects.read().unwrap().get(hash) {
                return Ok(object.clone());
            }

            waiter.await;
        }
    }

    async fn write(
        &self,
        _codec: &str,
        value: &Object,
        options: &WriteOptions,
    ) -> Result<ObjectHash, ObjectStoreError> {
        let hash = Self::hash_of(value)?;

        if !options.only_hash {
            self.objects
                .write()
                .unwrap()
                .insert(hash.clone(), value.clone());

            self.arrivals.notify_waiters();
        }

        Ok(hash)
    }

    async fn id(&self) -> Result<PeerId, ObjectStoreError> {
        Ok(self.peer_id.clone())
    }
}
