use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use orbiter_core::{
    tags, Address, CacheOf, CacheStore, CloseSink, Entry, EventBus, Identity, ObjectStore,
    Platform, RegistryError, SharedAccessController, SharedStore, Store, StoreContext,
    StoreError, StoreEvent, StoreOptions, TypeRegistry, WriteOptions, DAG_CBOR,
};

use crate::ToyPlatform;

/// Entry as persisted in the object store: everything but the hash, which
/// is the content address itself.
#[derive(Deserialize)]
struct EntryBody {
    payload: serde_json::Value,
    clock: u64,
    identity: String,
    #[serde(default)]
    next: Vec<String>,
}

#[derive(Default)]
struct LogState {
    entries: Vec<Entry>,
    known: HashSet<String>,
    clock: u64,
}

impl LogState {
    fn insert(&mut self, entry: Entry) -> bool {
        if !self.known.insert(entry.hash.clone()) {
            return false;
        }

        self.clock = self.clock.max(entry.clock);
        self.entries.push(entry);

        true
    }

    fn sorted(&self) -> Vec<Entry> {
        let mut entries = self.entries.clone();
        entries.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        entries
    }

    fn heads(&self) -> Vec<Entry> {
        let referenced: HashSet<&str> = self
            .entries
            .iter()
            .flat_map(|entry| entry.next.iter().map(String::as_str))
            .collect();

        self.sorted()
            .into_iter()
            .filter(|entry| !referenced.contains(entry.hash.as_str()))
            .collect()
    }
}

/// Log-backed store covering every built-in type. Entries are persisted
/// to the object store on append, so replicas can fetch missing
/// ancestors during sync; the materialized log is mirrored write-through
/// into the local cache for restarts.
pub struct ToyStore<C: CacheStore, O: ObjectStore> {
    address: Address,
    db_type: String,
    identity: Identity,
    access: SharedAccessController,
    cache: C,
    object_store: O,
    events: EventBus,
    on_close: Option<Arc<dyn CloseSink>>,
    options: StoreOptions,
    state: RwLock<LogState>,
    closed: AtomicBool,
}

/// Construct a toy store from the context the controller resolved.
pub fn build_toy_store<P: Platform>(
    db_type: impl Into<String>,
    context: StoreContext<P>,
) -> Result<ToyStore<CacheOf<P>, P::ObjectStore>, StoreError> {
    Ok(ToyStore {
        address: context.address,
        db_type: db_type.into(),
        identity: context.identity,
        access: context.access,
        cache: context.cache,
        object_store: context.object_store,
        events: EventBus::new(),
        on_close: context.on_close,
        options: context.options,
        state: Default::default(),
        closed: AtomicBool::new(false),
    })
}

impl<C: CacheStore, O: ObjectStore> ToyStore<C, O> {
    fn oplog_key(&self) -> String {
        format!("{}/_oplog", self.address)
    }

    /// Effective options the store was constructed with.
    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    async fn persist(&self) -> Result<(), StoreError> {
        let snapshot = { self.state.read().unwrap().sorted() };

        let raw = serde_json::to_string(&snapshot).map_err(StoreError::internal)?;

        self.cache.set(&self.oplog_key(), &raw).await?;

        Ok(())
    }

    /// Append a payload to the log: persist the entry in the object
    /// store, extend the local log and broadcast the new head.
    pub async fn append(&self, payload: serde_json::Value) -> Result<Entry, StoreError> {
        if !self.access.can_append(&self.identity.id) {
            return Err(StoreError::WriteNotAllowed(self.identity.id.clone()));
        }

        let (clock, next) = {
            let state = self.state.read().unwrap();

            let next = state
                .heads()
                .into_iter()
                .map(|entry| entry.hash)
                .collect::<Vec<_>>();

            (state.clock + 1, next)
        };

        let body = serde_json::json!({
            "payload": payload,
            "clock": clock,
            "identity": self.identity.id,
            "next": next,
        });

        let hash = self
            .object_store
            .write(DAG_CBOR, &body, &WriteOptions::default())
            .await?;

        let entry = Entry {
            hash,
            payload,
            clock,
            identity: self.identity.id.clone(),
            next,
        };

        self.state.write().unwrap().insert(entry.clone());

        self.persist().await?;

        self.events.emit(StoreEvent::Write {
            address: self.address.to_string(),
            heads: vec![entry.clone()],
        });

        Ok(entry)
    }

    /// Log entries in materialized order.
    pub fn entries(&self) -> Vec<Entry> {
        self.state.read().unwrap().sorted()
    }

    /// Feed/eventlog iterator: all entries when `limit` is negative, the
    /// latest `limit` otherwise.
    pub fn iterator(&self, limit: i64) -> Vec<Entry> {
        let entries = self.entries();

        if limit < 0 {
            return entries;
        }

        let skip = entries.len().saturating_sub(limit as usize);
        entries.into_iter().skip(skip).collect()
    }

    pub async fn put(
        &self,
        key: &str,
        value: serde_json::Value,
    ) -> Result<Entry, StoreError> {
        self.append(serde_json::json!({"op": "PUT", "key": key, "value": value}))
            .await
    }

    pub async fn del(&self, key: &str) -> Result<Entry, StoreError> {
        self.append(serde_json::json!({"op": "DEL", "key": key}))
            .await
    }

    /// Key-value/docstore view of the log.
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        let mut current = None;

        for entry in self.entries() {
            let op = entry.payload.get("op").and_then(|op| op.as_str());
            let entry_key = entry.payload.get("key").and_then(|k| k.as_str());

            if entry_key != Some(key) {
                continue;
            }

            match op {
                Some("PUT") => current = entry.payload.get("value").cloned(),
                Some("DEL") => current = None,
                _ => continue,
            }
        }

        current
    }

    pub async fn inc(&self, amount: u64) -> Result<Entry, StoreError> {
        self.append(serde_json::json!({"op": "COUNTER", "value": amount}))
            .await
    }

    /// Counter view of the log.
    pub fn value(&self) -> u64 {
        self.entries()
            .iter()
            .filter(|entry| entry.payload.get("op").and_then(|op| op.as_str()) == Some("COUNTER"))
            .filter_map(|entry| entry.payload.get("value").and_then(|v| v.as_u64()))
            .sum()
    }

    async fn fetch_ancestor(&self, hash: &str) -> Result<Entry, StoreError> {
        let body = self.object_store.read(hash).await?;

        let parsed: EntryBody = serde_json::from_value(body).map_err(StoreError::internal)?;

        Ok(Entry {
            hash: hash.to_string(),
            payload: parsed.payload,
            clock: parsed.clock,
            identity: parsed.identity,
            next: parsed.next,
        })
    }
}

#[async_trait]
impl<C: CacheStore, O: ObjectStore> Store for ToyStore<C, O> {
    fn address(&self) -> &Address {
        &self.address
    }

    fn store_type(&self) -> &str {
        &self.db_type
    }

    fn events(&self) -> &EventBus {
        &self.events
    }

    async fn load(&self) -> Result<(), StoreError> {
        let Some(raw) = self.cache.get(&self.oplog_key()).await? else {
            return Ok(());
        };

        let entries: Vec<Entry> = serde_json::from_str(&raw).map_err(StoreError::internal)?;

        let mut state = self.state.write().unwrap();

        for entry in entries {
            state.insert(entry);
        }

        Ok(())
    }

    async fn heads(&self) -> Vec<Entry> {
        self.state.read().unwrap().heads()
    }

    async fn sync(&self, heads: Vec<Entry>) -> Result<(), StoreError> {
        let mut queue = heads;
        let mut merged = false;

        while let Some(entry) = queue.pop() {
            if self.state.read().unwrap().known.contains(&entry.hash) {
                continue;
            }

            if !self.access.can_append(&entry.identity) {
                warn!(
                    identity = %entry.identity,
                    address = %self.address,
                    "dropping head from unauthorized identity"
                );
                continue;
            }

            for parent in &entry.next {
                let missing = !self.state.read().unwrap().known.contains(parent)
                    && !queue.iter().any(|queued| queued.hash == *parent);

                if missing {
                    queue.push(self.fetch_ancestor(parent).await?);
                }
            }

            merged |= self.state.write().unwrap().insert(entry);
        }

        if merged {
            self.persist().await?;
        }

        Ok(())
    }

    async fn close(&self) -> Result<(), StoreError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        self.events.emit(StoreEvent::Closed {
            address: self.address.to_string(),
        });

        if let Some(sink) = &self.on_close {
            sink.store_closed(&self.address).await;
        }

        Ok(())
    }

    fn as_any(&self) -> &(dyn std::any::Any + Send + Sync) {
        self
    }
}

/// Register a toy constructor for every built-in type tag.
pub fn register_toy_types<P: Platform>(
    registry: &mut TypeRegistry<P>,
) -> Result<(), RegistryError> {
    let builtin = [
        tags::COUNTER,
        tags::EVENTLOG,
        tags::FEED,
        tags::DOCSTORE,
        tags::KEYVALUE,
    ];

    for tag in builtin {
        let db_type = tag.to_string();

        registry.register(
            tag,
            Arc::new(move |context: StoreContext<P>| {
                let store = build_toy_store(db_type.clone(), context)?;
                Ok(Arc::new(store) as SharedStore)
            }),
        )?;
    }

    Ok(())
}

/// Registry preloaded with the built-in toy types.
pub fn toy_registry() -> TypeRegistry<ToyPlatform> {
    let mut registry = TypeRegistry::new();
    register_toy_types(&mut registry).unwrap();
    registry
}
