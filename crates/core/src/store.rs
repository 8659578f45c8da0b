use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::debug;

use crate::{
    Address, CacheError, CacheOf, Entry, Identity, ObjectStoreError, PeerId, Platform,
    SharedAccessController,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("identity '{0}' is not allowed to write")]
    WriteNotAllowed(String),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    ObjectStore(#[from] ObjectStoreError),

    #[error("internal error: {0}")]
    Internal(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    pub fn internal<T>(value: T) -> Self
    where
        T: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        StoreError::Internal(value.into())
    }
}

/// Event emitted on a store's bus. `Write` fires on every local append,
/// `Peer` after the first successful head exchange with a peer, `Closed`
/// once when the store shuts down.
#[derive(Debug, Clone)]
pub enum StoreEvent {
    Write { address: String, heads: Vec<Entry> },
    Peer { address: String, peer: PeerId },
    Closed { address: String },
}

/// Broadcast-backed event bus shared between a store and its observers.
/// Emission never blocks and never fails; events without subscribers are
/// dropped.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<StoreEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(64);
        Self { sender }
    }

    pub fn emit(&self, event: StoreEvent) {
        if self.sender.send(event).is_err() {
            debug!("no store event subscribers");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Callback injected into each store so closing it removes the live
/// registration and tears down the pubsub binding. Stores hold this by
/// value; there is no back-reference to the controller.
#[async_trait]
pub trait CloseSink: Send + Sync {
    async fn store_closed(&self, address: &Address);
}

/// Capability set every store implementation exposes to the controller.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    fn address(&self) -> &Address;

    fn store_type(&self) -> &str;

    fn events(&self) -> &EventBus;

    /// Rehydrate in-memory state from the local cache.
    async fn load(&self) -> Result<(), StoreError>;

    /// Current tips of the internal log.
    async fn heads(&self) -> Vec<Entry>;

    /// Merge remote heads into the internal log.
    async fn sync(&self, heads: Vec<Entry>) -> Result<(), StoreError>;

    async fn close(&self) -> Result<(), StoreError>;

    /// Escape hatch for typed store APIs (append, get, iterators) that are
    /// outside the controller's capability set.
    fn as_any(&self) -> &(dyn Any + Send + Sync);
}

pub type SharedStore = Arc<dyn Store>;

impl std::fmt::Debug for dyn Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("address", self.address())
            .field("store_type", &self.store_type())
            .finish()
    }
}

/// Option bag passed through to store constructors.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub replicate: bool,

    /// Store-type-specific options, either caller-supplied or merged from
    /// the manifest's frozen defaults.
    pub defaults: serde_json::Map<String, serde_json::Value>,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            replicate: true,
            defaults: Default::default(),
        }
    }
}

/// Everything a store constructor receives from the controller.
pub struct StoreContext<P: Platform> {
    pub object_store: P::ObjectStore,
    pub identity: Identity,
    pub address: Address,
    pub keystore: P::Keystore,
    pub cache: CacheOf<P>,
    pub access: SharedAccessController,
    pub on_close: Option<Arc<dyn CloseSink>>,
    pub options: StoreOptions,
}
