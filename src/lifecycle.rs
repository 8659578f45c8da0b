//! Store instantiation, registration and teardown.

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::controller::Shared;
use crate::prelude::*;

/// Parameters the façade resolves before a store is constructed.
pub(crate) struct CreateStoreParams<P: Platform> {
    pub db_type: String,
    pub address: Address,
    pub cache: CacheOf<P>,
    pub identity: Option<Identity>,
    pub replicate: bool,
    pub access_controller_address: Option<String>,
    pub access_spec: AccessSpec,
    pub defaults: serde_json::Map<String, serde_json::Value>,
}

/// Fallback policy when no access-controller address is given: the store
/// identity is the single writer.
struct SelfWriteController {
    write: Vec<String>,
}

impl AccessController for SelfWriteController {
    fn write(&self) -> &[String] {
        &self.write
    }
}

/// Close callback injected into every store. Holds the controller state
/// weakly; a store outliving its controller closes without effect.
pub(crate) struct CloseHook<P: Platform> {
    shared: Weak<Shared<P>>,
}

#[async_trait]
impl<P: Platform> CloseSink for CloseHook<P> {
    async fn store_closed(&self, address: &Address) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };

        shared.release_store(address).await;
    }
}

impl<P: Platform> Shared<P> {
    /// Instantiate a store for a type tag, wire its events, register it
    /// and bind it to pubsub. The registration replaces any prior store
    /// under the same address.
    pub(crate) async fn create_store(
        self: &Arc<Self>,
        params: CreateStoreParams<P>,
    ) -> Result<SharedStore, Error> {
        let ctor = self
            .registry
            .resolve(&params.db_type)
            .cloned()
            .ok_or_else(|| Error::InvalidType(params.db_type.clone()))?;

        let access: SharedAccessController = match &params.access_controller_address {
            Some(path) => {
                let env = self.access_env();
                self.access
                    .resolve(&env, path, &params.access_spec)
                    .await?
            }
            None => Arc::new(SelfWriteController {
                write: vec![self.identity.id.clone()],
            }),
        };

        let identity = params.identity.unwrap_or_else(|| self.identity.clone());

        let on_close: Arc<dyn CloseSink> = Arc::new(CloseHook {
            shared: Arc::downgrade(self),
        });

        let context = StoreContext::<P> {
            object_store: self.object_store.clone(),
            identity,
            address: params.address.clone(),
            keystore: self.keystore.clone(),
            cache: params.cache,
            access,
            on_close: Some(on_close),
            options: StoreOptions {
                replicate: params.replicate,
                defaults: params.defaults,
            },
        };

        let store = ctor(context)?;

        self.spawn_write_forwarder(&store, params.replicate);

        let topic = params.address.to_string();

        self.stores.lock().unwrap().insert(topic.clone(), store.clone());

        // subscription comes strictly after registration so any dispatched
        // message finds the store
        if params.replicate && self.pubsub.is_some() {
            self.subscribe_topic(&params.address).await?;
        }

        debug!(address = %topic, db_type = %params.db_type, "store registered");

        Ok(store)
    }

    /// Publish the heads of a local write on the store's topic.
    pub(crate) async fn on_write(&self, address: &str, heads: &[Entry]) -> Result<(), Error> {
        if heads.is_empty() {
            return Err(Error::InvariantViolation(format!(
                "write event on '{address}' carried no heads"
            )));
        }

        if let Some(pubsub) = &self.pubsub {
            pubsub.publish(address, heads).await?;
        }

        Ok(())
    }

    /// Remove a store from the live map and tear down its pubsub binding.
    /// Idempotent; never raises for unknown addresses.
    pub(crate) async fn release_store(&self, address: &Address) {
        let key = address.to_string();

        let removed = self.stores.lock().unwrap().remove(&key);

        // the forwarder exits on its own once it sees the Closed event
        let _ = self.forwarders.lock().unwrap().remove(&key);

        if let Some(handle) = self.dispatchers.lock().unwrap().remove(&key) {
            handle.abort();
        }

        if let Some(pubsub) = &self.pubsub {
            if let Err(error) = pubsub.unsubscribe(&key).await {
                debug!(%error, topic = %key, "unsubscribe after close");
            }
        }

        if removed.is_some() {
            debug!(address = %key, "store released");
        }
    }

    /// Forward the store's write events to pubsub, preserving emission
    /// order. The task ends when the store closes.
    fn spawn_write_forwarder(self: &Arc<Self>, store: &SharedStore, replicate: bool) {
        let mut events = store.events().subscribe();
        let shared = Arc::downgrade(self);
        let key = store.address().to_string();

        let handle = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(StoreEvent::Write { address, heads }) => {
                        let Some(shared) = shared.upgrade() else {
                            break;
                        };

                        if !replicate {
                            continue;
                        }

                        if let Err(error) = shared.on_write(&address, &heads).await {
                            warn!(%error, %address, "failed to publish write");
                        }
                    }
                    Ok(StoreEvent::Closed { .. }) => break,
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "store event bus lagged");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        self.forwarders.lock().unwrap().insert(key, handle);
    }
}
