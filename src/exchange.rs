//! Pubsub coordination: topic dispatch, the head-exchange handshake and
//! direct channel management.
//!
//! Errors on the inbound path are logged and swallowed; a remote message
//! must never crash the controller.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::controller::{ChannelOf, InboxOf, Shared};
use crate::prelude::*;

impl<P: Platform> Shared<P> {
    /// Subscribe to a store's topic and dispatch its events in the
    /// background. Call only after the store is registered.
    pub(crate) async fn subscribe_topic(self: &Arc<Self>, address: &Address) -> Result<(), Error> {
        let Some(pubsub) = &self.pubsub else {
            return Ok(());
        };

        let topic = address.to_string();

        let mut subscription = pubsub.subscribe(&topic).await?;

        let shared = Arc::downgrade(self);

        let handle = tokio::spawn(async move {
            while let Some(event) = subscription.next_event().await {
                let Some(shared) = shared.upgrade() else {
                    break;
                };

                match event {
                    PubSubEvent::Message { topic, heads } => {
                        shared.on_message(&topic, heads).await;
                    }
                    PubSubEvent::PeerJoined { topic, peer } => {
                        shared.on_peer_connected(&topic, peer).await;
                    }
                }
            }
        });

        // reopening an address replaces the registration, so drop any
        // dispatcher left over from the previous instance
        if let Some(old) = self.dispatchers.lock().unwrap().insert(topic, handle) {
            old.abort();
        }

        Ok(())
    }

    /// Merge remote heads into the matching live store. Unknown addresses
    /// and sync failures are logged, never raised.
    pub(crate) async fn on_message(&self, address: &str, heads: Vec<Entry>) {
        let store = { self.stores.lock().unwrap().get(address).cloned() };

        let Some(store) = store else {
            debug!(address, "heads for an address with no live store");
            return;
        };

        if heads.is_empty() {
            return;
        }

        if let Err(error) = store.sync(heads).await {
            warn!(%error, address, "failed to sync remote heads");
        }
    }

    /// Head-exchange handshake with a peer newly observed on a topic.
    pub(crate) async fn on_peer_connected(self: &Arc<Self>, topic: &str, peer: PeerId) {
        if let Err(error) = self.exchange_heads(topic, &peer).await {
            warn!(%error, topic, %peer, "head exchange failed");
        }
    }

    async fn exchange_heads(self: &Arc<Self>, topic: &str, peer: &PeerId) -> Result<(), Error> {
        let store = { self.stores.lock().unwrap().get(topic).cloned() };

        // the store is registered before its topic is subscribed, so a
        // miss here means it was closed in the meantime
        let Some(store) = store else {
            return Ok(());
        };

        let channel = self.get_or_open_channel(peer).await?;

        let heads = store.heads().await;

        channel
            .send(ChannelMessage {
                address: topic.to_string(),
                heads,
            })
            .await?;

        store.events().emit(StoreEvent::Peer {
            address: topic.to_string(),
            peer: peer.clone(),
        });

        Ok(())
    }

    /// One direct channel per peer: concurrent handshakes serialize on
    /// the channel map, so the second caller reuses the cached channel.
    async fn get_or_open_channel(self: &Arc<Self>, peer: &PeerId) -> Result<ChannelOf<P>, Error> {
        let Some(pubsub) = &self.pubsub else {
            return Err(PubSubError::internal("no pubsub client").into());
        };

        let mut channels = self.channels.lock().await;

        if let Some(channel) = channels.get(peer) {
            return Ok(channel.clone());
        }

        let (channel, inbox) = pubsub.open_channel(peer).await?;

        debug!(%peer, "direct channel opened");

        self.spawn_channel_inbox(peer.clone(), inbox);

        channels.insert(peer.clone(), channel.clone());

        Ok(channel)
    }

    /// Forward heads received over a direct channel into the matching
    /// store. Drops the cached channel once the peer goes away.
    fn spawn_channel_inbox(self: &Arc<Self>, peer: PeerId, mut inbox: InboxOf<P>) {
        let shared = Arc::downgrade(self);

        let handle = tokio::spawn(async move {
            while let Some(message) = inbox.next_message().await {
                let Some(shared) = shared.upgrade() else {
                    return;
                };

                shared.on_message(&message.address, message.heads).await;
            }

            if let Some(shared) = shared.upgrade() {
                shared.channels.lock().await.remove(&peer);
                debug!(%peer, "direct channel closed by peer");
            }
        });

        self.channel_tasks.lock().unwrap().push(handle);
    }
}
