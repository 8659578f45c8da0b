use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Entry, PeerId};

#[derive(Debug, Error)]
pub enum PubSubError {
    #[error("not subscribed to topic {0}")]
    NotSubscribed(String),

    #[error("channel to peer {0} is closed")]
    ChannelClosed(PeerId),

    #[error("internal error: {0}")]
    Internal(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl PubSubError {
    pub fn internal<T>(value: T) -> Self
    where
        T: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        PubSubError::Internal(value.into())
    }
}

/// Inbound event on a subscribed topic.
#[derive(Debug, Clone)]
pub enum PubSubEvent {
    /// Heads published by a remote replica.
    Message { topic: String, heads: Vec<Entry> },

    /// A peer newly observed on the topic.
    PeerJoined { topic: String, peer: PeerId },
}

/// Message exchanged over a direct channel during head exchange. Carries
/// the address so the receiving side can route to the matching store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelMessage {
    pub address: String,
    pub heads: Vec<Entry>,
}

/// Per-topic event stream handed out by [`PubSub::subscribe`]. Yields
/// `None` once the topic is unsubscribed or the overlay disconnects.
#[trait_variant::make(Send)]
pub trait TopicSubscription: Send + 'static {
    async fn next_event(&mut self) -> Option<PubSubEvent>;
}

/// Receiving half of a direct channel.
#[trait_variant::make(Send)]
pub trait ChannelInbox: Send + 'static {
    async fn next_message(&mut self) -> Option<ChannelMessage>;
}

/// Sending half of a direct bidirectional channel to one peer.
#[trait_variant::make(Send)]
pub trait DirectChannel: Clone + Send + Sync + 'static {
    fn peer(&self) -> &PeerId;

    async fn send(&self, message: ChannelMessage) -> Result<(), PubSubError>;

    async fn close(&self) -> Result<(), PubSubError>;
}

/// Client for the publish/subscribe overlay.
#[trait_variant::make(Send)]
pub trait PubSub: Clone + Send + Sync + 'static {
    type Subscription: TopicSubscription;
    type Channel: DirectChannel;
    type Inbox: ChannelInbox;

    async fn subscribe(&self, topic: &str) -> Result<Self::Subscription, PubSubError>;

    async fn unsubscribe(&self, topic: &str) -> Result<(), PubSubError>;

    async fn publish(&self, topic: &str, heads: &[Entry]) -> Result<(), PubSubError>;

    /// Open a direct bidirectional channel to a peer. The inbox is the
    /// exclusive receiving half; the channel half can be cloned and cached.
    async fn open_channel(
        &self,
        peer: &PeerId,
    ) -> Result<(Self::Channel, Self::Inbox), PubSubError>;

    async fn disconnect(&self) -> Result<(), PubSubError>;
}
