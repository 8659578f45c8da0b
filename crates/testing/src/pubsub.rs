use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use orbiter_core::{
    ChannelInbox, ChannelMessage, DirectChannel, Entry, PeerId, PubSub, PubSubError, PubSubEvent,
    TopicSubscription,
};

type EventSender = mpsc::UnboundedSender<PubSubEvent>;

/// One half of a paired direct channel, parked until the other peer
/// opens its side.
struct PendingEnd {
    channel: MemoryChannel,
    inbox: MemoryInbox,
}

#[derive(Default)]
struct HubState {
    topics: HashMap<String, HashMap<PeerId, EventSender>>,
    pending_channels: HashMap<(PeerId, PeerId), PendingEnd>,
}

/// Process-local overlay shared by every peer of a test network.
#[derive(Default)]
pub struct Hub {
    state: Mutex<HubState>,
}

/// Pubsub client fake for one peer, wired to a shared [`Hub`].
#[derive(Clone)]
pub struct MemoryPubSub {
    peer_id: PeerId,
    hub: Arc<Hub>,
}

impl MemoryPubSub {
    pub fn new(peer_id: impl Into<PeerId>, hub: Arc<Hub>) -> Self {
        Self {
            peer_id: peer_id.into(),
            hub,
        }
    }

    /// A hub plus the first peer on it.
    pub fn network(peer_id: impl Into<PeerId>) -> (Arc<Hub>, Self) {
        let hub = Arc::new(Hub::default());
        let pubsub = Self::new(peer_id, hub.clone());

        (hub, pubsub)
    }

    /// Another peer on the same hub.
    pub fn join(&self, peer_id: impl Into<PeerId>) -> Self {
        Self::new(peer_id, self.hub.clone())
    }

    fn pair_key(a: &PeerId, b: &PeerId) -> (PeerId, PeerId) {
        if a <= b {
            (a.clone(), b.clone())
        } else {
            (b.clone(), a.clone())
        }
    }
}

pub struct MemorySubscription {
    events: mpsc::UnboundedReceiver<PubSubEvent>,
}

impl TopicSubscription for MemorySubscription {
    async fn next_event(&mut self) -> Option<PubSubEvent> {
        self.events.recv().await
    }
}

#[derive(Clone)]
pub struct MemoryChannel {
    peer: PeerId,
    outbound: mpsc::UnboundedSender<ChannelMessage>,
    closed: Arc<AtomicBool>,
}

impl DirectChannel for MemoryChannel {
    fn peer(&self) -> &PeerId {
        &self.peer
    }

    async fn send(&self, message: ChannelMessage) -> Result<(), PubSubError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(PubSubError::ChannelClosed(self.peer.clone()));
        }

        self.outbound
            .send(message)
            .map_err(|_| PubSubError::ChannelClosed(self.peer.clone()))
    }

    async fn close(&self) -> Result<(), PubSubError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

pub struct MemoryInbox {
    messages: mpsc::UnboundedReceiver<ChannelMessage>,
}

impl ChannelInbox for MemoryInbox {
    async fn next_message(&mut self) -> Option<ChannelMessage> {
        self.messages.recv().await
    }
}

impl PubSub for MemoryPubSub {
    type Subscription = MemorySubscription;
    type Channel = MemoryChannel;
    type Inbox = MemoryInbox;

    async fn subscribe(&self, topic: &str) -> Result<Self::Subscription, PubSubError> {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut state = self.hub.state.lock().unwrap();

        let subscribers = state.topics.entry(topic.to_string()).or_default();

        // both sides of every existing pairing observe the new peer
        for (peer, sender) in subscribers.iter() {
            let _ = sender.send(PubSubEvent::PeerJoined {
                topic: topic.to_string(),
                peer: self.peer_id.clone(),
            });

            let _ = tx.send(PubSubEvent::PeerJoined {
                topic: topic.to_string(),
                peer: peer.clone(),
            });
        }

        subscribers.insert(self.peer_id.clone(), tx);

        Ok(MemorySubscription { events: rx })
    }

    async fn unsubscribe(&self, topic: &str) -> Result<(), PubSubError> {
        let mut state = self.hub.state.lock().unwrap();

        if let Some(subscribers) = state.topics.get_mut(topic) {
            subscribers.remove(&self.peer_id);
        }

        Ok(())
    }

    async fn publish(&self, topic: &str, heads: &[Entry]) -> Result<(), PubSubError> {
        let state = self.hub.state.lock().unwrap();

        let Some(subscribers) = state.topics.get(topic) else {
            return Ok(());
        };

        for (peer, sender) in subscribers.iter() {
            if *peer == self.peer_id {
                continue;
            }

            let _ = sender.send(PubSubEvent::Message {
                topic: topic.to_string(),
                heads: heads.to_vec(),
            });
        }

        Ok(())
    }

    async fn open_channel(
        &self,
        peer: &PeerId,
    ) -> Result<(Self::Channel, Self::Inbox), PubSubError> {
        let key = Self::pair_key(&self.peer_id, peer);

        let mut state = self.hub.state.lock().unwrap();

        if let Some(end) = state.pending_channels.remove(&key) {
            return Ok((end.channel, end.inbox));
        }

        // first opener: build both duplex ends and park the peer's
        let (to_peer_tx, to_peer_rx) = mpsc::unbounded_channel();
        let (to_me_tx, to_me_rx) = mpsc::unbounded_channel();

        let mine = (
            MemoryChannel {
                peer: peer.clone(),
                outbound: to_peer_tx,
                closed: Arc::new(AtomicBool::new(false)),
            },
            MemoryInbox {
                messages: to_me_rx,
            },
        );

        let theirs = PendingEnd {
            channel: MemoryChannel {
                peer: self.peer_id.clone(),
                outbound: to_me_tx,
                closed: Arc::new(AtomicBool::new(false)),
            },
            inbox: MemoryInbox {
                messages: to_peer_rx,
            },
        };

        state.pending_channels.insert(key, theirs);

        Ok(mine)
    }

    async fn disconnect(&self) -> Result<(), PubSubError> {
        let mut state = self.hub.state.lock().unwrap();

        for subscribers in state.topics.values_mut() {
            subscribers.remove(&self.peer_id);
        }

        Ok(())
    }
}
