use peerlink_node::{
    ContainerUpdateEvent, ErrorEvent, Events, InterestEvent, MessageEvent, NewPeerEvent,
    NodeError, PeerLeftEvent,
};
use peerlink_shared::{Id, Serde, UpdateKind};

/// Every event a node produced, accumulated across updates
#[derive(Default)]
pub struct EventLog {
    pub new_peers: Vec<Id>,
    pub peer_lefts: Vec<Id>,
    pub messages: Vec<MessageEvent>,
    pub interests: Vec<InterestEvent>,
    pub container_updates: Vec<ContainerUpdateEvent>,
    pub errors: Vec<NodeError>,
}

impl EventLog {
    pub fn record(&mut self, mut events: Events) {
        self.new_peers.extend(events.read::<NewPeerEvent>());
        self.peer_lefts.extend(events.read::<PeerLeftEvent>());
        self.messages.extend(events.read::<MessageEvent>());
        self.interests.extend(events.read::<InterestEvent>());
        self.container_updates
            .extend(events.read::<ContainerUpdateEvent>());
        self.errors.extend(events.read::<ErrorEvent>());
    }

    pub fn new_peer_count(&self, node_id: &Id) -> usize {
        self.new_peers.iter().filter(|id| *id == node_id).count()
    }

    pub fn peer_left_count(&self, node_id: &Id) -> usize {
        self.peer_lefts.iter().filter(|id| *id == node_id).count()
    }

    /// Partial updates received for `container`, i.e. forwarded writes
    pub fn partial_updates(&self, container: &str) -> Vec<&ContainerUpdateEvent> {
        self.container_updates
            .iter()
            .filter(|update| update.container == container && update.kind == UpdateKind::Partial)
            .collect()
    }

    /// Decoded payloads of every message received on `topic`
    pub fn messages_on<M: Serde>(&self, topic: &str) -> Vec<M> {
        self.messages
            .iter()
            .filter(|message| message.topic() == topic)
            .filter_map(|message| message.read::<M>().ok())
            .collect()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
