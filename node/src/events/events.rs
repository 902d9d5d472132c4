use std::vec::IntoIter;

use peerlink_shared::{BitReader, Id, Serde, SerdeErr, UpdateKind};

use crate::NodeError;

/// Everything that happened during one [`Node::update`](crate::Node::update)
pub struct Events {
    new_peers: Vec<Id>,
    peer_lefts: Vec<Id>,
    messages: Vec<MessageEvent>,
    interests: Vec<InterestEvent>,
    container_updates: Vec<ContainerUpdateEvent>,
    errors: Vec<NodeError>,

    empty: bool,
}

impl Events {
    pub(crate) fn new() -> Self {
        Self {
            new_peers: Vec::new(),
            peer_lefts: Vec::new(),
            messages: Vec::new(),
            interests: Vec::new(),
            container_updates: Vec::new(),
            errors: Vec::new(),

            empty: true,
        }
    }

    // Public

    pub fn is_empty(&self) -> bool {
        self.empty
    }

    pub fn read<V: NodeEvent>(&mut self) -> V::Iter {
        V::iter(self)
    }

    pub fn has<V: NodeEvent>(&self) -> bool {
        V::has(self)
    }

    // Crate-public

    pub(crate) fn push_new_peer(&mut self, node_id: Id) {
        self.new_peers.push(node_id);
        self.empty = false;
    }

    pub(crate) fn push_peer_left(&mut self, node_id: Id) {
        self.peer_lefts.push(node_id);
        self.empty = false;
    }

    pub(crate) fn push_message(&mut self, message: MessageEvent) {
        self.messages.push(message);
        self.empty = false;
    }

    pub(crate) fn push_interest(&mut self, interest: InterestEvent) {
        self.interests.push(interest);
        self.empty = false;
    }

    pub(crate) fn push_container_update(&mut self, update: ContainerUpdateEvent) {
        self.container_updates.push(update);
        self.empty = false;
    }

    pub(crate) fn push_error(&mut self, error: NodeError) {
        self.errors.push(error);
        self.empty = false;
    }
}

// Event Trait
pub trait NodeEvent {
    type Iter;

    fn iter(events: &mut Events) -> Self::Iter;

    fn has(events: &Events) -> bool;
}

// NewPeerEvent
pub struct NewPeerEvent;
impl NodeEvent for NewPeerEvent {
    type Iter = IntoIter<Id>;

    fn iter(events: &mut Events) -> Self::Iter {
        let list = std::mem::take(&mut events.new_peers);
        IntoIterator::into_iter(list)
    }

    fn has(events: &Events) -> bool {
        !events.new_peers.is_empty()
    }
}

// PeerLeftEvent
pub struct PeerLeftEvent;
impl NodeEvent for PeerLeftEvent {
    type Iter = IntoIter<Id>;

    fn iter(events: &mut Events) -> Self::Iter {
        let list = std::mem::take(&mut events.peer_lefts);
        IntoIterator::into_iter(list)
    }

    fn has(events: &Events) -> bool {
        !events.peer_lefts.is_empty()
    }
}

// ErrorEvent
pub struct ErrorEvent;
impl NodeEvent for ErrorEvent {
    type Iter = IntoIter<NodeError>;

    fn iter(events: &mut Events) -> Self::Iter {
        let list = std::mem::take(&mut events.errors);
        IntoIterator::into_iter(list)
    }

    fn has(events: &Events) -> bool {
        !events.errors.is_empty()
    }
}

// MessageEvent

/// Topic data received from a peer. The payload stays encoded until a
/// subscriber decodes it with [`MessageEvent::read`].
#[derive(Clone, Debug)]
pub struct MessageEvent {
    topic: String,
    from: Id,
    payload: Box<[u8]>,
}

impl MessageEvent {
    pub(crate) fn new(topic: String, from: Id, payload: Box<[u8]>) -> Self {
        Self {
            topic,
            from,
            payload,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn sender(&self) -> Id {
        self.from
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn read<M: Serde>(&self) -> Result<M, SerdeErr> {
        let mut reader = BitReader::new(&self.payload);
        M::de(&mut reader)
    }
}

impl NodeEvent for MessageEvent {
    type Iter = IntoIter<MessageEvent>;

    fn iter(events: &mut Events) -> Self::Iter {
        let list = std::mem::take(&mut events.messages);
        IntoIterator::into_iter(list)
    }

    fn has(events: &Events) -> bool {
        !events.messages.is_empty()
    }
}

// InterestEvent

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InterestKind {
    Subscriber,
    Publisher,
}

/// The number of remote subscribers or publishers of a topic changed
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InterestEvent {
    pub topic: String,
    pub type_name: String,
    pub kind: InterestKind,
    pub count: usize,
}

impl NodeEvent for InterestEvent {
    type Iter = IntoIter<InterestEvent>;

    fn iter(events: &mut Events) -> Self::Iter {
        let list = std::mem::take(&mut events.interests);
        IntoIterator::into_iter(list)
    }

    fn has(events: &Events) -> bool {
        !events.interests.is_empty()
    }
}

// ContainerUpdateEvent

/// An UPDATE from a peer was applied to a container
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContainerUpdateEvent {
    pub container: String,
    pub from: Id,
    pub kind: UpdateKind,
    /// Entries carried by the update
    pub entries: usize,
    /// Entries that won against the local table
    pub accepted: usize,
}

impl NodeEvent for ContainerUpdateEvent {
    type Iter = IntoIter<ContainerUpdateEvent>;

    fn iter(events: &mut Events) -> Self::Iter {
        let list = std::mem::take(&mut events.container_updates);
        IntoIterator::into_iter(list)
    }

    fn has(events: &Events) -> bool {
        !events.container_updates.is_empty()
    }
}
