use std::{
    collections::{BTreeMap, HashMap, HashSet},
    mem,
};

use log::{debug, warn};

use peerlink_shared::{Id, MsgPacket, PayloadType, Serde, TopicInfoPacket};

use super::DispatchError;
use crate::{
    events::{InterestEvent, InterestKind, MessageEvent},
    link::LinkManager,
};

/// Remote interest for one kind (subscribers or publishers)
#[derive(Default)]
struct RemoteRegistry {
    peers: HashMap<String, HashSet<Id>>,
    types: HashMap<String, String>,
}

impl RemoteRegistry {
    fn count(&self, topic: &str) -> usize {
        self.peers.get(topic).map_or(0, |peers| peers.len())
    }

    /// Returns true if the peer was not yet recorded for the topic
    fn insert(&mut self, topic: &str, node_id: Id) -> bool {
        self.peers
            .entry(topic.to_string())
            .or_default()
            .insert(node_id)
    }

    /// Removes the peer everywhere. Returns the topics it was removed from.
    fn remove_peer(&mut self, node_id: &Id) -> Vec<String> {
        let mut affected = Vec::new();
        for (topic, peers) in self.peers.iter_mut() {
            if peers.remove(node_id) {
                affected.push(topic.clone());
            }
        }
        affected.sort();
        for topic in &affected {
            if self.count(topic) == 0 {
                self.peers.remove(topic);
            }
        }
        affected
    }
}

/// Tracks which topics this node and its peers subscribe to or publish,
/// and moves topic traffic between them
pub struct RemoteDispatcher {
    local_subscriptions: BTreeMap<String, String>,
    local_publications: BTreeMap<String, String>,
    remote_subscribers: RemoteRegistry,
    remote_publishers: RemoteRegistry,
    outgoing_events: Vec<InterestEvent>,
}

impl RemoteDispatcher {
    pub(crate) fn new() -> Self {
        Self {
            local_subscriptions: BTreeMap::new(),
            local_publications: BTreeMap::new(),
            remote_subscribers: RemoteRegistry::default(),
            remote_publishers: RemoteRegistry::default(),
            outgoing_events: Vec::new(),
        }
    }

    // Local interest

    /// Records a local subscription and announces it to every established
    /// peer. Returns false if it was already registered.
    pub fn register_subscription(
        &mut self,
        link_manager: &mut LinkManager,
        topic: &str,
        type_name: &str,
    ) -> Result<bool, DispatchError> {
        if !Self::insert_local(&mut self.local_subscriptions, topic, type_name)? {
            return Ok(false);
        }
        announce(
            link_manager,
            PayloadType::MsgSubscribe,
            &TopicInfoPacket::new(topic, type_name),
            None,
        );
        Ok(true)
    }

    /// Records a local publication and announces it to every established
    /// peer. Returns false if it was already registered.
    pub fn register_publication(
        &mut self,
        link_manager: &mut LinkManager,
        topic: &str,
        type_name: &str,
    ) -> Result<bool, DispatchError> {
        if !Self::insert_local(&mut self.local_publications, topic, type_name)? {
            return Ok(false);
        }
        announce(
            link_manager,
            PayloadType::MsgPublishInfo,
            &TopicInfoPacket::new(topic, type_name),
            None,
        );
        Ok(true)
    }

    /// Forgets a local subscription. Peers keep their record of it until
    /// they reconnect.
    pub fn unregister_subscription(&mut self, topic: &str) -> bool {
        self.local_subscriptions.remove(topic).is_some()
    }

    pub fn unregister_publication(&mut self, topic: &str) -> bool {
        self.local_publications.remove(topic).is_some()
    }

    fn insert_local(
        registry: &mut BTreeMap<String, String>,
        topic: &str,
        type_name: &str,
    ) -> Result<bool, DispatchError> {
        if let Some(existing) = registry.get(topic) {
            if existing != type_name {
                return Err(DispatchError::TypeMismatch {
                    topic: topic.to_string(),
                    expected: existing.clone(),
                    received: type_name.to_string(),
                    peer: None,
                });
            }
            return Ok(false);
        }
        registry.insert(topic.to_string(), type_name.to_string());
        Ok(true)
    }

    // Peers

    /// Replays every local subscription and publication to a new peer
    pub(crate) fn on_new_peer(&mut self, link_manager: &mut LinkManager, node_id: &Id) {
        for (topic, type_name) in &self.local_subscriptions {
            announce(
                link_manager,
                PayloadType::MsgSubscribe,
                &TopicInfoPacket::new(topic, type_name),
                Some(node_id),
            );
        }
        for (topic, type_name) in &self.local_publications {
            announce(
                link_manager,
                PayloadType::MsgPublishInfo,
                &TopicInfoPacket::new(topic, type_name),
                Some(node_id),
            );
        }
    }

    /// Forgets everything a departed peer announced
    pub(crate) fn on_peer_left(&mut self, node_id: &Id) {
        for topic in self.remote_subscribers.remove_peer(node_id) {
            let event =
                Self::interest_event(&self.remote_subscribers, InterestKind::Subscriber, &topic);
            if event.count == 0 {
                self.remote_subscribers.types.remove(&topic);
            }
            self.outgoing_events.push(event);
        }
        for topic in self.remote_publishers.remove_peer(node_id) {
            let event =
                Self::interest_event(&self.remote_publishers, InterestKind::Publisher, &topic);
            if event.count == 0 {
                self.remote_publishers.types.remove(&topic);
            }
            self.outgoing_events.push(event);
        }
    }

    // Receiving

    /// A peer subscribed to a topic. The interest is recorded even when its
    /// type disagrees with what is already known, in which case the
    /// mismatch is returned as an error.
    pub(crate) fn on_subscribe_received(
        &mut self,
        node_id: Id,
        packet: TopicInfoPacket,
    ) -> Result<(), DispatchError> {
        Self::record_remote(
            &mut self.remote_subscribers,
            &mut self.outgoing_events,
            InterestKind::Subscriber,
            node_id,
            packet,
        )
    }

    pub(crate) fn on_publish_info_received(
        &mut self,
        node_id: Id,
        packet: TopicInfoPacket,
    ) -> Result<(), DispatchError> {
        Self::record_remote(
            &mut self.remote_publishers,
            &mut self.outgoing_events,
            InterestKind::Publisher,
            node_id,
            packet,
        )
    }

    fn record_remote(
        registry: &mut RemoteRegistry,
        outgoing_events: &mut Vec<InterestEvent>,
        kind: InterestKind,
        node_id: Id,
        packet: TopicInfoPacket,
    ) -> Result<(), DispatchError> {
        let TopicInfoPacket { topic, type_name } = packet;

        let mismatch = match registry.types.get(&topic) {
            Some(known) if *known != type_name => {
                warn!(
                    "peer {:?} announced topic '{}' as '{}', already known as '{}'",
                    node_id, topic, type_name, known
                );
                Some(DispatchError::TypeMismatch {
                    topic: topic.clone(),
                    expected: known.clone(),
                    received: type_name.clone(),
                    peer: Some(node_id),
                })
            }
            Some(_) => None,
            None => {
                registry.types.insert(topic.clone(), type_name.clone());
                None
            }
        };

        if registry.insert(&topic, node_id) {
            debug!("peer {:?} is now a {:?} of '{}'", node_id, kind, topic);
            outgoing_events.push(Self::interest_event(registry, kind, &topic));
        }

        match mismatch {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Topic data from a peer. Dropped unless this node subscribes to the
    /// topic.
    pub(crate) fn on_message_received(
        &mut self,
        node_id: Id,
        packet: MsgPacket,
    ) -> Option<MessageEvent> {
        if !self.local_subscriptions.contains_key(&packet.topic) {
            debug!(
                "dropping message on '{}' from {:?}, not subscribed",
                packet.topic, node_id
            );
            return None;
        }
        Some(MessageEvent::new(
            packet.topic,
            node_id,
            packet.payload.into_boxed_slice(),
        ))
    }

    // Publishing

    /// Sends an already serialized message to every current subscriber of
    /// the topic. Returns how many peers it reached.
    pub(crate) fn send_message(
        &self,
        link_manager: &mut LinkManager,
        topic: &str,
        payload: Vec<u8>,
    ) -> usize {
        let Some(subscribers) = self.remote_subscribers.peers.get(topic) else {
            return 0;
        };

        let mut writer = link_manager.writer(PayloadType::MsgPacket);
        MsgPacket {
            topic: topic.to_string(),
            payload,
        }
        .ser(&mut writer);
        let packet = writer.to_bytes();

        let mut sent = 0;
        for node_id in subscribers {
            if link_manager.send_to(node_id, &packet) {
                sent += 1;
            }
        }
        sent
    }

    // Queries

    pub fn remote_subscriber_count(&self, topic: &str) -> usize {
        self.remote_subscribers.count(topic)
    }

    pub fn remote_publisher_count(&self, topic: &str) -> usize {
        self.remote_publishers.count(topic)
    }

    /// Current subscribers of a topic, sorted
    pub fn remote_subscribers(&self, topic: &str) -> Vec<Id> {
        let mut peers: Vec<Id> = self
            .remote_subscribers
            .peers
            .get(topic)
            .map(|peers| peers.iter().copied().collect())
            .unwrap_or_default();
        peers.sort();
        peers
    }

    /// `(topic, type name)` pairs this node subscribes to
    pub fn local_subscriptions(&self) -> impl Iterator<Item = (&str, &str)> {
        self.local_subscriptions
            .iter()
            .map(|(topic, type_name)| (topic.as_str(), type_name.as_str()))
    }

    pub fn local_publications(&self) -> impl Iterator<Item = (&str, &str)> {
        self.local_publications
            .iter()
            .map(|(topic, type_name)| (topic.as_str(), type_name.as_str()))
    }

    pub(crate) fn take_events(&mut self) -> Vec<InterestEvent> {
        mem::take(&mut self.outgoing_events)
    }

    fn interest_event(registry: &RemoteRegistry, kind: InterestKind, topic: &str) -> InterestEvent {
        InterestEvent {
            topic: topic.to_string(),
            type_name: registry.types.get(topic).cloned().unwrap_or_default(),
            kind,
            count: registry.count(topic),
        }
    }
}

/// Sends a topic announcement to one peer, or to every established peer
fn announce(
    link_manager: &mut LinkManager,
    payload_type: PayloadType,
    packet: &TopicInfoPacket,
    node_id: Option<&Id>,
) {
    let mut writer = link_manager.writer(payload_type);
    packet.ser(&mut writer);
    let payload = writer.to_bytes();

    match node_id {
        Some(node_id) => {
            link_manager.send_to(node_id, &payload);
        }
        None => {
            link_manager.send_to_all(&payload);
        }
    }
}
