use std::{
    collections::{HashMap, VecDeque},
    mem,
    time::Instant,
};

use log::{debug, info, warn};

use peerlink_shared::{
    BitReader, BitWriter, ConnectionConfig, DiscoverPacket, DiscoverReplyPacket, Id, LinkHeader,
    PayloadType, Serde, SerdeErr,
};

use super::{DiscoveryError, Link, LinkState};
use crate::{
    transport::{LinkKey, Transport, TransportError, TransportEvent},
    NodeError,
};

/// Something the rest of the node has to react to
#[derive(Debug)]
pub enum LinkEvent {
    NewPeer(Id),
    PeerLeft(Id),
    Error(NodeError),
}

/// Owns every link, runs the discovery handshake and keeps at most one
/// established link per remote node
pub struct LinkManager {
    node_id: Id,
    instance_id: Id,
    config: ConnectionConfig,
    transport: Box<dyn Transport>,
    links: HashMap<LinkKey, Link>,
    established: HashMap<Id, LinkKey>,
    outbound: HashMap<Id, LinkKey>,
    outgoing_events: VecDeque<LinkEvent>,
}

impl LinkManager {
    pub(crate) fn new(
        node_id: Id,
        instance_id: Id,
        config: ConnectionConfig,
        transport: Box<dyn Transport>,
    ) -> Self {
        Self {
            node_id,
            instance_id,
            config,
            transport,
            links: HashMap::new(),
            established: HashMap::new(),
            outbound: HashMap::new(),
            outgoing_events: VecDeque::new(),
        }
    }

    pub fn node_id(&self) -> Id {
        self.node_id
    }

    pub fn instance_id(&self) -> Id {
        self.instance_id
    }

    // Transport

    pub(crate) fn listen(&mut self, address: &str) -> Result<(), TransportError> {
        self.transport.listen(address)?;
        info!("listening at {}", address);
        Ok(())
    }

    pub(crate) fn connect(&mut self, address: &str, now: Instant) -> Result<LinkKey, TransportError> {
        let key = self.transport.connect(address)?;
        info!("link {} opened to {}", key, address);
        self.open_link(key, now);
        Ok(key)
    }

    pub(crate) fn receive_transport(&mut self) -> Result<Option<TransportEvent>, TransportError> {
        self.transport.receive()
    }

    /// Starts discovery on a freshly opened link
    pub(crate) fn open_link(&mut self, key: LinkKey, now: Instant) {
        if self.links.contains_key(&key) {
            return;
        }
        let link = Link::new(
            key,
            self.config.discovery_retry_interval,
            self.config.disconnection_timeout_duration,
            now,
        );
        self.outbound.insert(link.outbound_id(), key);
        self.links.insert(key, link);
        self.send_discover(&key, now);
    }

    /// The transport reported the link closed
    pub(crate) fn close_link(&mut self, key: &LinkKey) {
        if self.remove_link(key, true).is_some() {
            info!("link {} closed", key);
        }
    }

    /// Closes every link bound to `node_id`. Returns false if there were none.
    pub fn disconnect_peer(&mut self, node_id: &Id) -> bool {
        let keys: Vec<LinkKey> = self
            .links
            .values()
            .filter(|link| link.node_id() == Some(*node_id))
            .map(|link| link.key())
            .collect();
        for key in &keys {
            self.teardown(key, false);
        }
        !keys.is_empty()
    }

    // Receiving

    /// Records traffic on a link. Returns false if the link is unknown, in
    /// which case the packet should be dropped.
    pub(crate) fn mark_heard(&mut self, key: &LinkKey, now: Instant) -> bool {
        let Some(link) = self.links.get_mut(key) else {
            return false;
        };
        link.mark_heard(now);
        true
    }

    /// Handles a discovery or heartbeat payload. Heartbeats carry nothing
    /// beyond the header, which `mark_heard` already accounted for.
    pub(crate) fn process_link_control(
        &mut self,
        header: &LinkHeader,
        reader: &mut BitReader,
    ) -> Result<(), SerdeErr> {
        match header.payload_type {
            PayloadType::Discover => self.on_discover(reader),
            PayloadType::DiscoverReply => self.on_discover_reply(header, reader),
            _ => Ok(()),
        }
    }

    fn on_discover(&mut self, reader: &mut BitReader) -> Result<(), SerdeErr> {
        let discover = DiscoverPacket::de(reader)?;

        let mut writer = self.writer(PayloadType::DiscoverReply);
        DiscoverReplyPacket {
            outbound_id: discover.outbound_id,
        }
        .ser(&mut writer);
        let payload = writer.to_bytes();

        // the sender is not addressable yet, so the reply goes everywhere
        self.broadcast(&payload);
        Ok(())
    }

    fn on_discover_reply(
        &mut self,
        header: &LinkHeader,
        reader: &mut BitReader,
    ) -> Result<(), SerdeErr> {
        let reply = DiscoverReplyPacket::de(reader)?;

        let Some(key) = self.outbound.get(&reply.outbound_id).copied() else {
            debug!(
                "ignoring DISCOVER_REPLY for outbound id {:?}",
                reply.outbound_id
            );
            return Ok(());
        };
        let Some(link) = self.links.get(&key) else {
            return Ok(());
        };
        if !link.is_discovering() {
            // duplicate reply
            return Ok(());
        }

        let node_id = header.src_node_id;
        let instance_id = header.src_instance_id;

        if node_id == self.node_id {
            warn!("link {} loops back to this node, closing it", key);
            self.teardown(&key, false);
            self.outgoing_events
                .push_back(LinkEvent::Error(DiscoveryError::SelfConnection { link: key }.into()));
            return Ok(());
        }

        if let Some(existing_key) = self.established.get(&node_id).copied() {
            let existing_instance = self
                .links
                .get(&existing_key)
                .and_then(|link| link.instance_id());

            if existing_instance == Some(instance_id) {
                info!(
                    "link {} is redundant, peer {:?} is already reachable over link {}",
                    key, node_id, existing_key
                );
                if let Some(link) = self.links.get_mut(&key) {
                    link.set_state(LinkState::Redundant {
                        node_id,
                        instance_id,
                    });
                }
                return Ok(());
            }

            info!("peer {:?} restarted, dropping its old links", node_id);
            let stale: Vec<LinkKey> = self
                .links
                .values()
                .filter(|link| link.key() != key && link.node_id() == Some(node_id))
                .map(|link| link.key())
                .collect();
            for stale_key in stale {
                self.teardown(&stale_key, false);
            }
        }

        if let Some(link) = self.links.get_mut(&key) {
            link.set_state(LinkState::Established {
                node_id,
                instance_id,
            });
        }
        self.established.insert(node_id, key);
        info!("link {} established with peer {:?}", key, node_id);
        self.outgoing_events.push_back(LinkEvent::NewPeer(node_id));

        Ok(())
    }

    // Timers

    /// Re-sends DISCOVER on links still waiting for a reply, and gives up on
    /// those that used every attempt
    pub(crate) fn retry_discovery(&mut self, now: Instant) {
        let due: Vec<LinkKey> = self
            .links
            .values()
            .filter(|link| link.should_retry_discovery(now))
            .map(|link| link.key())
            .collect();

        for key in due {
            let attempts = match self.links.get(&key) {
                Some(link) => link.discovery_attempts(),
                None => continue,
            };

            if attempts >= self.config.discovery_max_attempts {
                warn!(
                    "discovery on link {} unanswered after {} attempts, closing it",
                    key, attempts
                );
                self.teardown(&key, false);
                self.outgoing_events.push_back(LinkEvent::Error(
                    DiscoveryError::Timeout {
                        link: key,
                        attempts,
                    }
                    .into(),
                ));
                continue;
            }

            debug!("retrying discovery on link {} (attempt {})", key, attempts + 1);
            self.send_discover(&key, now);
        }
    }

    /// Closes resolved links that went silent, then heartbeats the rest
    pub(crate) fn maintain_liveness(&mut self, now: Instant) {
        let silent: Vec<LinkKey> = self
            .links
            .values()
            .filter(|link| !link.is_discovering() && link.is_silent(now))
            .map(|link| link.key())
            .collect();
        for key in silent {
            info!("link {} timed out", key);
            self.teardown(&key, true);
        }

        let resolved: Vec<LinkKey> = self
            .links
            .values()
            .filter(|link| !link.is_discovering())
            .map(|link| link.key())
            .collect();
        if resolved.is_empty() {
            return;
        }
        let payload = self.writer(PayloadType::Heartbeat).to_bytes();
        for key in resolved {
            self.send_on(&key, &payload);
        }
    }

    // Sending

    /// Starts a packet from this node with the header already written
    pub fn writer(&self, payload_type: PayloadType) -> BitWriter {
        LinkHeader::new(payload_type, self.node_id, self.instance_id).writer()
    }

    /// Sends to the established link of `node_id`. Returns false if the
    /// peer is unknown or the send failed; the packet is dropped.
    pub fn send_to(&mut self, node_id: &Id, payload: &[u8]) -> bool {
        let Some(key) = self.established.get(node_id).copied() else {
            debug!("dropping packet for unknown peer {:?}", node_id);
            return false;
        };
        self.send_on(&key, payload)
    }

    /// Sends to every established peer. Returns how many sends succeeded.
    pub fn send_to_all(&mut self, payload: &[u8]) -> usize {
        let keys: Vec<LinkKey> = self.established.values().copied().collect();
        let mut sent = 0;
        for key in keys {
            if self.send_on(&key, payload) {
                sent += 1;
            }
        }
        sent
    }

    fn broadcast(&mut self, payload: &[u8]) {
        let keys: Vec<LinkKey> = self.links.keys().copied().collect();
        for key in keys {
            self.send_on(&key, payload);
        }
    }

    fn send_discover(&mut self, key: &LinkKey, now: Instant) {
        let Some(link) = self.links.get_mut(key) else {
            return;
        };
        link.record_discovery_sent(now);
        let outbound_id = link.outbound_id();

        let mut writer = self.writer(PayloadType::Discover);
        DiscoverPacket { outbound_id }.ser(&mut writer);
        let payload = writer.to_bytes();
        self.send_on(key, &payload);
    }

    fn send_on(&mut self, key: &LinkKey, payload: &[u8]) -> bool {
        if !self.links.contains_key(key) {
            return false;
        }
        match self.transport.send(key, payload) {
            Ok(()) => true,
            Err(error) => {
                warn!("send on link {} failed: {}", key, error);
                self.teardown(key, true);
                self.outgoing_events
                    .push_back(LinkEvent::Error(NodeError::Transport(error)));
                false
            }
        }
    }

    // Teardown

    fn teardown(&mut self, key: &LinkKey, promote: bool) {
        self.transport.disconnect(key);
        self.remove_link(key, promote);
    }

    /// Removes a link from every table. If it was the established link of a
    /// node, a redundant link to the same node instance takes its place when
    /// `promote` is set; otherwise the node is reported as gone.
    fn remove_link(&mut self, key: &LinkKey, promote: bool) -> Option<Link> {
        let link = self.links.remove(key)?;
        self.outbound.remove(&link.outbound_id());

        let LinkState::Established {
            node_id,
            instance_id,
        } = link.state()
        else {
            return Some(link);
        };
        if self.established.get(&node_id) != Some(key) {
            return Some(link);
        }
        self.established.remove(&node_id);

        if promote {
            let replacement = self.links.values_mut().find(|other| {
                other.state()
                    == LinkState::Redundant {
                        node_id,
                        instance_id,
                    }
            });
            if let Some(replacement) = replacement {
                replacement.set_state(LinkState::Established {
                    node_id,
                    instance_id,
                });
                let replacement_key = replacement.key();
                self.established.insert(node_id, replacement_key);
                info!(
                    "link {} now carries peer {:?}",
                    replacement_key, node_id
                );
                return Some(link);
            }
        }

        info!("peer {:?} left", node_id);
        self.outgoing_events.push_back(LinkEvent::PeerLeft(node_id));
        Some(link)
    }

    // Queries

    pub fn is_established(&self, node_id: &Id) -> bool {
        self.established.contains_key(node_id)
    }

    /// Node ids of every established peer, sorted
    pub fn established_peers(&self) -> Vec<Id> {
        let mut peers: Vec<Id> = self.established.keys().copied().collect();
        peers.sort();
        peers
    }

    pub fn established_link(&self, node_id: &Id) -> Option<LinkKey> {
        self.established.get(node_id).copied()
    }

    pub fn link(&self, key: &LinkKey) -> Option<&Link> {
        self.links.get(key)
    }

    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.links.values()
    }

    pub(crate) fn take_events(&mut self) -> VecDeque<LinkEvent> {
        mem::take(&mut self.outgoing_events)
    }
}
