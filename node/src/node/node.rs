use std::{collections::HashSet, mem, time::Instant};

use log::{debug, info, warn};
use smol::channel::{self, Receiver, Sender};

use peerlink_shared::{
    BitReader, BitWriter, ContainerHeader, Id, LinkHeader, MsgPacket, PacketError, PayloadType,
    Serde, SerdeErr, StateIndex, TopicInfoPacket,
};

use super::{Command, NodeConfig, NodeHandle};
use crate::{
    container::{ContainerBase, ContainerError, ContainerRegistry, SharedSet},
    dispatch::{DispatchError, RemoteDispatcher},
    event_loop::{EventLoop, Task, TimerKind},
    events::Events,
    link::{Link, LinkEvent, LinkManager},
    transport::{LinkKey, Transport, TransportError, TransportEvent},
    NodeError,
};

/// A peer in the mesh. Discovers other nodes over its transport, exchanges
/// topic traffic with them and keeps its containers in sync with theirs.
///
/// The node never blocks and owns no thread: call [`Node::update`]
/// regularly with the current time and read the returned [`Events`].
pub struct Node {
    node_id: Id,
    instance_id: Id,
    now: Instant,
    link_manager: LinkManager,
    dispatcher: RemoteDispatcher,
    containers: ContainerRegistry,
    event_loop: EventLoop,
    known_peers: HashSet<Id>,
    command_sender: Sender<Command>,
    command_receiver: Receiver<Command>,
    incoming_events: Events,
}

impl Node {
    /// Create a new Node
    pub fn new(config: NodeConfig, transport: Box<dyn Transport>) -> Self {
        let node_id = config.node_id.unwrap_or_else(Id::generate);
        let instance_id = Id::generate();
        let now = Instant::now();
        let (command_sender, command_receiver) = channel::unbounded();

        info!("node {:?} starting as instance {:?}", node_id, instance_id);

        Self {
            node_id,
            instance_id,
            now,
            link_manager: LinkManager::new(
                node_id,
                instance_id,
                config.connection.clone(),
                transport,
            ),
            dispatcher: RemoteDispatcher::new(),
            containers: ContainerRegistry::new(),
            event_loop: EventLoop::new(&config.connection, now),
            known_peers: HashSet::new(),
            command_sender,
            command_receiver,
            incoming_events: Events::new(),
        }
    }

    pub fn node_id(&self) -> Id {
        self.node_id
    }

    /// Changes on every run of the node, even when the node id is fixed
    pub fn instance_id(&self) -> Id {
        self.instance_id
    }

    /// A handle other threads can use to publish and write to containers
    pub fn handle(&self) -> NodeHandle {
        NodeHandle::new(self.command_sender.clone())
    }

    // Links

    /// Accept links at `address`
    pub fn listen(&mut self, address: &str) -> Result<(), TransportError> {
        self.link_manager.listen(address)
    }

    /// Open a link to `address` and start discovery on it. The peer behind
    /// it is reported by a `NewPeerEvent` once discovery completes.
    pub fn connect(&mut self, address: &str) -> Result<LinkKey, TransportError> {
        let key = self.link_manager.connect(address, self.now)?;
        self.collect_events();
        Ok(key)
    }

    /// Close every link to a peer
    pub fn disconnect_peer(&mut self, node_id: &Id) -> bool {
        let disconnected = self.link_manager.disconnect_peer(node_id);
        self.collect_events();
        disconnected
    }

    /// Node ids of every established peer, sorted
    pub fn established_peers(&self) -> Vec<Id> {
        self.link_manager.established_peers()
    }

    pub fn is_established(&self, node_id: &Id) -> bool {
        self.link_manager.is_established(node_id)
    }

    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.link_manager.links()
    }

    pub fn link_manager(&self) -> &LinkManager {
        &self.link_manager
    }

    // Topics

    /// Declare that this node consumes `topic`. Returns false if it already
    /// did.
    pub fn register_subscription(
        &mut self,
        topic: &str,
        type_name: &str,
    ) -> Result<bool, DispatchError> {
        self.dispatcher
            .register_subscription(&mut self.link_manager, topic, type_name)
    }

    /// Declare that this node produces `topic`. Returns false if it already
    /// did.
    pub fn register_publication(
        &mut self,
        topic: &str,
        type_name: &str,
    ) -> Result<bool, DispatchError> {
        self.dispatcher
            .register_publication(&mut self.link_manager, topic, type_name)
    }

    pub fn unregister_subscription(&mut self, topic: &str) -> bool {
        self.dispatcher.unregister_subscription(topic)
    }

    pub fn unregister_publication(&mut self, topic: &str) -> bool {
        self.dispatcher.unregister_publication(topic)
    }

    /// Queue a message for every remote subscriber of `topic`. Returns false
    /// without touching the message when nobody subscribes.
    pub fn publish<M: Serde + Send + 'static>(&mut self, topic: &str, message: M) -> bool {
        if self.dispatcher.remote_subscriber_count(topic) == 0 {
            debug!("no remote subscribers for '{}', not publishing", topic);
            return false;
        }
        self.event_loop.schedule(Task::Publish {
            topic: topic.to_string(),
            message: Box::new(message),
        });
        true
    }

    pub fn remote_subscriber_count(&self, topic: &str) -> usize {
        self.dispatcher.remote_subscriber_count(topic)
    }

    pub fn remote_publisher_count(&self, topic: &str) -> usize {
        self.dispatcher.remote_publisher_count(topic)
    }

    pub fn dispatcher(&self) -> &RemoteDispatcher {
        &self.dispatcher
    }

    // Containers

    /// Create a container and connect it to every established peer.
    /// Returns the instance id of the new container.
    pub fn add_container<K, V>(&mut self, name: &str) -> Result<Id, ContainerError>
    where
        K: Serde + Ord + 'static,
        V: Serde + 'static,
    {
        let container = self.containers.add::<K, V>(name, self.node_id)?;
        for peer in self.link_manager.established_peers() {
            container.connect(&mut self.link_manager, &peer);
        }
        info!("container '{}' added", name);
        let instance_id = container.instance_id();
        self.collect_events();
        Ok(instance_id)
    }

    pub fn container<K, V>(&self, name: &str) -> Result<&SharedSet<K, V>, ContainerError>
    where
        K: Serde + Ord + 'static,
        V: Serde + 'static,
    {
        self.containers.get::<K, V>(name)
    }

    /// Names of every container on this node
    pub fn container_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.containers.names().map(str::to_string).collect();
        names.sort();
        names
    }

    /// Write a value into a container and send it to every connected peer.
    /// Returns the container's new state index.
    pub fn insert_or_update<K, V>(
        &mut self,
        name: &str,
        key: K,
        value: V,
    ) -> Result<StateIndex, ContainerError>
    where
        K: Serde + Ord + 'static,
        V: Serde + 'static,
    {
        let state_index = self
            .containers
            .get_mut::<K, V>(name)?
            .insert_or_update(&mut self.link_manager, key, value)?;
        self.collect_events();
        Ok(state_index)
    }

    // Event loop

    /// Advance the node to `now`: pick up commands and transport traffic,
    /// fire due timers and run every queued task. Returns what happened.
    ///
    /// `now` never moves backwards; an earlier instant is treated as the
    /// latest one seen.
    pub fn update(&mut self, now: Instant) -> Events {
        self.now = self.now.max(now);

        self.receive_commands();
        self.receive_transport();
        self.event_loop.poll_timers(self.now);

        while let Some(task) = self.event_loop.next_task() {
            self.run_task(task);
            self.collect_events();
        }

        mem::replace(&mut self.incoming_events, Events::new())
    }

    /// The instant at which the next timer fires, a hint for how long the
    /// caller may sleep when no traffic arrives
    pub fn next_deadline(&self) -> Instant {
        self.event_loop.next_deadline()
    }

    fn receive_commands(&mut self) {
        while let Ok(command) = self.command_receiver.try_recv() {
            let task = match command {
                Command::Publish { topic, message } => Task::Publish { topic, message },
                Command::Container(command) => Task::Container(command),
            };
            self.event_loop.schedule(task);
        }
    }

    fn receive_transport(&mut self) {
        loop {
            match self.link_manager.receive_transport() {
                Ok(Some(TransportEvent::Connected(key))) => {
                    info!("link {} accepted", key);
                    self.event_loop.schedule(Task::LinkOpened(key));
                }
                Ok(Some(TransportEvent::Disconnected(key))) => {
                    self.event_loop.schedule(Task::LinkClosed(key));
                }
                Ok(Some(TransportEvent::Packet(key, payload))) => {
                    self.event_loop.schedule(Task::PacketReceived(key, payload));
                }
                Ok(None) => break,
                Err(error) => {
                    warn!("transport failed: {}", error);
                    self.incoming_events.push_error(error.into());
                    break;
                }
            }
        }
    }

    fn run_task(&mut self, task: Task) {
        match task {
            Task::LinkOpened(key) => self.link_manager.open_link(key, self.now),
            Task::LinkClosed(key) => self.link_manager.close_link(&key),
            Task::PacketReceived(key, payload) => {
                if let Err(error) = self.process_packet(&key, &payload) {
                    warn!("dropping packet on link {}: {}", key, error);
                    self.incoming_events.push_error(error);
                }
            }
            Task::NewPeer(node_id) => self.on_new_peer(node_id),
            Task::PeerLeft(node_id) => self.on_peer_left(node_id),
            Task::InterestChanged(interest) => self.incoming_events.push_interest(interest),
            Task::Publish { topic, message } => {
                if self.dispatcher.remote_subscriber_count(&topic) == 0 {
                    return;
                }
                let mut writer = BitWriter::new();
                message.write(&mut writer);
                let payload = writer.to_bytes().into_vec();
                let sent = self
                    .dispatcher
                    .send_message(&mut self.link_manager, &topic, payload);
                debug!("published on '{}' to {} peers", topic, sent);
            }
            Task::Container(command) => {
                if let Err(error) = command(&mut self.containers, &mut self.link_manager) {
                    warn!("container command failed: {}", error);
                    self.incoming_events.push_error(error.into());
                }
            }
            Task::Timer(TimerKind::Discovery) => self.link_manager.retry_discovery(self.now),
            Task::Timer(TimerKind::Heartbeat) => self.link_manager.maintain_liveness(self.now),
        }
    }

    fn on_new_peer(&mut self, node_id: Id) {
        // the link may have closed again before this task ran
        if !self.link_manager.is_established(&node_id) || !self.known_peers.insert(node_id) {
            return;
        }

        self.incoming_events.push_new_peer(node_id);
        self.dispatcher.on_new_peer(&mut self.link_manager, &node_id);
        for container in self.containers.iter_mut() {
            container.on_new_peer(&mut self.link_manager, &node_id);
        }
    }

    fn on_peer_left(&mut self, node_id: Id) {
        self.dispatcher.on_peer_left(&node_id);
        for container in self.containers.iter_mut() {
            container.on_peer_left(&node_id);
        }
        if self.known_peers.remove(&node_id) {
            self.incoming_events.push_peer_left(node_id);
        }
    }

    /// Moves link and dispatcher notifications onto the task queue. Peer
    /// changes run before any packet already queued, so traffic from a
    /// restarted peer is never attributed to its previous instance.
    fn collect_events(&mut self) {
        let mut peer_changes = Vec::new();
        for event in self.link_manager.take_events() {
            match event {
                LinkEvent::NewPeer(node_id) => peer_changes.push(Task::NewPeer(node_id)),
                LinkEvent::PeerLeft(node_id) => peer_changes.push(Task::PeerLeft(node_id)),
                LinkEvent::Error(error) => self.incoming_events.push_error(error),
            }
        }
        self.event_loop.schedule_next(peer_changes);
        for interest in self.dispatcher.take_events() {
            self.event_loop.schedule(Task::InterestChanged(interest));
        }
    }

    fn process_packet(&mut self, key: &LinkKey, payload: &[u8]) -> Result<(), NodeError> {
        if !self.link_manager.mark_heard(key, self.now) {
            debug!("dropping packet on closed link {}", key);
            return Ok(());
        }

        let mut reader = BitReader::new(payload);
        let header = LinkHeader::de(&mut reader).map_err(|_| PacketError::MalformedHeader {
            length: payload.len(),
        })?;
        let payload_type = header.payload_type;
        let malformed = |_: SerdeErr| PacketError::MalformedPayload { payload_type };

        if payload_type.is_link_control() {
            self.link_manager
                .process_link_control(&header, &mut reader)
                .map_err(malformed)?;
            return Ok(());
        }

        match payload_type {
            // handled by the link manager above
            PayloadType::Discover | PayloadType::DiscoverReply | PayloadType::Heartbeat => {}
            PayloadType::MsgSubscribe => {
                let packet = TopicInfoPacket::de(&mut reader).map_err(malformed)?;
                self.dispatcher
                    .on_subscribe_received(header.src_node_id, packet)?;
            }
            PayloadType::MsgPublishInfo => {
                let packet = TopicInfoPacket::de(&mut reader).map_err(malformed)?;
                self.dispatcher
                    .on_publish_info_received(header.src_node_id, packet)?;
            }
            PayloadType::MsgPacket => {
                let packet = MsgPacket::de(&mut reader).map_err(malformed)?;
                if let Some(message) = self
                    .dispatcher
                    .on_message_received(header.src_node_id, packet)
                {
                    self.incoming_events.push_message(message);
                }
            }
            PayloadType::Container => {
                let container_header = ContainerHeader::de(&mut reader).map_err(malformed)?;
                let Some(container) = self.containers.get_base_mut(&container_header.container)
                else {
                    return Err(ContainerError::UnknownContainer {
                        name: container_header.container,
                    }
                    .into());
                };
                if let Some(update) = container.receive(
                    &mut self.link_manager,
                    &header.src_node_id,
                    &container_header,
                    &mut reader,
                )? {
                    self.incoming_events.push_container_update(update);
                }
            }
        }

        Ok(())
    }
}
