use std::{
    any::Any,
    collections::{BTreeMap, HashMap},
};

use log::{debug, info};

use peerlink_shared::{
    BitReader, BitWriter, ContainerHeader, ContainerPayloadType, ControlCommand, ControlPacket, Id,
    PayloadType, ReplicatedEntry, Serde, StateIndex, UpdatePacket,
};

use super::{ContainerBase, ContainerError, ReplicationConnection};
use crate::{events::ContainerUpdateEvent, link::LinkManager};

// Bounds the allocation made for an update before its entries are decoded
const MAX_PREALLOCATED_ENTRIES: usize = 1024;

/// One stored record of a [`SharedSet`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SetEntry<V> {
    /// Node that wrote this value
    pub origin: Id,
    pub value: V,
    /// Local state index at the time the value was stored
    pub state_index: StateIndex,
    /// Per-key write counter, used to order concurrent writes
    pub version: u32,
}

impl<V> SetEntry<V> {
    /// Whether a write with this `(version, origin)` replaces the entry.
    /// Higher versions win, and the origin id breaks ties.
    pub fn is_superseded_by(&self, version: u32, origin: Id) -> bool {
        (version, origin) > (self.version, self.origin)
    }
}

/// A named key/value container replicated to every peer.
///
/// Every node converges to the same value per key: a write replaces the
/// stored entry only if its `(version, origin)` is greater.
pub struct SharedSet<K, V> {
    name: String,
    node_id: Id,
    instance_id: Id,
    state_index: StateIndex,
    entries: BTreeMap<K, SetEntry<V>>,
    connections: HashMap<Id, ReplicationConnection<K, V>>,
}

impl<K: Serde + Ord, V: Serde> SharedSet<K, V> {
    pub(crate) fn new(name: &str, node_id: Id) -> Self {
        Self {
            name: name.to_string(),
            node_id,
            instance_id: Id::generate(),
            state_index: 0,
            entries: BTreeMap::new(),
            connections: HashMap::new(),
        }
    }

    // Queries

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instance_id(&self) -> Id {
        self.instance_id
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key).map(|entry| &entry.value)
    }

    pub fn entry(&self, key: &K) -> Option<&SetEntry<V>> {
        self.entries.get(key)
    }

    /// All keys and values, in key order
    pub fn entries(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter().map(|(key, entry)| (key, &entry.value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn state_index(&self) -> StateIndex {
        self.state_index
    }

    /// The replication state kept for a peer
    pub fn connection(
        &self,
        node_id: &Id,
    ) -> Result<&ReplicationConnection<K, V>, ContainerError> {
        self.connections
            .get(node_id)
            .ok_or_else(|| ContainerError::ConnectionNotFound {
                container: self.name.clone(),
                node_id: *node_id,
            })
    }

    /// Peers with a replication connection, sorted
    pub fn connected_peers(&self) -> Vec<Id> {
        let mut peers: Vec<Id> = self.connections.keys().copied().collect();
        peers.sort();
        peers
    }

    // Mutations

    /// Stores a value written by this node and sends it to every connected
    /// peer. Returns the new state index.
    pub(crate) fn insert_or_update(
        &mut self,
        link_manager: &mut LinkManager,
        key: K,
        value: V,
    ) -> Result<StateIndex, ContainerError> {
        self.reserve_state_indices(1)?;
        let version = self
            .entries
            .get(&key)
            .map_or(1, |entry| entry.version.saturating_add(1));

        self.state_index += 1;
        self.entries.insert(
            key.clone(),
            SetEntry {
                origin: self.node_id,
                value,
                state_index: self.state_index,
                version,
            },
        );

        self.send_entry(link_manager, &key, None);
        Ok(self.state_index)
    }

    /// Fails if `count` more writes would overflow the state index
    fn reserve_state_indices(&self, count: usize) -> Result<(), ContainerError> {
        let fits = StateIndex::try_from(count)
            .ok()
            .and_then(|count| self.state_index.checked_add(count))
            .is_some();
        if fits {
            Ok(())
        } else {
            Err(ContainerError::StateIndexExhausted {
                container: self.name.clone(),
            })
        }
    }

    /// Creates a connection to the peer if needed and sends CONTROL/connect,
    /// which the peer answers with a snapshot
    pub(crate) fn connect(&mut self, link_manager: &mut LinkManager, node_id: &Id) -> bool {
        let remote_instance_id = self
            .connections
            .entry(*node_id)
            .or_insert_with(|| ReplicationConnection::new(*node_id))
            .remote_instance_id();

        let mut writer = container_writer(
            link_manager,
            &self.name,
            self.instance_id,
            remote_instance_id,
            ContainerPayloadType::Control,
        );
        ControlPacket::connect().ser(&mut writer);
        link_manager.send_to(node_id, &writer.to_bytes())
    }

    /// Applies a remote entry under the conflict policy. Accepted entries
    /// are forwarded to every other connection. The caller reserves the
    /// state index.
    fn merge(
        &mut self,
        link_manager: &mut LinkManager,
        informer: &Id,
        entry: ReplicatedEntry<K, V>,
    ) -> bool {
        if let Some(stored) = self.entries.get(&entry.key) {
            if !stored.is_superseded_by(entry.version, entry.origin) {
                return false;
            }
        }

        let ReplicatedEntry {
            key,
            origin,
            value,
            version,
        } = entry;

        self.state_index += 1;
        self.entries.insert(
            key.clone(),
            SetEntry {
                origin,
                value,
                state_index: self.state_index,
                version,
            },
        );

        self.send_entry(link_manager, &key, Some(informer));
        true
    }

    // Sending

    /// Sends one entry as a partial update to every connection except the
    /// informer's
    fn send_entry(&mut self, link_manager: &mut LinkManager, key: &K, informer: Option<&Id>) {
        let Some(entry) = self.entries.get(key) else {
            return;
        };
        let replicated = ReplicatedEntry {
            key: key.clone(),
            origin: entry.origin,
            value: entry.value.clone(),
            version: entry.version,
        };
        let state_index = self.state_index;

        for (node_id, connection) in self.connections.iter_mut() {
            if Some(node_id) == informer {
                continue;
            }

            let mut writer = container_writer(
                link_manager,
                &self.name,
                self.instance_id,
                connection.remote_instance_id(),
                ContainerPayloadType::Update,
            );
            UpdatePacket::partial(state_index, 1).ser(&mut writer);
            replicated.ser(&mut writer);

            if link_manager.send_to(node_id, &writer.to_bytes()) {
                connection.set_last_sent_index(state_index);
            }
        }
    }

    /// Sends the whole table as a full update. If the peer cannot be
    /// reached yet the snapshot is marked pending.
    fn send_snapshot(&mut self, link_manager: &mut LinkManager, node_id: &Id) -> bool {
        let Some(connection) = self.connections.get_mut(node_id) else {
            return false;
        };

        let mut writer = container_writer(
            link_manager,
            &self.name,
            self.instance_id,
            connection.remote_instance_id(),
            ContainerPayloadType::Update,
        );
        UpdatePacket::full(self.state_index, self.entries.len() as u32).ser(&mut writer);
        for (key, entry) in &self.entries {
            ReplicatedEntry {
                key: key.clone(),
                origin: entry.origin,
                value: entry.value.clone(),
                version: entry.version,
            }
            .ser(&mut writer);
        }

        let sent = link_manager.send_to(node_id, &writer.to_bytes());
        if sent {
            debug!(
                "sent {} entries of '{}' to {:?}",
                self.entries.len(),
                self.name,
                node_id
            );
            connection.set_last_sent_index(self.state_index);
        }
        connection.set_snapshot_pending(!sent);
        sent
    }

    // Receiving

    fn receive_control(
        &mut self,
        link_manager: &mut LinkManager,
        from: &Id,
        reader: &mut BitReader,
    ) -> Result<(), ContainerError> {
        let control = ControlPacket::de(reader).map_err(|_| self.decode_error("control packet"))?;
        match control.command {
            ControlCommand::Connect => {
                if !self.send_snapshot(link_manager, from) {
                    debug!(
                        "peer {:?} not reachable yet, snapshot of '{}' deferred",
                        from, self.name
                    );
                }
            }
        }
        Ok(())
    }

    fn receive_update(
        &mut self,
        link_manager: &mut LinkManager,
        from: &Id,
        reader: &mut BitReader,
    ) -> Result<ContainerUpdateEvent, ContainerError> {
        let update = UpdatePacket::de(reader).map_err(|_| self.decode_error("update header"))?;

        // decode everything before touching any state
        let num_entries = update.num_entries as usize;
        let mut incoming = Vec::with_capacity(num_entries.min(MAX_PREALLOCATED_ENTRIES));
        for _ in 0..num_entries {
            let entry = ReplicatedEntry::<K, V>::de(reader)
                .map_err(|_| self.decode_error("replicated entry"))?;
            incoming.push(entry);
        }

        self.reserve_state_indices(incoming.len())?;

        let Some(connection) = self.connections.get_mut(from) else {
            return Err(ContainerError::ConnectionNotFound {
                container: self.name.clone(),
                node_id: *from,
            });
        };
        connection.apply_update(&update, &incoming);

        let mut accepted = 0;
        for entry in incoming {
            if self.merge(link_manager, from, entry) {
                accepted += 1;
            }
        }

        Ok(ContainerUpdateEvent {
            container: self.name.clone(),
            from: *from,
            kind: update.kind,
            entries: num_entries,
            accepted,
        })
    }

    fn decode_error(&self, part: &'static str) -> ContainerError {
        ContainerError::Decode {
            container: self.name.clone(),
            part,
        }
    }
}

impl<K: Serde + Ord + 'static, V: Serde + 'static> ContainerBase for SharedSet<K, V> {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_new_peer(&mut self, link_manager: &mut LinkManager, node_id: &Id) {
        self.connect(link_manager, node_id);
        let pending = self
            .connections
            .get(node_id)
            .is_some_and(|connection| connection.snapshot_pending());
        if pending {
            self.send_snapshot(link_manager, node_id);
        }
    }

    fn on_peer_left(&mut self, node_id: &Id) {
        if self.connections.remove(node_id).is_some() {
            info!("container '{}' dropped connection to {:?}", self.name, node_id);
        }
    }

    fn receive(
        &mut self,
        link_manager: &mut LinkManager,
        from: &Id,
        header: &ContainerHeader,
        reader: &mut BitReader,
    ) -> Result<Option<ContainerUpdateEvent>, ContainerError> {
        if !header.dest_instance_id.is_null() && header.dest_instance_id != self.instance_id {
            return Err(ContainerError::InstanceMismatch {
                container: self.name.clone(),
                expected: self.instance_id,
                received: header.dest_instance_id,
            });
        }

        self.connections
            .entry(*from)
            .or_insert_with(|| ReplicationConnection::new(*from))
            .bind_instance(header.src_instance_id);

        match header.payload_type {
            ContainerPayloadType::Control => {
                self.receive_control(link_manager, from, reader)?;
                Ok(None)
            }
            ContainerPayloadType::Update => {
                let event = self.receive_update(link_manager, from, reader)?;
                Ok(Some(event))
            }
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn container_writer(
    link_manager: &LinkManager,
    name: &str,
    src_instance_id: Id,
    dest_instance_id: Id,
    payload_type: ContainerPayloadType,
) -> BitWriter {
    let mut writer = link_manager.writer(PayloadType::Container);
    ContainerHeader {
        container: name.to_string(),
        src_instance_id,
        dest_instance_id,
        payload_type,
    }
    .ser(&mut writer);
    writer
}
