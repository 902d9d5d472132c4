use std::collections::BTreeMap;

use log::info;

use peerlink_shared::{Id, ReplicatedEntry, StateIndex, UpdateKind, UpdatePacket};

use super::SetEntry;

/// Replication state between one container and one remote peer
pub struct ReplicationConnection<K, V> {
    node_id: Id,
    remote_instance_id: Id,
    last_sent_index: StateIndex,
    last_received_index: StateIndex,
    mirror: BTreeMap<K, SetEntry<V>>,
    snapshot_pending: bool,
}

impl<K: Ord + Clone, V: Clone> ReplicationConnection<K, V> {
    pub(crate) fn new(node_id: Id) -> Self {
        Self {
            node_id,
            remote_instance_id: Id::NULL,
            last_sent_index: 0,
            last_received_index: 0,
            mirror: BTreeMap::new(),
            snapshot_pending: false,
        }
    }

    pub fn node_id(&self) -> Id {
        self.node_id
    }

    /// The peer's container instance, null until it has sent us something
    pub fn remote_instance_id(&self) -> Id {
        self.remote_instance_id
    }

    /// Highest local state index sent to the peer
    pub fn last_sent_index(&self) -> StateIndex {
        self.last_sent_index
    }

    /// `end_index` of the last update received from the peer
    pub fn last_received_index(&self) -> StateIndex {
        self.last_received_index
    }

    /// The peer's entries as last reported by the peer
    pub fn mirror(&self) -> &BTreeMap<K, SetEntry<V>> {
        &self.mirror
    }

    /// Mirror entries received after `index`
    pub fn mirror_since(&self, index: StateIndex) -> impl Iterator<Item = (&K, &SetEntry<V>)> {
        self.mirror
            .iter()
            .filter(move |(_, entry)| entry.state_index > index)
    }

    /// A snapshot for this peer could not be sent yet
    pub fn snapshot_pending(&self) -> bool {
        self.snapshot_pending
    }

    // Crate-public

    /// Learns the peer's container instance. A different instance than the
    /// one already known means the peer restarted, so everything known
    /// about it is discarded.
    pub(crate) fn bind_instance(&mut self, instance_id: Id) {
        if self.remote_instance_id == instance_id {
            return;
        }
        if !self.remote_instance_id.is_null() {
            info!(
                "peer {:?} container instance changed, resetting replication state",
                self.node_id
            );
            self.last_sent_index = 0;
            self.last_received_index = 0;
            self.mirror.clear();
        }
        self.remote_instance_id = instance_id;
    }

    pub(crate) fn set_last_sent_index(&mut self, index: StateIndex) {
        self.last_sent_index = index;
    }

    pub(crate) fn set_snapshot_pending(&mut self, pending: bool) {
        self.snapshot_pending = pending;
    }

    /// Records a decoded update in the mirror. A full update replaces it.
    pub(crate) fn apply_update(&mut self, update: &UpdatePacket, entries: &[ReplicatedEntry<K, V>]) {
        if update.kind == UpdateKind::Full {
            self.mirror.clear();
        }
        for entry in entries {
            self.mirror.insert(
                entry.key.clone(),
                SetEntry {
                    origin: entry.origin,
                    value: entry.value.clone(),
                    state_index: update.end_index,
                    version: entry.version,
                },
            );
        }
        self.last_received_index = update.end_index;
    }
}
