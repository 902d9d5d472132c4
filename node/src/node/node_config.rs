use peerlink_shared::{ConnectionConfig, Id};

/// Contains Config properties which will be used by a Node
#[derive(Clone, Debug, Default)]
pub struct NodeConfig {
    /// Stable identity of the node. A fresh id is generated when `None`.
    pub node_id: Option<Id>,
    /// Used to configure every link the node holds
    pub connection: ConnectionConfig,
}
