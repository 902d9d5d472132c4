use thiserror::Error;

use peerlink_shared::Id;

/// Errors that can occur during replicated container operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContainerError {
    /// No replication connection exists for the peer
    #[error("Container '{container}' has no connection to peer {node_id:?}")]
    ConnectionNotFound {
        container: String,
        node_id: Id,
    },

    /// No container is registered under the name
    #[error("No container named '{name}'. Containers must be added with Node::add_container()")]
    UnknownContainer {
        name: String,
    },

    /// The container exists but holds other key/value types
    #[error("Container '{name}' was added with different key or value types")]
    ContainerTypeMismatch {
        name: String,
    },

    /// A container with the name already exists
    #[error("Container '{name}' already exists")]
    DuplicateContainer {
        name: String,
    },

    /// An inbound container packet could not be decoded. Nothing from it
    /// was applied.
    #[error("Failed to decode {part} for container '{container}'. The packet is malformed")]
    Decode {
        container: String,
        part: &'static str,
    },

    /// The container's state index cannot advance any further
    #[error("Container '{container}' has exhausted its state index and accepts no more writes")]
    StateIndexExhausted {
        container: String,
    },

    /// A packet was addressed to another instance of this container
    #[error("Packet for container '{container}' addressed to instance {received:?}, but this instance is {expected:?}")]
    InstanceMismatch {
        container: String,
        expected: Id,
        received: Id,
    },
}
