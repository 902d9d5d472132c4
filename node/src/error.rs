use thiserror::Error;

use peerlink_shared::PacketError;

use crate::{
    container::ContainerError, dispatch::DispatchError, link::DiscoveryError,
    transport::TransportError,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NodeError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Malformed packet: {0}")]
    MalformedPacket(#[from] PacketError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Container error: {0}")]
    Container(#[from] ContainerError),

    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),
}

/// Returned by [`NodeHandle`](crate::NodeHandle) calls once the node is gone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("The node this handle belongs to has been dropped")]
pub struct NodeClosedError;
