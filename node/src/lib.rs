//! # Peerlink Node
//! A broker-less peer: discovers other nodes over a pluggable transport,
//! exchanges typed publish/subscribe traffic with them, and keeps named
//! key/value containers replicated across every node it can reach.

#![deny(
    trivial_casts,
    trivial_numeric_casts,
    unstable_features,
    unused_import_braces
)]

pub mod transport;
pub mod shared {
    pub use peerlink_shared::{
        BitReader, BitWrite, BitWriter, ConnectionConfig, ConstBitLength, Id, Serde, SerdeErr,
        StateIndex, UnsignedInteger, UnsignedVariableInteger, UpdateKind,
    };
}

mod container;
mod dispatch;
mod error;
mod event_loop;
mod events;
mod link;
mod node;

pub use container::{ContainerError, ReplicationConnection, SetEntry, SharedSet};
pub use dispatch::{DispatchError, MessagePayload, RemoteDispatcher};
pub use error::{NodeClosedError, NodeError};
pub use events::{
    ContainerUpdateEvent, ErrorEvent, Events, InterestEvent, InterestKind, MessageEvent,
    NewPeerEvent, NodeEvent, PeerLeftEvent,
};
pub use link::{DiscoveryError, Link, LinkManager, LinkState};
pub use node::{Node, NodeConfig, NodeHandle};
pub use transport::{ChannelHub, ChannelTransport, LinkKey, Transport, TransportError, TransportEvent};
