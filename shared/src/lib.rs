//! # Peerlink Shared
//! Identifiers, wire packets and timing primitives shared by every
//! peerlink node.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

pub use peerlink_serde::{
    BitCounter, BitReader, BitWrite, BitWriter, ConstBitLength, Serde, SerdeErr, SerdeInteger,
    UnsignedInteger, UnsignedVariableInteger,
};

mod backends;
mod connection;
mod id;
mod packets;
mod types;

pub use backends::{PeriodicTimer, Timer};
pub use connection::{
    connection_config::ConnectionConfig, error::PacketError, header::LinkHeader,
    payload_type::PayloadType,
};
pub use id::Id;
pub use packets::{
    container::{
        ContainerHeader, ContainerPayloadType, ControlCommand, ControlPacket, ReplicatedEntry,
        UpdateKind, UpdatePacket,
    },
    discovery::{DiscoverPacket, DiscoverReplyPacket},
    topic::{MsgPacket, TopicInfoPacket},
};
pub use types::StateIndex;
