mod events;

pub use events::{
    ContainerUpdateEvent, ErrorEvent, Events, InterestEvent, InterestKind, MessageEvent,
    NewPeerEvent, NodeEvent, PeerLeftEvent,
};
