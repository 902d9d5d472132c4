mod channel;
mod error;

use std::fmt;

pub use channel::{ChannelHub, ChannelTransport};
pub use error::TransportError;

/// Local handle for one transport-level link. Only meaningful to the
/// transport that produced it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkKey(u64);

impl LinkKey {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn to_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for LinkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub enum TransportEvent {
    /// A remote peer opened a link to us
    Connected(LinkKey),
    /// A link closed, from either side
    Disconnected(LinkKey),
    /// A whole packet arrived on a link
    Packet(LinkKey, Box<[u8]>),
}

/// Ordered, reliable, connection-oriented delivery of whole packets.
///
/// A link opened with [`Transport::connect`] is usable immediately and does
/// not produce a `Connected` event; links opened by remote peers do.
pub trait Transport {
    /// Accept links from remote peers at `address`
    fn listen(&mut self, address: &str) -> Result<(), TransportError>;

    /// Open a link to the peer listening at `address`
    fn connect(&mut self, address: &str) -> Result<LinkKey, TransportError>;

    /// Queue a packet on a link
    fn send(&mut self, link: &LinkKey, payload: &[u8]) -> Result<(), TransportError>;

    /// Close a link. The remote peer receives a `Disconnected` event.
    fn disconnect(&mut self, link: &LinkKey);

    /// Returns the next pending event, if any
    fn receive(&mut self) -> Result<Option<TransportEvent>, TransportError>;
}
