use peerlink_serde::{BitReader, BitWrite, Serde, SerdeErr};

use crate::Id;

/// Announces the sender and asks whoever receives it to echo `outbound_id`
#[derive(Copy, Debug, Clone, Eq, PartialEq)]
pub struct DiscoverPacket {
    pub outbound_id: Id,
}

/// Echo of a [`DiscoverPacket`]. The sender's node id travels in the link
/// header, which is what resolves the discovering link.
#[derive(Copy, Debug, Clone, Eq, PartialEq)]
pub struct DiscoverReplyPacket {
    pub outbound_id: Id,
}

impl Serde for DiscoverPacket {
    fn ser(&self, writer: &mut dyn BitWrite) {
        self.outbound_id.ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        Ok(Self {
            outbound_id: Id::de(reader)?,
        })
    }
}

impl Serde for DiscoverReplyPacket {
    fn ser(&self, writer: &mut dyn BitWrite) {
        self.outbound_id.ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        Ok(Self {
            outbound_id: Id::de(reader)?,
        })
    }
}
