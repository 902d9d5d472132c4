// An enum representing the different kinds of payload that can follow a
// link header

use peerlink_serde::{BitReader, BitWrite, ConstBitLength, Serde, SerdeErr, UnsignedInteger};

use crate::PacketError;

#[derive(Copy, Debug, Clone, Eq, PartialEq, Hash)]
pub enum PayloadType {
    // Announces the sender and asks the receiver to echo an outbound id
    Discover,
    // Echo of a Discover's outbound id, sent to every reachable link
    DiscoverReply,
    // Keeps an established link alive when there is no other traffic
    Heartbeat,
    // A peer subscribes to a topic
    MsgSubscribe,
    // A peer publishes to a topic
    MsgPublishInfo,
    // Topic data
    MsgPacket,
    // Replicated container traffic (control + update)
    Container,
}

impl PayloadType {
    pub fn to_index(&self) -> u8 {
        match self {
            PayloadType::Discover => 0,
            PayloadType::DiscoverReply => 1,
            PayloadType::Heartbeat => 2,
            PayloadType::MsgSubscribe => 3,
            PayloadType::MsgPublishInfo => 4,
            PayloadType::MsgPacket => 5,
            PayloadType::Container => 6,
        }
    }

    pub fn from_index(index: u8) -> Result<Self, PacketError> {
        match index {
            0 => Ok(PayloadType::Discover),
            1 => Ok(PayloadType::DiscoverReply),
            2 => Ok(PayloadType::Heartbeat),
            3 => Ok(PayloadType::MsgSubscribe),
            4 => Ok(PayloadType::MsgPublishInfo),
            5 => Ok(PayloadType::MsgPacket),
            6 => Ok(PayloadType::Container),
            // Malformed or hostile packets can carry any index
            _ => Err(PacketError::InvalidPayloadTypeIndex { index }),
        }
    }

    /// Whether this payload belongs to the discovery handshake
    pub fn is_link_control(&self) -> bool {
        matches!(
            self,
            PayloadType::Discover | PayloadType::DiscoverReply | PayloadType::Heartbeat
        )
    }
}

impl Serde for PayloadType {
    fn ser(&self, writer: &mut dyn BitWrite) {
        UnsignedInteger::<4>::new(self.to_index()).ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        let index = UnsignedInteger::<4>::de(reader)?.get() as u8;
        Self::from_index(index).map_err(|_| SerdeErr)
    }

    fn bit_length(&self) -> u32 {
        <Self as ConstBitLength>::const_bit_length()
    }
}

impl ConstBitLength for PayloadType {
    fn const_bit_length() -> u32 {
        <UnsignedInteger<4> as ConstBitLength>::const_bit_length()
    }
}
