use peerlink_serde::{BitReader, BitWrite, Serde, SerdeErr};

/// Body of both MSG_SUBSCRIBE and MSG_PUBLISH_INFO; the payload type in the
/// link header tells them apart
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TopicInfoPacket {
    pub topic: String,
    pub type_name: String,
}

impl TopicInfoPacket {
    pub fn new(topic: &str, type_name: &str) -> Self {
        Self {
            topic: topic.to_string(),
            type_name: type_name.to_string(),
        }
    }
}

impl Serde for TopicInfoPacket {
    fn ser(&self, writer: &mut dyn BitWrite) {
        self.topic.ser(writer);
        self.type_name.ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        let topic = String::de(reader)?;
        let type_name = String::de(reader)?;
        Ok(Self { topic, type_name })
    }
}

/// Topic data. The payload is opaque here, only the subscriber knows how to
/// decode it.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct MsgPacket {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl Serde for MsgPacket {
    fn ser(&self, writer: &mut dyn BitWrite) {
        self.topic.ser(writer);
        self.payload.ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        let topic = String::de(reader)?;
        let payload = Vec::<u8>::de(reader)?;
        Ok(Self { topic, payload })
    }
}
