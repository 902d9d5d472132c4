use peerlink_serde::{BitReader, BitWrite, BitWriter, Serde, SerdeErr};

use crate::{Id, PayloadType};

/// Prefixes every packet. The payload type is used for demultiplexing, the
/// ids tell the receiver who sent it.
#[derive(Copy, Debug, Clone, Eq, PartialEq)]
pub struct LinkHeader {
    pub payload_type: PayloadType,
    pub src_node_id: Id,
    pub src_instance_id: Id,
}

impl LinkHeader {
    pub fn new(payload_type: PayloadType, src_node_id: Id, src_instance_id: Id) -> Self {
        Self {
            payload_type,
            src_node_id,
            src_instance_id,
        }
    }

    /// Starts a new packet with this header already written
    pub fn writer(&self) -> BitWriter {
        let mut writer = BitWriter::new();
        self.ser(&mut writer);
        writer
    }
}

impl Serde for LinkHeader {
    fn ser(&self, writer: &mut dyn BitWrite) {
        self.payload_type.ser(writer);
        self.src_node_id.ser(writer);
        self.src_instance_id.ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        let payload_type = PayloadType::de(reader)?;
        let src_node_id = Id::de(reader)?;
        let src_instance_id = Id::de(reader)?;

        Ok(Self {
            payload_type,
            src_node_id,
            src_instance_id,
        })
    }
}
