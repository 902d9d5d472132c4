use peerlink_serde::{
    BitReader, BitWrite, Serde, SerdeErr, UnsignedInteger, UnsignedVariableInteger,
};

use crate::{Id, PacketError, StateIndex};

/// What follows a [`ContainerHeader`]
#[derive(Copy, Debug, Clone, Eq, PartialEq)]
pub enum ContainerPayloadType {
    Control,
    Update,
}

impl Serde for ContainerPayloadType {
    fn ser(&self, writer: &mut dyn BitWrite) {
        let is_update = *self == ContainerPayloadType::Update;
        is_update.ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        if bool::de(reader)? {
            Ok(ContainerPayloadType::Update)
        } else {
            Ok(ContainerPayloadType::Control)
        }
    }
}

/// Follows the link header on every container packet. Addresses a named
/// container; `dest_instance_id` is null when the sender does not know the
/// receiving instance yet.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ContainerHeader {
    pub container: String,
    pub src_instance_id: Id,
    pub dest_instance_id: Id,
    pub payload_type: ContainerPayloadType,
}

impl Serde for ContainerHeader {
    fn ser(&self, writer: &mut dyn BitWrite) {
        self.container.ser(writer);
        self.src_instance_id.ser(writer);
        self.dest_instance_id.ser(writer);
        self.payload_type.ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        let container = String::de(reader)?;
        let src_instance_id = Id::de(reader)?;
        let dest_instance_id = Id::de(reader)?;
        let payload_type = ContainerPayloadType::de(reader)?;

        Ok(Self {
            container,
            src_instance_id,
            dest_instance_id,
            payload_type,
        })
    }
}

// Control

#[derive(Copy, Debug, Clone, Eq, PartialEq)]
pub enum ControlCommand {
    Connect,
}

impl ControlCommand {
    pub fn from_index(index: u8) -> Result<Self, PacketError> {
        match index {
            0 => Ok(ControlCommand::Connect),
            _ => Err(PacketError::InvalidControlCommand { index }),
        }
    }
}

#[derive(Copy, Debug, Clone, Eq, PartialEq)]
pub struct ControlPacket {
    pub command: ControlCommand,
}

impl ControlPacket {
    pub fn connect() -> Self {
        Self {
            command: ControlCommand::Connect,
        }
    }
}

impl Serde for ControlPacket {
    fn ser(&self, writer: &mut dyn BitWrite) {
        let index: u8 = match self.command {
            ControlCommand::Connect => 0,
        };
        UnsignedInteger::<2>::new(index).ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        let index = UnsignedInteger::<2>::de(reader)?.get() as u8;
        let command = ControlCommand::from_index(index).map_err(|_| SerdeErr)?;
        Ok(Self { command })
    }
}

// Update

#[derive(Copy, Debug, Clone, Eq, PartialEq)]
pub enum UpdateKind {
    /// The sender's whole entry table
    Full,
    /// Entries changed since the last update
    Partial,
}

/// Envelope for `num_entries` [`ReplicatedEntry`] values that follow it
#[derive(Copy, Debug, Clone, Eq, PartialEq)]
pub struct UpdatePacket {
    pub start_index: StateIndex,
    pub end_index: StateIndex,
    pub kind: UpdateKind,
    pub num_entries: u32,
}

impl UpdatePacket {
    pub fn partial(state_index: StateIndex, num_entries: u32) -> Self {
        Self {
            start_index: state_index,
            end_index: state_index,
            kind: UpdateKind::Partial,
            num_entries,
        }
    }

    pub fn full(state_index: StateIndex, num_entries: u32) -> Self {
        Self {
            start_index: 0,
            end_index: state_index,
            kind: UpdateKind::Full,
            num_entries,
        }
    }
}

fn ser_index(index: u32, writer: &mut dyn BitWrite) {
    UnsignedVariableInteger::<7>::new(index).ser(writer);
}

fn de_index(reader: &mut BitReader) -> Result<u32, SerdeErr> {
    let value = UnsignedVariableInteger::<7>::de(reader)?.get();
    u32::try_from(value).map_err(|_| SerdeErr)
}

impl Serde for UpdatePacket {
    fn ser(&self, writer: &mut dyn BitWrite) {
        ser_index(self.start_index, writer);
        ser_index(self.end_index, writer);
        let is_full = self.kind == UpdateKind::Full;
        is_full.ser(writer);
        ser_index(self.num_entries, writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        let start_index = de_index(reader)?;
        let end_index = de_index(reader)?;
        let kind = if bool::de(reader)? {
            UpdateKind::Full
        } else {
            UpdateKind::Partial
        };
        let num_entries = de_index(reader)?;

        Ok(Self {
            start_index,
            end_index,
            kind,
            num_entries,
        })
    }
}

/// One container record on the wire
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ReplicatedEntry<K, V> {
    pub key: K,
    pub origin: Id,
    pub value: V,
    pub version: u32,
}

impl<K: Serde, V: Serde> Serde for ReplicatedEntry<K, V> {
    fn ser(&self, writer: &mut dyn BitWrite) {
        self.key.ser(writer);
        self.origin.ser(writer);
        self.value.ser(writer);
        ser_index(self.version, writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        let key = K::de(reader)?;
        let origin = Id::de(reader)?;
        let value = V::de(reader)?;
        let version = de_index(reader)?;

        Ok(Self {
            key,
            origin,
            value,
            version,
        })
    }
}
