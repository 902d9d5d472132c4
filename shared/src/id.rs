use std::fmt;

use peerlink_serde::{BitReader, BitWrite, ConstBitLength, Serde, SerdeErr};

/// A 128-bit identifier used for nodes, per-run instances, container
/// instances and discovery attempts.
///
/// Generated values are never equal to [`Id::NULL`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Id(u128);

impl Id {
    /// The null identifier, used where "no specific id" is meant
    pub const NULL: Id = Id(0);

    /// Generates a new random identifier
    pub fn generate() -> Self {
        loop {
            let value = fastrand::u128(..);
            if value != 0 {
                return Self(value);
            }
        }
    }

    pub fn null() -> Self {
        Self::NULL
    }

    pub fn is_null(&self) -> bool {
        self.0 == 0
    }

    pub fn from_u128(value: u128) -> Self {
        Self(value)
    }

    pub fn to_u128(&self) -> u128 {
        self.0
    }

    /// First 8 hex digits, enough to tell ids apart in logs
    pub fn short_string(&self) -> String {
        let full = self.to_string();
        full[..8].to_string()
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            return write!(f, "Id(null)");
        }
        write!(f, "Id({})", self.short_string())
    }
}

impl Serde for Id {
    fn ser(&self, writer: &mut dyn BitWrite) {
        self.0.ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        Ok(Self(u128::de(reader)?))
    }
}

impl ConstBitLength for Id {
    fn const_bit_length() -> u32 {
        u128::BITS
    }
}
