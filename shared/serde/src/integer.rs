use crate::{BitReader, BitWrite, ConstBitLength, Serde, SerdeErr};

pub type UnsignedInteger<const BITS: u8> = SerdeInteger<false, BITS>;
pub type UnsignedVariableInteger<const BITS: u8> = SerdeInteger<true, BITS>;

/// An unsigned integer written with a chosen number of bits.
///
/// The fixed form always writes `BITS` bits. The variable form writes the
/// value in `BITS`-sized chunks, each preceded by a continuation bit, so small
/// values (lengths, indices) stay small on the wire.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct SerdeInteger<const VARIABLE: bool, const BITS: u8> {
    inner: u64,
}

impl<const VARIABLE: bool, const BITS: u8> SerdeInteger<VARIABLE, BITS> {
    const MAX_BITS: u32 = u64::BITS;

    /// Creates a new integer. For the fixed form the value must fit in
    /// `BITS` bits: debug builds panic otherwise, release builds discard the
    /// extra bits.
    pub fn new<T: Into<u64>>(value: T) -> Self {
        let value = value.into();
        debug_assert!(BITS > 0, "can't create an integer with 0 bits");
        if VARIABLE || BITS as u32 >= Self::MAX_BITS {
            return Self { inner: value };
        }
        debug_assert!(
            value < (1 << BITS),
            "with {} bits, can't encode {}",
            BITS,
            value
        );
        Self {
            inner: value & ((1 << BITS) - 1),
        }
    }

    pub fn get(&self) -> u64 {
        self.inner
    }

    fn read_chunk(reader: &mut BitReader, output: &mut u64, offset: u32) -> Result<(), SerdeErr> {
        for index in 0..BITS as u32 {
            let bit = reader.read_bit()?;
            if !bit {
                continue;
            }
            let position = offset + index;
            if position >= Self::MAX_BITS {
                // value does not fit in 64 bits
                return Err(SerdeErr);
            }
            *output |= 1 << position;
        }
        Ok(())
    }
}

impl<const VARIABLE: bool, const BITS: u8> Serde for SerdeInteger<VARIABLE, BITS> {
    fn ser(&self, writer: &mut dyn BitWrite) {
        let mut value = self.inner;

        if !VARIABLE {
            for _ in 0..BITS {
                writer.write_bit(value & 1 != 0);
                value >>= 1;
            }
            return;
        }

        loop {
            let proceed = (BITS as u32) < Self::MAX_BITS && value >= (1 << BITS);
            writer.write_bit(proceed);
            for _ in 0..BITS {
                writer.write_bit(value & 1 != 0);
                value >>= 1;
            }
            if !proceed {
                return;
            }
        }
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        let mut output: u64 = 0;

        if !VARIABLE {
            Self::read_chunk(reader, &mut output, 0)?;
            return Ok(Self { inner: output });
        }

        let mut offset: u32 = 0;
        loop {
            let proceed = reader.read_bit()?;
            Self::read_chunk(reader, &mut output, offset)?;
            offset += BITS as u32;
            if !proceed {
                return Ok(Self { inner: output });
            }
            if offset >= Self::MAX_BITS {
                return Err(SerdeErr);
            }
        }
    }
}

impl<const BITS: u8> ConstBitLength for SerdeInteger<false, BITS> {
    fn const_bit_length() -> u32 {
        BITS as u32
    }
}

impl<const VARIABLE: bool, const BITS: u8> From<u32> for SerdeInteger<VARIABLE, BITS> {
    fn from(value: u32) -> Self {
        Self::new(value)
    }
}

// Tests
