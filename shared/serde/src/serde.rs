use crate::{BitCounter, BitReader, BitWrite, SerdeErr};

/// A type that can be written to and read from the wire
pub trait Serde: Sized + Clone {
    /// Writes the value into the bit stream
    fn ser(&self, writer: &mut dyn BitWrite);

    /// Reads a value from the bit stream
    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr>;

    /// Number of bits `ser` will write
    fn bit_length(&self) -> u32 {
        let mut counter = BitCounter::new();
        self.ser(&mut counter);
        counter.bits_needed()
    }
}

/// Implemented by types whose encoded size does not depend on their value
pub trait ConstBitLength {
    fn const_bit_length() -> u32;
}
