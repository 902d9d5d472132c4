use crate::{BitReader, BitWrite, ConstBitLength, Serde, SerdeErr, UnsignedVariableInteger};

// Unit

impl Serde for () {
    fn ser(&self, _: &mut dyn BitWrite) {}

    fn de(_: &mut BitReader) -> Result<Self, SerdeErr> {
        Ok(())
    }
}

// Boolean

impl Serde for bool {
    fn ser(&self, writer: &mut dyn BitWrite) {
        writer.write_bit(*self);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        reader.read_bit()
    }
}

impl ConstBitLength for bool {
    fn const_bit_length() -> u32 {
        1
    }
}

// Fixed-width integers, little endian

macro_rules! impl_serde_for_int {
    ($impl_type:ty) => {
        impl Serde for $impl_type {
            fn ser(&self, writer: &mut dyn BitWrite) {
                writer.write_bytes(&self.to_le_bytes());
            }

            fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
                let mut bytes = [0u8; std::mem::size_of::<$impl_type>()];
                for byte in bytes.iter_mut() {
                    *byte = reader.read_byte()?;
                }
                Ok(<$impl_type>::from_le_bytes(bytes))
            }
        }

        impl ConstBitLength for $impl_type {
            fn const_bit_length() -> u32 {
                <$impl_type>::BITS
            }
        }
    };
}

impl_serde_for_int!(u8);
impl_serde_for_int!(u16);
impl_serde_for_int!(u32);
impl_serde_for_int!(u64);
impl_serde_for_int!(u128);
impl_serde_for_int!(i8);
impl_serde_for_int!(i16);
impl_serde_for_int!(i32);
impl_serde_for_int!(i64);

// Lengths

fn ser_length(length: usize, writer: &mut dyn BitWrite) {
    UnsignedVariableInteger::<7>::new(length as u64).ser(writer);
}

fn de_length(reader: &mut BitReader) -> Result<usize, SerdeErr> {
    let length = UnsignedVariableInteger::<7>::de(reader)?.get();
    let length = usize::try_from(length).map_err(|_| SerdeErr)?;
    // every element occupies at least one bit, so a length that exceeds
    // the remaining buffer can only come from a malformed packet
    if length > reader.bytes_remaining().saturating_mul(8).saturating_add(8) {
        return Err(SerdeErr);
    }
    Ok(length)
}

// String

impl Serde for String {
    fn ser(&self, writer: &mut dyn BitWrite) {
        ser_length(self.len(), writer);
        writer.write_bytes(self.as_bytes());
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        let length = de_length(reader)?;
        let mut bytes = Vec::with_capacity(length);
        for _ in 0..length {
            bytes.push(reader.read_byte()?);
        }
        String::from_utf8(bytes).map_err(|_| SerdeErr)
    }
}

// Collections

impl<T: Serde> Serde for Vec<T> {
    fn ser(&self, writer: &mut dyn BitWrite) {
        ser_length(self.len(), writer);
        for item in self {
            item.ser(writer);
        }
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        let length = de_length(reader)?;
        let mut output = Vec::with_capacity(length);
        for _ in 0..length {
            output.push(T::de(reader)?);
        }
        Ok(output)
    }
}

impl<T: Serde> Serde for Option<T> {
    fn ser(&self, writer: &mut dyn BitWrite) {
        match self {
            Some(value) => {
                true.ser(writer);
                value.ser(writer);
            }
            None => {
                false.ser(writer);
            }
        }
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        if bool::de(reader)? {
            Ok(Some(T::de(reader)?))
        } else {
            Ok(None)
        }
    }
}

impl<A: Serde, B: Serde> Serde for (A, B) {
    fn ser(&self, writer: &mut dyn BitWrite) {
        self.0.ser(writer);
        self.1.ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        Ok((A::de(reader)?, B::de(reader)?))
    }
}
