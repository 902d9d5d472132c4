use crate::SerdeErr;

/// Reads bits out of a borrowed byte buffer, in the same LSB-first order
/// that [`BitWriter`](crate::BitWriter) writes them
pub struct BitReader<'b> {
    buffer: &'b [u8],
    buffer_index: usize,
    scratch: u8,
    scratch_bits: u8,
}

impl<'b> BitReader<'b> {
    pub fn new(buffer: &'b [u8]) -> Self {
        Self {
            buffer,
            buffer_index: 0,
            scratch: 0,
            scratch_bits: 0,
        }
    }

    pub fn read_bit(&mut self) -> Result<bool, SerdeErr> {
        if self.scratch_bits == 0 {
            let Some(byte) = self.buffer.get(self.buffer_index) else {
                return Err(SerdeErr);
            };
            self.scratch = *byte;
            self.scratch_bits = 8;
            self.buffer_index += 1;
        }

        let bit = self.scratch & 1 != 0;
        self.scratch >>= 1;
        self.scratch_bits -= 1;

        Ok(bit)
    }

    pub fn read_byte(&mut self) -> Result<u8, SerdeErr> {
        let mut output = 0;
        for index in 0..8 {
            if self.read_bit()? {
                output |= 1 << index;
            }
        }
        Ok(output)
    }

    /// Number of whole bytes left that have not been touched yet
    pub fn bytes_remaining(&self) -> usize {
        self.buffer.len() - self.buffer_index
    }
}
