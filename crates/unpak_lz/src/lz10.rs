//! Nintendo LZ77, compression type `0x10`.
//!
//! Each flag byte governs the next eight tokens, most significant bit first. A clear bit is a
//! literal byte, a set bit a big-endian 16-bit reference: the high nibble is the length minus 3,
//! the low 12 bits the distance minus 1.
//!
//! Decoding stops once the declared size is reached, even in the middle of a reference.

use crate::{
    error::Result,
    stream::{Input, Output},
};

const MIN_LENGTH: usize = 3;

/// Decodes an LZ10 payload (the data following the 4-byte type and size header)
pub fn decompress(input: &[u8], declared_len: usize) -> Result<Vec<u8>> {
    let mut output = Output::new(declared_len)?;
    let mut input = Input::new(input);

    while !output.is_full() {
        let flags = input.read_u8()?;
        for bit in (0..8).rev() {
            if output.is_full() {
                break;
            }

            if flags & (1 << bit) != 0 {
                let token = input.read_u16_be()?;
                let length = usize::from(token >> 12) + MIN_LENGTH;
                let distance = usize::from(token & 0x0FFF) + 1;
                output.copy_back(distance, length)?;
            } else {
                output.push(input.read_u8()?);
            }
        }
    }

    Ok(output.into_inner())
}
