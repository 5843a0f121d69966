//! Nintendo `Yaz0`.
//!
//! Flag bytes are read most significant bit first, but unlike [`crate::lz10`] a set bit marks a
//! literal. A reference is two bytes `NDDD DDDD DDDD` with a 12-bit distance minus 1; a zero
//! nibble `N` means a third byte follows holding the length minus `0x12`, otherwise the length is
//! `N + 2`.

use crate::{
    error::Result,
    stream::{Input, Output},
};

/// Decodes a Yaz0 payload (the data following the 16-byte header)
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
                output.push(input.read_u8()?);
                continue;
            }

            let b1 = usize::from(input.read_u8()?);
            let b2 = usize::from(input.read_u8()?);
            let distance = ((b1 & 0x0F) << 8 | b2) + 1;
            let length = match b1 >> 4 {
                0 => usize::from(input.read_u8()?) + 0x12,
                n => n + 2,
            };
            output.copy_back(distance, length)?;
        }
    }

    Ok(output.into_inner())
}
