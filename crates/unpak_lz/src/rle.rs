//! Nintendo run-length, compression type `0x30`.
//!
//! A control byte with bit 7 set repeats the following byte `(c & 0x7F) + 3` times; otherwise
//! `(c & 0x7F) + 1` raw bytes follow.

use crate::{
    error::Result,
    stream::{Input, Output},
};

/// Decodes an RLE payload (the data following the 4-byte type and size header)
pub fn decompress(input: &[u8], declared_len: usize) -> Result<Vec<u8>> {
    let mut output = Output::new(declared_len)?;
    let mut input = Input::new(input);

    while !output.is_full() {
        let control = input.read_u8()?;
        let count = usize::from(control & 0x7F);
        if control & 0x80 != 0 {
            let value = input.read_u8()?;
            output.fill(value, count + 3);
        } else {
            for _ in 0..=count {
                if output.is_full() {
                    break;
                }
                output.push(input.read_u8()?);
            }
        }
    }

    Ok(output.into_inner())
}
