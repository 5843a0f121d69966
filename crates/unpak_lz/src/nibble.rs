//! Control-byte LZ whose token shape is chosen by the high bits of each control byte.
//!
//! | Control      | Token                                                             |
//! |--------------|-------------------------------------------------------------------|
//! | `0xxx xxxx`  | `x + 1` raw bytes follow                                          |
//! | `10xx xxxx`  | reference of `x + 3` bytes, big-endian 16-bit distance minus 1    |
//! | `110x xxxx`  | reference of `x + 2` bytes reusing the previous distance          |
//! | `1110 xxxx`  | `x + 3` copies of the following byte                              |
//! | `1111 1111`  | end of stream                                                     |
//!
//! The remaining `1111` patterns are not produced by any known encoder.

use crate::{
    error::{Error, Result},
    stream::{Input, Output},
};

const END_OF_STREAM: u8 = 0xFF;

/// Decodes a nibble LZ payload (the data following the 8-byte header)
pub fn decompress(input: &[u8], declared_len: usize) -> Result<Vec<u8>> {
    let mut output = Output::new(declared_len)?;
    let mut input = Input::new(input);
    let mut previous_distance: Option<usize> = None;

    while !output.is_full() {
        let control = input.read_u8()?;
        match control {
            0x00..=0x7F => {
                for _ in 0..=control {
                    if output.is_full() {
                        break;
                    }
                    output.push(input.read_u8()?);
                }
            }
            0x80..=0xBF => {
                let length = usize::from(control & 0x3F) + 3;
                let distance = usize::from(input.read_u16_be()?) + 1;
                previous_distance = Some(distance);
                output.copy_back(distance, length)?;
            }
            0xC0..=0xDF => {
                let length = usize::from(control & 0x1F) + 2;
                let distance = previous_distance.ok_or_else(|| {
                    Error::CorruptStream("repeated reference without a previous distance".into())
                })?;
                output.copy_back(distance, length)?;
            }
            0xE0..=0xEF => {
                let value = input.read_u8()?;
                output.fill(value, usize::from(control & 0x0F) + 3);
            }
            END_OF_STREAM => {
                return Err(Error::CorruptStream(format!(
                    "end of stream after {} of {declared_len} bytes",
                    output.position()
                )));
            }
            _ => {
                return Err(Error::UnsupportedEncoding(format!(
                    "control byte {control:#04x}"
                )));
            }
        }
    }

    Ok(output.into_inner())
}
