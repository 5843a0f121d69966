//! Ring buffer LZSS.
//!
//! The decoder keeps a 4096-byte window, zero filled, whose write cursor starts at `0xFEE`.
//! Flag bits are consumed least significant bit first; a set bit is a literal. A reference is two
//! bytes `PPPP PPPP | PPPP LLLL`: the low byte and the high nibble of the second byte form a
//! 12-bit absolute window position, the low nibble is the length minus 3. Window positions wrap.
//!
//! The format carries no end marker. Running out of input ends decoding quietly and the rest of
//! the declared buffer stays zeroed.

use crate::{
    error::Result,
    stream::{Input, Output},
};

const RING_SIZE: usize = 4096;
const RING_MASK: usize = RING_SIZE - 1;
const RING_START: usize = 0xFEE;
const MIN_LENGTH: usize = 3;

struct Ring {
    window: [u8; RING_SIZE],
    cursor: usize,
}

impl Ring {
    fn new() -> Self {
        Self {
            window: [0u8; RING_SIZE],
            cursor: RING_START,
        }
    }

    fn get(&self, position: usize) -> u8 {
        self.window[position & RING_MASK]
    }

    fn put(&mut self, byte: u8) {
        self.window[self.cursor] = byte;
        self.cursor = (self.cursor + 1) & RING_MASK;
    }
}

/// Decodes an LZSS payload (the data following the 12-byte header)
pub fn decompress(input: &[u8], declared_len: usize) -> Result<Vec<u8>> {
    let mut output = Output::new(declared_len)?;
    let mut input = Input::new(input);
    let mut ring = Ring::new();

    // the high byte counts how many flag bits are left
    let mut flags = 0u32;
    while !output.is_full() {
        flags >>= 1;
        if flags & 0x100 == 0 {
            let Some(byte) = input.try_u8() else { break };
            flags = u32::from(byte) | 0xFF00;
        }

        if flags & 1 != 0 {
            let Some(byte) = input.try_u8() else { break };
            output.push(byte);
            ring.put(byte);
            continue;
        }

        let Some(low) = input.try_u8() else { break };
        let Some(high) = input.try_u8() else { break };
        let position = usize::from(low) | usize::from(high & 0xF0) << 4;
        let length = usize::from(high & 0x0F) + MIN_LENGTH;
        for k in 0..length {
            if output.is_full() {
                break;
            }
            let byte = ring.get(position + k);
            output.push(byte);
            ring.put(byte);
        }
    }

    Ok(output.into_inner())
}
