//! Sub-byte reader used by the bit-packed codecs.
//!
//! Both the byte stepping direction and the order in which bits leave a byte are explicit
//! parameters. CRILAYLA, for instance, consumes its payload from the last byte towards the first
//! and takes the most significant bit of each byte first.

use crate::error::{Error, Result};

/// Which way the cursor steps once a byte has been used up
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Direction {
    /// From the first byte towards the last
    Forward,
    /// From the last byte towards the first
    Backward,
}

/// Which end of a byte is consumed first
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BitOrder {
    /// Bit 7 first; multi-bit reads are assembled big-endian
    MsbFirst,
    /// Bit 0 first; multi-bit reads are assembled little-endian
    LsbFirst,
}

/// Bit cursor bounded to a byte slice
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    next: usize,
    remaining: usize,
    direction: Direction,
    order: BitOrder,
    pool: u8,
    bits_left: u32,
}

impl<'a> BitReader<'a> {
    /// Creates a reader positioned at the first byte to consume for `direction`
    pub fn new(data: &'a [u8], direction: Direction, order: BitOrder) -> Self {
        let next = match direction {
            Direction::Forward => 0,
            Direction::Backward => data.len().saturating_sub(1),
        };
        Self {
            data,
            next,
            remaining: data.len(),
            direction,
            order,
            pool: 0,
            bits_left: 0,
        }
    }

    /// Direction the reader was created with
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Bit order the reader was created with
    pub fn order(&self) -> BitOrder {
        self.order
    }

    /// Whole bytes that have not been loaded yet
    pub fn bytes_remaining(&self) -> usize {
        self.remaining
    }

    fn refill(&mut self) -> Result<()> {
        if self.remaining == 0 {
            return Err(Error::TruncatedInput);
        }
        self.pool = self.data[self.next];
        self.bits_left = 8;
        self.remaining -= 1;
        match self.direction {
            Direction::Forward => self.next += 1,
            Direction::Backward => self.next = self.next.saturating_sub(1),
        }
        Ok(())
    }

    /// Reads `count` bits, at most 32
    pub fn read_bits(&mut self, count: u32) -> Result<u32> {
        debug_assert!(count <= 32);

        let mut value = 0u32;
        let mut produced = 0u32;
        while produced < count {
            if self.bits_left == 0 {
                self.refill()?;
            }

            let take = (count - produced).min(self.bits_left);
            let mask = (1u32 << take) - 1;
            let pool = u32::from(self.pool);
            match self.order {
                BitOrder::MsbFirst => {
                    let bits = (pool >> (self.bits_left - take)) & mask;
                    value = (value << take) | bits;
                }
                BitOrder::LsbFirst => {
                    let bits = (pool >> (8 - self.bits_left)) & mask;
                    value |= bits << produced;
                }
            }

            self.bits_left -= take;
            produced += take;
        }
        Ok(value)
    }

    /// Reads a single bit
    pub fn read_bit(&mut self) -> Result<bool> {
        Ok(self.read_bits(1)? != 0)
    }
}
