//! Bounds-checked byte cursors shared by the byte oriented codecs.

use byteorder::{BigEndian, ByteOrder};

use crate::error::{Error, Result};

/// Forward reader over a compressed payload
pub(crate) struct Input<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Input<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Next byte, or `None` once the payload is exhausted
    pub fn try_u8(&mut self) -> Option<u8> {
        let byte = self.data.get(self.pos).copied()?;
        self.pos += 1;
        Some(byte)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.try_u8().ok_or(Error::TruncatedInput)
    }

    pub fn read_u16_be(&mut self) -> Result<u16> {
        let bytes = self
            .data
            .get(self.pos..self.pos + 2)
            .ok_or(Error::TruncatedInput)?;
        self.pos += 2;
        Ok(BigEndian::read_u16(bytes))
    }
}

/// Output buffer pre-sized to the declared length
///
/// Writes past the declared length are dropped, which gives the truncating codecs their
/// behavior. Codecs that must reject overruns use [`Output::push_strict`].
pub(crate) struct Output {
    buf: Vec<u8>,
    pos: usize,
}

impl Output {
    pub fn new(declared_len: usize) -> Result<Self> {
        Ok(Self {
            buf: crate::allocate(declared_len)?,
            pos: 0,
        })
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn is_full(&self) -> bool {
        self.pos >= self.buf.len()
    }

    pub fn push(&mut self, byte: u8) {
        if let Some(slot) = self.buf.get_mut(self.pos) {
            *slot = byte;
            self.pos += 1;
        }
    }

    pub fn push_strict(&mut self, byte: u8) -> Result<()> {
        if self.is_full() {
            return Err(Error::CorruptStream(format!(
                "decoded data exceeds the declared {} bytes",
                self.buf.len()
            )));
        }
        self.push(byte);
        Ok(())
    }

    pub fn fill(&mut self, byte: u8, len: usize) {
        for _ in 0..len {
            if self.is_full() {
                break;
            }
            self.push(byte);
        }
    }

    /// Copies `len` bytes starting `distance` bytes behind the write position
    ///
    /// The copy runs byte by byte so that overlapping references repeat the pattern.
    pub fn copy_back(&mut self, distance: usize, len: usize) -> Result<()> {
        if distance == 0 || distance > self.pos {
            return Err(Error::CorruptStream(format!(
                "back-reference distance {distance} at output position {}",
                self.pos
            )));
        }
        for _ in 0..len {
            if self.is_full() {
                break;
            }
            let byte = self.buf[self.pos - distance];
            self.push(byte);
        }
        Ok(())
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

#[cfg(test)]
mod test {
    use super::{Input, Output};
    use crate::error::Error;

    #[test]
    fn input_reports_truncation() {
        let mut input = Input::new(&[0x12]);
        assert!(matches!(input.read_u16_be(), Err(Error::TruncatedInput)));
        assert_eq!(input.read_u8().ok(), Some(0x12));
        assert!(input.is_empty());
        assert_eq!(input.try_u8(), None);
    }

    #[test]
    fn overlapping_copy_repeats_pattern() {
        let mut output = Output::new(7).unwrap();
        output.push(b'a');
        output.push(b'b');
        output.copy_back(2, 5).unwrap();
        assert_eq!(output.into_inner(), b"abababa");
    }

    #[test]
    fn copy_before_start_is_corrupt() {
        let mut output = Output::new(4).unwrap();
        output.push(b'a');
        assert!(matches!(
            output.copy_back(2, 1),
            Err(Error::CorruptStream(_))
        ));
        assert!(matches!(
            output.copy_back(0, 1),
            Err(Error::CorruptStream(_))
        ));
    }

    #[test]
    fn strict_push_rejects_overrun() {
        let mut output = Output::new(1).unwrap();
        output.push_strict(1).unwrap();
        assert!(output.push_strict(2).is_err());
    }
}
