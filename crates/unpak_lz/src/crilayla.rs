//! CRILAYLA, the codec CRI Middleware uses inside CPK archives.
//!
//! | Offset (bytes)        | Field          | Description                                       |
//! |-----------------------|----------------|---------------------------------------------------|
//! | 0x0000                | Tag            | 8 bytes: `CRILAYLA`                               |
//! | 0x0008                | Body size      | 4 bytes: size of the decoded data after the header |
//! | 0x000C                | Header offset  | 4 bytes: offset of the raw header, minus 0x10     |
//! | 0x0010                | Bit stream     | consumed from its last byte towards the first     |
//! | header offset + 0x10  | Raw header     | 0x100 bytes copied to the start of the output     |
//!
//! Tokens are read most significant bit first. A clear selector bit is followed by an 8-bit
//! literal; a set bit by a 13-bit distance and a length that starts at 3 and grows through fields
//! of 2, 3, 5 and 8 bits, then any number of further 8-bit fields, for as long as each field is
//! saturated.
//!
//! Output is produced from the end of the buffer towards the raw header. Distances are measured
//! in that same reversed frame, so the finished buffer needs no reordering.

use std::io::Cursor;

use binrw::BinRead;
use tracing::debug;

use crate::{
    bits::{BitOrder, BitReader, Direction},
    error::{Error, Result},
};

/// Size of the uncompressed header placed in front of the decoded body
pub const HEADER_LEN: usize = 0x100;

const PREFIX_LEN: usize = 0x10;
const DISTANCE_BITS: u32 = 13;
const MIN_DISTANCE: usize = 3;
const MIN_LENGTH: usize = 3;
const LENGTH_LADDER: [u32; 4] = [2, 3, 5, 8];

/// Fixed prefix of a CRILAYLA stream
#[derive(BinRead, Debug, Copy, Clone, PartialEq, Eq)]
#[br(magic = b"CRILAYLA", little)]
pub struct CriLaylaHeader {
    /// Size of the decoded body, not counting the raw header
    pub uncompressed_size: u32,

    /// Position of the raw header relative to the end of this prefix
    pub header_offset: u32,
}

impl CriLaylaHeader {
    /// Parses the prefix of `input`
    pub fn parse(input: &[u8]) -> Result<Self> {
        CriLaylaHeader::read(&mut Cursor::new(input)).map_err(Error::from_header)
    }
}

/// Decodes a complete CRILAYLA stream
///
/// `declared_len` is the body size the container expects and must agree with the stream's own
/// header. The returned buffer is `declared_len + HEADER_LEN` bytes long.
pub fn decompress(input: &[u8], declared_len: usize) -> Result<Vec<u8>> {
    let header = CriLaylaHeader::parse(input)?;
    let body_len = header.uncompressed_size as usize;
    if body_len != declared_len {
        return Err(Error::CorruptStream(format!(
            "stream declares {body_len} bytes but {declared_len} were expected"
        )));
    }

    let raw_start = (header.header_offset as usize)
        .checked_add(PREFIX_LEN)
        .ok_or(Error::TruncatedInput)?;
    let raw_header = input
        .get(raw_start..raw_start.saturating_add(HEADER_LEN))
        .ok_or(Error::TruncatedInput)?;
    let payload = input
        .get(PREFIX_LEN..input.len().saturating_sub(HEADER_LEN))
        .ok_or(Error::TruncatedInput)?;

    let total = body_len
        .checked_add(HEADER_LEN)
        .ok_or(Error::OutputTooLarge {
            declared: body_len,
            limit: crate::MAX_OUTPUT_SIZE,
        })?;
    let mut output = crate::allocate(total)?;
    output[..HEADER_LEN].copy_from_slice(raw_header);

    debug!(body_len, payload_len = payload.len(), "decoding crilayla body");

    let mut bits = BitReader::new(payload, Direction::Backward, BitOrder::MsbFirst);
    let last = total - 1;
    let mut produced = 0usize;
    while produced < body_len {
        if bits.read_bit()? {
            let distance = bits.read_bits(DISTANCE_BITS)? as usize + MIN_DISTANCE;
            let length = read_length(&mut bits)?;

            let mut source = last - produced + distance;
            if source > last {
                return Err(Error::CorruptStream(format!(
                    "back-reference distance {distance} after {produced} bytes"
                )));
            }
            if length > body_len - produced {
                return Err(Error::CorruptStream(format!(
                    "back-reference of {length} bytes overruns the body after {produced} bytes"
                )));
            }

            for _ in 0..length {
                output[last - produced] = output[source];
                source -= 1;
                produced += 1;
            }
        } else {
            output[last - produced] = bits.read_bits(8)? as u8;
            produced += 1;
        }
    }

    Ok(output)
}

fn read_length(bits: &mut BitReader<'_>) -> Result<usize> {
    let mut length = MIN_LENGTH;
    for width in LENGTH_LADDER {
        let level = bits.read_bits(width)?;
        length += level as usize;
        if level != (1 << width) - 1 {
            return Ok(length);
        }
    }

    loop {
        let level = bits.read_bits(8)?;
        length += level as usize;
        if level != 0xFF {
            return Ok(length);
        }
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::{decompress, CriLaylaHeader, HEADER_LEN};
    use crate::error::{Error, Result};

    fn raw_header() -> Vec<u8> {
        (0..=255u8).collect()
    }

    fn frame(payload: &[u8], body_len: u32) -> Vec<u8> {
        let mut stream = b"CRILAYLA".to_vec();
        stream.extend_from_slice(&body_len.to_le_bytes());
        stream.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        stream.extend_from_slice(payload);
        stream.extend_from_slice(&raw_header());
        stream
    }

    #[test]
    fn read_header() -> Result<()> {
        let stream = frame(&[], 0);
        assert_eq!(
            CriLaylaHeader::parse(&stream)?,
            CriLaylaHeader {
                uncompressed_size: 0,
                header_offset: 0
            }
        );
        Ok(())
    }

    #[test]
    fn header_only_stream_yields_raw_header() -> Result<()> {
        let output = decompress(&frame(&[], 0), 0)?;
        assert_eq!(output.len(), HEADER_LEN);
        assert_eq!(output, raw_header());
        Ok(())
    }

    #[test]
    fn literals_only() -> Result<()> {
        let output = decompress(&frame(&[0x10, 0x46, 0xCC, 0x18, 0x32], 4), 4)?;
        assert_eq!(&output[..HEADER_LEN], raw_header().as_slice());
        assert_eq!(&output[HEADER_LEN..], b"abcd");
        Ok(())
    }

    #[test]
    fn back_reference_in_reversed_frame() -> Result<()> {
        let output = decompress(&frame(&[0x60, 0x00, 0x30, 0x88, 0x90, 0x21], 9), 9)?;
        assert_eq!(&output[HEADER_LEN..], b"ABCABCABC");
        Ok(())
    }

    #[test]
    fn length_ladder_continues_past_fixed_fields() -> Result<()> {
        #[rustfmt::skip]
        let payload = [0x40, 0xEC, 0xFF, 0x7F, 0x00, 0x50, 0x8F, 0x1E, 0x3D];
        let output = decompress(&frame(&payload, 400), 400)?;
        assert_eq!(&output[HEADER_LEN..], vec![b'z'; 400].as_slice());
        Ok(())
    }

    #[test]
    fn size_disagreement_is_corrupt() {
        let stream = frame(&[0x10, 0x46, 0xCC, 0x18, 0x32], 4);
        assert!(matches!(decompress(&stream, 3), Err(Error::CorruptStream(_))));
    }

    #[test]
    fn distance_beyond_output_is_corrupt() {
        // selector set, distance field 0: the first token may not reference anything
        let stream = frame(&[0x00, 0x00, 0x80], 4);
        assert!(matches!(decompress(&stream, 4), Err(Error::CorruptStream(_))));
    }

    #[test]
    fn exhausted_payload_is_truncation() {
        let stream = frame(&[0x32], 4);
        assert!(matches!(decompress(&stream, 4), Err(Error::TruncatedInput)));
    }

    #[test]
    fn truncated_prefix() {
        let stream = frame(&[], 0);
        for len in [0, 8, 11, 15] {
            assert!(
                matches!(CriLaylaHeader::parse(&stream[..len]), Err(Error::TruncatedInput)),
                "prefix of {len} bytes"
            );
        }
    }

    #[test]
    fn wrong_tag_is_bad_signature() {
        let mut stream = frame(&[], 0);
        stream[0] = b'X';
        assert!(matches!(decompress(&stream, 0), Err(Error::BadSignature)));
    }
}
