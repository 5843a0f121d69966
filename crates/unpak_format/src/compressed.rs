//! Framings of the standalone compression formats.
//!
//! Every opener reads the header of its format, checks the declared size against
//! [`OpenOptions::max_output_size`] and hands the rest of the stream to the matching codec.
//!
//! | Format     | Header                                                 |
//! |------------|--------------------------------------------------------|
//! | CRILAYLA   | decoded by the codec itself, see [`unpak_lz::crilayla`] |
//! | Yaz0       | `Yaz0`, big-endian u32 size, 8 reserved bytes          |
//! | LZ77       | `LZ77`, then a Nintendo header                         |
//! | LZ10/LZ11  | type byte, u24 size, u32 size when the u24 is zero     |
//! | RLE        | as LZ10 with type `0x30`                               |
//! | LZSS       | `LZSS`, u32 size, u32 compressed size                  |
//! | ERLE/BPE1/NLZ0 | tag, u32 size                                      |
//! | Zlib       | none, the output is capped by the options              |

use std::io::Read;

use binrw::{helpers::read_u24, BinRead};
use tracing::{debug, instrument};
use unpak_lz::{
    crilayla::{CriLaylaHeader, HEADER_LEN},
    Codec,
};

use crate::{
    catalog::{Opened, ReadSeek},
    error::{Error, Result},
    OpenOptions,
};

/// Header shared by Nintendo's LZ10, LZ11 and RLE streams
#[derive(BinRead, Debug, Copy, Clone, PartialEq, Eq)]
#[br(little)]
pub struct NintendoHeader {
    /// Compression type: `0x10`, `0x11` or `0x30`
    pub kind: u8,
    #[br(parse_with = read_u24)]
    short_size: u32,
    #[br(if(short_size == 0))]
    extended_size: Option<u32>,
}

impl NintendoHeader {
    /// Decoded size
    pub fn size(&self) -> u64 {
        self.extended_size.unwrap_or(self.short_size) as u64
    }
}

#[derive(BinRead, Debug, Copy, Clone, PartialEq, Eq)]
#[br(big, magic = b"Yaz0")]
pub struct Yaz0Header {
    #[br(pad_after = 8)]
    pub size: u32,
}

/// Nintendo header behind an extra `LZ77` tag, as found on Wii discs
#[derive(BinRead, Debug, Copy, Clone, PartialEq, Eq)]
#[br(little, magic = b"LZ77")]
pub struct Lz77WiiHeader {
    pub inner: NintendoHeader,
}

#[derive(BinRead, Debug, Copy, Clone, PartialEq, Eq)]
#[br(little, magic = b"LZSS")]
pub struct LzssHeader {
    pub size: u32,
    pub compressed_size: u32,
}

/// A four byte tag followed by the decoded size
#[derive(BinRead, Debug, Copy, Clone, PartialEq, Eq)]
#[br(little)]
pub struct TaggedHeader {
    pub tag: [u8; 4],
    pub size: u32,
}

impl TaggedHeader {
    fn read_expecting(reader: &mut dyn ReadSeek, tag: &[u8; 4]) -> Result<Self> {
        let header = Self::read(&mut &mut *reader).map_err(Error::from_header)?;
        if &header.tag != tag {
            return Err(Error::BadSignature);
        }
        Ok(header)
    }
}

fn rest(reader: &mut dyn ReadSeek) -> Result<Vec<u8>> {
    let mut payload = Vec::new();
    reader.read_to_end(&mut payload)?;
    Ok(payload)
}

fn decode(codec: Codec, payload: &[u8], declared: u64, options: &OpenOptions) -> Result<Opened> {
    let declared = options.check_size(declared)?;
    debug!(%codec, declared, payload = payload.len(), "decoding");
    Ok(Opened::Decoded(codec.decompress(payload, declared)?))
}

fn open_nintendo(
    reader: &mut dyn ReadSeek,
    options: &OpenOptions,
    codec: Codec,
    kind: u8,
) -> Result<Opened> {
    let header = NintendoHeader::read(&mut &mut *reader).map_err(Error::from_header)?;
    if header.kind != kind {
        return Err(Error::BadSignature);
    }
    decode(codec, &rest(reader)?, header.size(), options)
}

#[instrument(skip_all, err)]
pub(crate) fn open_crilayla(reader: &mut dyn ReadSeek, options: &OpenOptions) -> Result<Opened> {
    let data = rest(reader)?;
    let header = CriLaylaHeader::parse(&data)?;
    let body = header.uncompressed_size as u64;
    // the verbatim header is allocated on top of the body
    options.check_size(body + HEADER_LEN as u64)?;
    decode(Codec::CriLayla, &data, body, options)
}

#[instrument(skip_all, err)]
pub(crate) fn open_yaz0(reader: &mut dyn ReadSeek, options: &OpenOptions) -> Result<Opened> {
    let header = Yaz0Header::read(&mut &mut *reader).map_err(Error::from_header)?;
    decode(Codec::Yaz0, &rest(reader)?, header.size as u64, options)
}

#[instrument(skip_all, err)]
pub(crate) fn open_lz77_wii(reader: &mut dyn ReadSeek, options: &OpenOptions) -> Result<Opened> {
    let header = Lz77WiiHeader::read(&mut &mut *reader).map_err(Error::from_header)?;
    if header.inner.kind != 0x10 {
        return Err(Error::BadSignature);
    }
    decode(Codec::Lz10, &rest(reader)?, header.inner.size(), options)
}

#[instrument(skip_all, err)]
pub(crate) fn open_lz10(reader: &mut dyn ReadSeek, options: &OpenOptions) -> Result<Opened> {
    open_nintendo(reader, options, Codec::Lz10, 0x10)
}

#[instrument(skip_all, err)]
pub(crate) fn open_lz11(reader: &mut dyn ReadSeek, options: &OpenOptions) -> Result<Opened> {
    open_nintendo(reader, options, Codec::Lz11, 0x11)
}

#[instrument(skip_all, err)]
pub(crate) fn open_rle(reader: &mut dyn ReadSeek, options: &OpenOptions) -> Result<Opened> {
    open_nintendo(reader, options, Codec::Rle, 0x30)
}

#[instrument(skip_all, err)]
pub(crate) fn open_lzss(reader: &mut dyn ReadSeek, options: &OpenOptions) -> Result<Opened> {
    let header = LzssHeader::read(&mut &mut *reader).map_err(Error::from_header)?;
    let mut payload = Vec::new();
    (&mut *reader)
        .take(header.compressed_size as u64)
        .read_to_end(&mut payload)?;
    if payload.len() < header.compressed_size as usize {
        debug!(
            stored = payload.len(),
            declared = header.compressed_size,
            "compressed data is shorter than declared"
        );
    }
    decode(Codec::Lzss, &payload, header.size as u64, options)
}

#[instrument(skip_all, err)]
pub(crate) fn open_escape_rle(reader: &mut dyn ReadSeek, options: &OpenOptions) -> Result<Opened> {
    let header = TaggedHeader::read_expecting(reader, b"ERLE")?;
    decode(Codec::EscapeRle, &rest(reader)?, header.size as u64, options)
}

#[instrument(skip_all, err)]
pub(crate) fn open_pair_table(reader: &mut dyn ReadSeek, options: &OpenOptions) -> Result<Opened> {
    let header = TaggedHeader::read_expecting(reader, b"BPE1")?;
    decode(Codec::PairTable, &rest(reader)?, header.size as u64, options)
}

#[instrument(skip_all, err)]
pub(crate) fn open_nibble(reader: &mut dyn ReadSeek, options: &OpenOptions) -> Result<Opened> {
    let header = TaggedHeader::read_expecting(reader, b"NLZ0")?;
    decode(Codec::Nibble, &rest(reader)?, header.size as u64, options)
}

#[instrument(skip_all, err)]
pub(crate) fn open_zlib(reader: &mut dyn ReadSeek, options: &OpenOptions) -> Result<Opened> {
    decode(Codec::Zlib, &rest(reader)?, options.max_output_size, options)
}
