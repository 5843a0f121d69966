//! This library decodes the byte-stream codecs used to compress assets in console and PC games.
//!
//! Every codec is a pure function with the same shape: it takes the compressed payload and the
//! size the surrounding container declared for the decoded data, and returns a freshly allocated
//! buffer. No codec keeps state between calls.
//!
//! ```
//! use unpak_lz::Codec;
//!
//! // one flag byte selecting eight literals
//! let input = [0x00, b'a', b's', b's', b'e', b't', b's', b'!', b'!'];
//! let output = Codec::Lz10.decompress(&input, 8)?;
//! assert_eq!(&output, b"assets!!");
//! # Ok::<(), unpak_lz::error::Error>(())
//! ```
//!
//! ## Codecs
//!
//! | Codec        | Shape                         | Flag order   | Token                                            |
//! |--------------|-------------------------------|--------------|--------------------------------------------------|
//! | `CriLayla`   | bit-packed LZ, read backwards | MSB first    | 1 bit selector, 13-bit distance, laddered length |
//! | `Lz10`       | byte-flag LZ                  | high to low  | 4-bit length + 3, 12-bit distance + 1            |
//! | `Lz11`       | byte-flag LZ                  | high to low  | 2, 3 or 4 byte reference, length up to 0x10110   |
//! | `Yaz0`       | byte-flag LZ                  | high to low  | set bit is a literal, 2 or 3 byte reference      |
//! | `Lzss`       | ring buffer LZ                | low to high  | 12-bit ring position, 4-bit length + 3           |
//! | `Rle`        | run-length                    | -            | 7-bit run or raw count                           |
//! | `EscapeRle`  | run-length with escape byte   | -            | `ESC n v`, `ESC ESC` for a literal escape        |
//! | `PairTable`  | byte-pair substitution        | -            | per-block pair table, stack expanded             |
//! | `Nibble`     | control-byte LZ               | -            | raw run, reference, repeat reference, fill       |
//! | `Zlib`       | deflate                       | -            | delegated to [`flate2`]                          |
//!
//! ## Safety of declared sizes
//!
//! The output buffer is allocated up front from the declared size, so every codec refuses sizes
//! above [`MAX_OUTPUT_SIZE`]. Tokens that would read before the start of the output are reported as
//! [`error::Error::CorruptStream`] instead of being clamped.

pub mod bits;
pub mod crilayla;
pub mod error;
pub mod escape;
pub mod lz10;
pub mod lz11;
pub mod lzss;
pub mod nibble;
pub mod pair;
pub mod rle;
pub mod yaz0;
pub mod zlib;

mod stream;

use std::fmt;

use tracing::instrument;

use crate::error::{Error, Result};

/// Largest output any codec will allocate
pub const MAX_OUTPUT_SIZE: usize = 1 << 30;

pub(crate) fn allocate(declared_len: usize) -> Result<Vec<u8>> {
    if declared_len > MAX_OUTPUT_SIZE {
        return Err(Error::OutputTooLarge {
            declared: declared_len,
            limit: MAX_OUTPUT_SIZE,
        });
    }
    Ok(vec![0u8; declared_len])
}

/// Identifies one of the supported decoders
///
/// The payload handed to [`Codec::decompress`] is the data that follows the container framing,
/// except for [`Codec::CriLayla`] which expects the complete stream including its 16-byte tag.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Codec {
    /// CRI Middleware's backwards bit-packed LZ
    CriLayla,
    /// Nintendo LZ77 type `0x10`
    Lz10,
    /// Nintendo LZ77 type `0x11`
    Lz11,
    /// Nintendo `Yaz0`
    Yaz0,
    /// Ring buffer LZSS with the `0xFEE` start position
    Lzss,
    /// Nintendo run-length type `0x30`
    Rle,
    /// Run-length with an in-band escape byte
    EscapeRle,
    /// Byte-pair substitution
    PairTable,
    /// Control-byte LZ with repeat references and fills
    Nibble,
    /// Zlib wrapped deflate
    Zlib,
}

impl Codec {
    /// Every codec, in a stable order
    pub const ALL: [Codec; 10] = [
        Codec::CriLayla,
        Codec::Lz10,
        Codec::Lz11,
        Codec::Yaz0,
        Codec::Lzss,
        Codec::Rle,
        Codec::EscapeRle,
        Codec::PairTable,
        Codec::Nibble,
        Codec::Zlib,
    ];

    /// Short lowercase name
    pub fn name(self) -> &'static str {
        match self {
            Codec::CriLayla => "crilayla",
            Codec::Lz10 => "lz10",
            Codec::Lz11 => "lz11",
            Codec::Yaz0 => "yaz0",
            Codec::Lzss => "lzss",
            Codec::Rle => "rle",
            Codec::EscapeRle => "escape-rle",
            Codec::PairTable => "pair-table",
            Codec::Nibble => "nibble",
            Codec::Zlib => "zlib",
        }
    }

    /// Decode `input` into a buffer sized from `declared_len`
    #[instrument(skip(input), fields(input_len = input.len()), err)]
    pub fn decompress(self, input: &[u8], declared_len: usize) -> Result<Vec<u8>> {
        match self {
            Codec::CriLayla => crilayla::decompress(input, declared_len),
            Codec::Lz10 => lz10::decompress(input, declared_len),
            Codec::Lz11 => lz11::decompress(input, declared_len),
            Codec::Yaz0 => yaz0::decompress(input, declared_len),
            Codec::Lzss => lzss::decompress(input, declared_len),
            Codec::Rle => rle::decompress(input, declared_len),
            Codec::EscapeRle => escape::decompress(input, declared_len),
            Codec::PairTable => pair::decompress(input, declared_len),
            Codec::Nibble => nibble::decompress(input, declared_len),
            Codec::Zlib => zlib::decompress(input, declared_len),
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
