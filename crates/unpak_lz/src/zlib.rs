//! Zlib wrapped deflate streams.

use std::io::{self, Read};

use flate2::read::ZlibDecoder;

use crate::error::{Error, Result};

fn inflate_error(error: io::Error) -> Error {
    match error.kind() {
        io::ErrorKind::UnexpectedEof => Error::TruncatedInput,
        io::ErrorKind::InvalidInput | io::ErrorKind::InvalidData => {
            Error::CorruptStream(error.to_string())
        }
        _ => Error::IOError(error),
    }
}

/// Inflates a zlib stream, stopping after `declared_len` bytes
///
/// The output is not padded: a stream that ends early yields a shorter buffer.
pub fn decompress(input: &[u8], declared_len: usize) -> Result<Vec<u8>> {
    if declared_len > crate::MAX_OUTPUT_SIZE {
        return Err(Error::OutputTooLarge {
            declared: declared_len,
            limit: crate::MAX_OUTPUT_SIZE,
        });
    }

    let mut output = Vec::new();
    ZlibDecoder::new(input)
        .take(declared_len as u64)
        .read_to_end(&mut output)
        .map_err(inflate_error)?;
    Ok(output)
}
