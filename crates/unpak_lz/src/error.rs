//! Error types that can be emitted from this library

use miette::Diagnostic;
use thiserror::Error;

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent wrapper for [`std::io::Error`]
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// Transparent wrapper for [`binrw::Error`]
    #[error(transparent)]
    BinRWError(#[from] binrw::Error),

    /// the stream does not start with the expected tag
    #[error("stream does not carry the expected signature")]
    BadSignature,

    /// the input ran out before the declared output was produced
    #[error("stream ended before the declared output was produced")]
    TruncatedInput,

    /// a token points outside of the output buffer or the sizes disagree
    #[error("corrupt stream: {0}")]
    CorruptStream(String),

    /// a control pattern that no known variant of the codec emits
    #[error("unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    /// the declared output size is larger than this library will allocate
    #[error("declared output of {declared} bytes exceeds the limit of {limit} bytes")]
    OutputTooLarge {
        /// size requested by the stream
        declared: usize,
        /// upper bound enforced by [`crate::MAX_OUTPUT_SIZE`]
        limit: usize,
    },
}

impl Error {
    /// Maps header parsing failures onto the codec taxonomy
    pub(crate) fn from_header(error: binrw::Error) -> Self {
        if error.is_eof() {
            return Error::TruncatedInput;
        }
        match error.root_cause() {
            binrw::Error::BadMagic { .. } => Error::BadSignature,
            _ => Error::BinRWError(error),
        }
    }
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
