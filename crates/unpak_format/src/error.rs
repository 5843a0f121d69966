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

    /// Transparent wrapper for codec failures
    #[error(transparent)]
    #[diagnostic(transparent)]
    Codec(#[from] unpak_lz::error::Error),

    /// Transparent wrapper for table and CPK failures
    #[error(transparent)]
    #[diagnostic(transparent)]
    Cpk(#[from] unpak_cpk::error::Error),

    /// no catalogued format matches the stream
    #[error("no known format matches this file")]
    #[diagnostic(help("`unpak identify` lists the formats that are recognized"))]
    UnrecognizedFormat,

    /// the expected tag is missing from a header
    #[error("stream does not carry the expected signature")]
    BadSignature,

    /// the stream ends before a header, directory or member does
    #[error("data ends before the declared header or member")]
    TruncatedInput,

    /// a directory entry contradicts the rest of the container
    #[error("corrupt container: {0}")]
    CorruptStream(String),

    /// a declared size is larger than the configured limit
    #[error("declared output of {declared} bytes exceeds the limit of {limit} bytes")]
    OutputTooLarge {
        /// size requested by the stream
        declared: u64,
        /// limit from [`crate::OpenOptions::max_output_size`]
        limit: u64,
    },

    /// unable to find requested entry
    #[error("unable to find requested entry")]
    EntryNotFound(#[from] EntryNotFoundError),
}

/// Error type to provide further information when an entry has not been found
#[derive(Error, Diagnostic, Debug)]
#[error("unable to find requested entry")]
pub enum EntryNotFoundError {
    /// at index {0}
    #[error("at index {0}")]
    Index(usize),

    /// by name {0}
    #[error("by name {0}")]
    Name(String),
}

impl Error {
    /// Maps header parsing failures onto the error taxonomy
    pub(crate) fn from_header(error: binrw::Error) -> Self {
        if error.is_eof() {
            return Error::TruncatedInput;
        }
        match error.root_cause() {
            binrw::Error::BadMagic { .. } => Error::BadSignature,
            _ => Error::BinRWError(error),
        }
    }

    /// Reports running out of data as [`Error::TruncatedInput`]
    pub(crate) fn from_io(error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::UnexpectedEof => Error::TruncatedInput,
            _ => Error::IOError(error),
        }
    }
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
