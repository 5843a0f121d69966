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

    /// a table or section tag is missing, even after deciphering
    #[error("expected the {expected:?} tag")]
    BadSignature {
        /// tag that was expected at this position
        expected: String,
    },

    /// the stream ends before a table, heap or member does
    #[error("data ends before the declared table or member")]
    TruncatedInput,

    /// an offset inside a table points outside of its region
    #[error("corrupt table: {0}")]
    CorruptStream(String),

    /// unknown storage class or value type in a column schema
    #[error("unsupported column encoding {flags:#04x} in column {column}")]
    UnsupportedEncoding {
        /// raw schema byte
        flags: u8,
        /// index of the column in the schema
        column: usize,
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
    pub(crate) fn bad_signature(expected: &[u8]) -> Self {
        Error::BadSignature {
            expected: String::from_utf8_lossy(expected).into_owned(),
        }
    }

    /// Maps reader failures, so that running off the end is reported as truncation
    ///
    /// Field errors of derived readers arrive wrapped in a backtrace, so the check looks through it.
    pub(crate) fn from_read(error: binrw::Error) -> Self {
        if error.is_eof() {
            Error::TruncatedInput
        } else {
            Error::BinRWError(error)
        }
    }
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
