//! This library reads the `@UTF` tables of CRI Middleware and the **CPK** archives built from them.
//!
//! ## @UTF tables
//!
//! A table is a self-describing, column typed record set. Integers are big-endian and the region
//! offsets count from byte 8 of the packet.
//!
//! | Offset (bytes) | Field          | Description                                        |
//! |----------------|----------------|----------------------------------------------------|
//! | 0x0000         | Tag            | 4 bytes: `@UTF`                                    |
//! | 0x0004         | Table size     | 4 bytes: size of the packet after this field       |
//! | 0x0008         | Rows offset    | 4 bytes                                            |
//! | 0x000C         | Strings offset | 4 bytes: null terminated string heap               |
//! | 0x0010         | Data offset    | 4 bytes: blob heap                                 |
//! | 0x0014         | Table name     | 4 bytes: string heap reference                     |
//! | 0x0018         | Columns        | 2 bytes                                            |
//! | 0x001A         | Row length     | 2 bytes                                            |
//! | 0x001C         | Rows           | 4 bytes                                            |
//! | 0x0020         | Schema         | one entry per column                               |
//!
//! Each schema entry is a flags byte followed by a string reference to the column name. The high
//! nibble of the flags is the storage class (`0x10` zero, `0x30` constant, `0x50` per row), the low
//! nibble the value type. Constant values follow their schema entry. A flags byte of zero is
//! followed by three padding bytes and the real flags.
//!
//! Tables may be enciphered with a byte stream cipher, see [`cipher`].
//!
//! ## CPK archives
//!
//! A CPK file starts with a 16-byte envelope (`CPK `, flags, little-endian packet size) and the
//! header table. The header names the offsets of further sections, each carrying its own envelope:
//!
//! - **TOC**: file names, sizes and offsets relative to the smaller of `ContentOffset` and
//!   `TocOffset`
//! - **ETOC**: update times and local directories, one row per TOC row
//! - **ITOC**: sizes keyed by identifier, split over a 16-bit and a 32-bit table
//! - **GTOC**: group information, never enciphered
//!
//! An offset of zero or all ones means the section is missing.

pub mod cipher;
pub mod cpk;
pub mod error;
pub mod utf;

#[cfg(any(test, feature = "fixture"))]
#[doc(hidden)]
pub mod fixture;

pub use cpk::{Cpk, CpkArchive, CpkEntry, CpkOptions, SectionKind};
pub use utf::UtfTable;
