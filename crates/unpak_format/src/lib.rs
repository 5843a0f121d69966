//! This library identifies game asset files and opens them: containers list their members, and
//! compressed files decode to a single member.
//!
//! # Identifying a file
//!
//! Every supported format is described once in a static [`catalog`]. A descriptor matches a
//! stream by signature bytes at fixed offsets, by a case-insensitive file name pattern, or by
//! both when a signature is too short to be trusted alone. The [`resolve`] module weighs every
//! candidate and keeps the best one:
//!
//! - a signature match scores `0x10000` plus the signature length, so longer signatures win
//! - a name match alone scores `1`
//! - a descriptor whose signatures are all absent is ruled out
//! - ties go to the descriptor registered first
//!
//! Finding nothing is not an error for the resolver; [`Archive::open`] reports it as
//! [`error::Error::UnrecognizedFormat`].
//!
//! # Formats
//!
//! | Format     | Category    | Identified by                           |
//! |------------|-------------|-----------------------------------------|
//! | CPK        | container   | `CPK `                                  |
//! | AFS        | container   | `AFS\0`                                 |
//! | AFS2       | container   | `AFS2`                                  |
//! | CRILAYLA   | compression | `CRILAYLA`                              |
//! | Yaz0       | compression | `Yaz0`                                  |
//! | LZ77       | compression | `LZ77\x10`                              |
//! | LZ10       | compression | `0x10` and `.lz`, `.lz10`, `.cmp`       |
//! | LZ11       | compression | `0x11` and `.lz`, `.lz11`, `.cmp`       |
//! | RLE        | compression | `0x30` and `.rl`, `.rle`                |
//! | LZSS       | compression | `LZSS`                                  |
//! | Escape RLE | compression | `ERLE`                                  |
//! | Pair table | compression | `BPE1`                                  |
//! | Nibble LZ  | compression | `NLZ0`                                  |
//! | Zlib       | compression | `78 01`, `78 5E`, `78 9C`, `78 DA` and `.z`, `.zlib`, `.zz` |
//!
//! # Reading members
//!
//! ```no_run
//! use std::fs::File;
//!
//! use unpak_format::{Archive, OpenOptions};
//!
//! fn main() -> unpak_format::error::Result<()> {
//!     let options = OpenOptions::builder().max_output_size(64 << 20).build();
//!     let mut archive = Archive::open_with(File::open("movie.cpk")?, Some("movie.cpk"), options)?;
//!
//!     let index = archive.index_for_name("movie/opening.usm").expect("member is listed");
//!     let data = archive.extract_decoded(index)?;
//!     println!("{} bytes", data.len());
//!     Ok(())
//! }
//! ```
//!
//! Decoded sizes declared by a file are checked against [`OpenOptions::max_output_size`] before
//! anything is allocated.

pub mod afs;
pub mod afs2;
pub mod archive;
pub mod catalog;
pub mod compressed;
pub mod cpk;
pub mod error;
pub mod options;
pub mod resolve;

pub use archive::{Archive, Entry, EntryFlags};
pub use catalog::{Category, FormatKind};
pub use options::OpenOptions;
