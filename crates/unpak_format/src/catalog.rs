//! The static table of every format this library can open.
//!
//! A descriptor matches a stream by signature bytes at fixed offsets, by a file name pattern, or
//! by both. The table is compiled once on first use and never changes afterwards.

use std::{
    fmt,
    io::{Read, Seek},
    sync::OnceLock,
};

use regex::Regex;
use tracing::warn;

use crate::{afs, afs2, archive::Entry, compressed, cpk, error::Result, OpenOptions};

/// A byte source that can also seek, usable as a trait object
pub trait ReadSeek: Read + Seek {}

impl<T: Read + Seek + ?Sized> ReadSeek for T {}

/// What opening a format produces
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Category {
    /// Several members at offsets within the stream
    Container,
    /// One decoded buffer
    Compression,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Category::Container => "container",
            Category::Compression => "compression",
        })
    }
}

/// Every catalogued format
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum FormatKind {
    Cpk,
    Afs,
    Afs2,
    CriLayla,
    Yaz0,
    Lz77Wii,
    Lz10,
    Lz11,
    Rle,
    Lzss,
    EscapeRle,
    PairTable,
    Nibble,
    Zlib,
}

impl FormatKind {
    pub fn name(self) -> &'static str {
        match self {
            FormatKind::Cpk => "CPK",
            FormatKind::Afs => "AFS",
            FormatKind::Afs2 => "AFS2",
            FormatKind::CriLayla => "CRILAYLA",
            FormatKind::Yaz0 => "Yaz0",
            FormatKind::Lz77Wii => "LZ77",
            FormatKind::Lz10 => "LZ10",
            FormatKind::Lz11 => "LZ11",
            FormatKind::Rle => "RLE",
            FormatKind::Lzss => "LZSS",
            FormatKind::EscapeRle => "Escape RLE",
            FormatKind::PairTable => "Pair table",
            FormatKind::Nibble => "Nibble LZ",
            FormatKind::Zlib => "Zlib",
        }
    }
}

impl fmt::Display for FormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Bytes expected at an offset from the start of the stream
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Signature {
    pub bytes: &'static [u8],
    pub offset: u64,
}

impl Signature {
    const fn at_start(bytes: &'static [u8]) -> Self {
        Signature { bytes, offset: 0 }
    }

    /// Whether `window`, read from the start of the stream, holds this signature
    pub fn matches(&self, window: &[u8]) -> bool {
        let Ok(start) = usize::try_from(self.offset) else {
            return false;
        };
        window.get(start..start + self.bytes.len()) == Some(self.bytes)
    }

    /// Bytes of the stream needed to test this signature
    pub fn extent(&self) -> u64 {
        self.offset + self.bytes.len() as u64
    }
}

/// What an open routine hands back
#[derive(Debug)]
pub enum Opened {
    Entries(Vec<Entry>),
    Decoded(Vec<u8>),
}

/// Opens a stream positioned at the start of the format
pub type OpenFn = fn(&mut dyn ReadSeek, &OpenOptions) -> Result<Opened>;

/// One catalogued format
pub struct FormatDescriptor {
    pub kind: FormatKind,
    pub category: Category,
    /// At least one must match when any are given
    pub signatures: &'static [Signature],
    /// Case-insensitive file name patterns
    pub patterns: Vec<Regex>,
    /// A match needs both a signature and a pattern
    pub requires_both: bool,
    pub open: OpenFn,
}

impl fmt::Debug for FormatDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormatDescriptor")
            .field("kind", &self.kind)
            .field("category", &self.category)
            .field("signatures", &self.signatures)
            .field("patterns", &self.patterns)
            .field("requires_both", &self.requires_both)
            .finish_non_exhaustive()
    }
}

impl FormatDescriptor {
    /// Compiles `patterns`, skipping any that are not valid expressions
    pub fn new(
        kind: FormatKind,
        category: Category,
        signatures: &'static [Signature],
        patterns: &[&str],
        requires_both: bool,
        open: OpenFn,
    ) -> Self {
        let patterns = patterns
            .iter()
            .filter_map(|p| match Regex::new(&format!("(?i){p}")) {
                Ok(regex) => Some(regex),
                Err(e) => {
                    warn!(%kind, pattern = p, "skipping file name pattern: {e}");
                    None
                }
            })
            .collect();
        FormatDescriptor {
            kind,
            category,
            signatures,
            patterns,
            requires_both,
            open,
        }
    }

    /// Length of the longest matching signature, if any matches
    pub fn signature_match(&self, window: &[u8]) -> Option<usize> {
        self.signatures
            .iter()
            .filter(|s| s.matches(window))
            .map(|s| s.bytes.len())
            .max()
    }

    pub fn pattern_match(&self, file_name: Option<&str>) -> bool {
        file_name.is_some_and(|name| self.patterns.iter().any(|p| p.is_match(name)))
    }
}

const CPK: &[Signature] = &[Signature::at_start(b"CPK ")];
const AFS: &[Signature] = &[Signature::at_start(b"AFS\0")];
const AFS2: &[Signature] = &[Signature::at_start(b"AFS2")];
const CRILAYLA: &[Signature] = &[Signature::at_start(b"CRILAYLA")];
const YAZ0: &[Signature] = &[Signature::at_start(b"Yaz0")];
const LZ77_WII: &[Signature] = &[Signature::at_start(b"LZ77\x10")];
const LZ10: &[Signature] = &[Signature::at_start(&[0x10])];
const LZ11: &[Signature] = &[Signature::at_start(&[0x11])];
const RLE: &[Signature] = &[Signature::at_start(&[0x30])];
const LZSS: &[Signature] = &[Signature::at_start(b"LZSS")];
const ESCAPE_RLE: &[Signature] = &[Signature::at_start(b"ERLE")];
const PAIR_TABLE: &[Signature] = &[Signature::at_start(b"BPE1")];
const NIBBLE: &[Signature] = &[Signature::at_start(b"NLZ0")];
const ZLIB: &[Signature] = &[
    Signature::at_start(&[0x78, 0x01]),
    Signature::at_start(&[0x78, 0x5E]),
    Signature::at_start(&[0x78, 0x9C]),
    Signature::at_start(&[0x78, 0xDA]),
];

fn build() -> Vec<FormatDescriptor> {
    use Category::{Compression, Container};

    vec![
        FormatDescriptor::new(
            FormatKind::Cpk,
            Container,
            CPK,
            &[],
            false,
            cpk::open,
        ),
        FormatDescriptor::new(
            FormatKind::Afs,
            Container,
            AFS,
            &[],
            false,
            afs::open,
        ),
        FormatDescriptor::new(
            FormatKind::Afs2,
            Container,
            AFS2,
            &[],
            false,
            afs2::open,
        ),
        FormatDescriptor::new(
            FormatKind::CriLayla,
            Compression,
            CRILAYLA,
            &[],
            false,
            compressed::open_crilayla,
        ),
        FormatDescriptor::new(
            FormatKind::Yaz0,
            Compression,
            YAZ0,
            &[],
            false,
            compressed::open_yaz0,
        ),
        FormatDescriptor::new(
            FormatKind::Lz77Wii,
            Compression,
            LZ77_WII,
            &[],
            false,
            compressed::open_lz77_wii,
        ),
        FormatDescriptor::new(
            FormatKind::Lz10,
            Compression,
            LZ10,
            &[r"\.(lz|lz10|cmp)$"],
            true,
            compressed::open_lz10,
        ),
        FormatDescriptor::new(
            FormatKind::Lz11,
            Compression,
            LZ11,
            &[r"\.(lz|lz11|cmp)$"],
            true,
            compressed::open_lz11,
        ),
        FormatDescriptor::new(
            FormatKind::Rle,
            Compression,
            RLE,
            &[r"\.(rl|rle)$"],
            true,
            compressed::open_rle,
        ),
        FormatDescriptor::new(
            FormatKind::Lzss,
            Compression,
            LZSS,
            &[],
            false,
            compressed::open_lzss,
        ),
        FormatDescriptor::new(
            FormatKind::EscapeRle,
            Compression,
            ESCAPE_RLE,
            &[],
            false,
            compressed::open_escape_rle,
        ),
        FormatDescriptor::new(
            FormatKind::PairTable,
            Compression,
            PAIR_TABLE,
            &[],
            false,
            compressed::open_pair_table,
        ),
        FormatDescriptor::new(
            FormatKind::Nibble,
            Compression,
            NIBBLE,
            &[],
            false,
            compressed::open_nibble,
        ),
        FormatDescriptor::new(
            FormatKind::Zlib,
            Compression,
            ZLIB,
            &[r"\.(z|zlib|zz)$"],
            true,
            compressed::open_zlib,
        ),
    ]
}

static CATALOG: OnceLock<Vec<FormatDescriptor>> = OnceLock::new();

/// Every registered format, in registration order
pub fn catalog() -> &'static [FormatDescriptor] {
    CATALOG.get_or_init(build)
}

/// The descriptor of `kind`
pub fn descriptor(kind: FormatKind) -> Option<&'static FormatDescriptor> {
    catalog().iter().find(|d| d.kind == kind)
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;

    use super::{catalog, descriptor, FormatKind, Signature};

    #[test]
    fn kinds_are_registered_once() {
        let kinds = catalog().iter().map(|d| d.kind).collect::<HashSet<_>>();
        assert_eq!(kinds.len(), catalog().len());
        assert!(descriptor(FormatKind::Cpk).is_some());
    }

    #[test]
    fn patterns_compile() {
        for d in catalog() {
            if d.requires_both {
                assert!(!d.patterns.is_empty(), "{} has no usable pattern", d.kind);
                assert!(!d.signatures.is_empty(), "{} has no signature", d.kind);
            }
        }
    }

    #[test]
    fn pattern_is_case_insensitive() {
        let lz10 = descriptor(FormatKind::Lz10).unwrap();
        assert!(lz10.pattern_match(Some("MAP01.LZ")));
        assert!(lz10.pattern_match(Some("dir/map01.cmp")));
        assert!(!lz10.pattern_match(Some("map01.lzma")));
        assert!(!lz10.pattern_match(None));
    }

    #[test]
    fn signature_outside_window() {
        let signature = Signature {
            bytes: b"AB",
            offset: 3,
        };
        assert!(signature.matches(b"...AB"));
        assert!(!signature.matches(b"...A"));
        assert_eq!(signature.extent(), 5);
    }
}
