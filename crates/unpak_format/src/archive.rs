//! Types for opening a resolved file and reading its members

use std::{
    fmt::{self, Debug},
    io::{Read, Seek, SeekFrom},
};

use indexmap::IndexSet;
use tracing::{debug, instrument, warn};
use unpak_cpk::cpk::read_range;
use unpak_lz::{
    crilayla::{CriLaylaHeader, HEADER_LEN},
    Codec,
};

use crate::{
    catalog::{Category, FormatDescriptor, FormatKind, Opened},
    error::{EntryNotFoundError, Error, Result},
    resolve::resolve,
    OpenOptions,
};

/// Properties of a member that are not sizes or offsets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct EntryFlags {
    /// The stored bytes are compressed and decode to `extract_size` bytes
    pub compressed: bool,
    /// The member is a table that was stored enciphered
    pub encrypted_header: bool,
    /// The container only knows the member by a number
    pub identifier_only: bool,
    /// The member is one of the container's own index tables
    pub header: bool,
}

/// A member of an opened file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Entry {
    /// Name of the member, unique within its archive
    ///
    /// # Warnings
    ///
    /// Names come straight from the container. They may contain an absolute path or break out of
    /// the current directory (`../`), so sanitize them before writing to disk.
    pub name: String,
    /// Absolute offset of the stored bytes
    pub offset: u64,
    /// Size of the stored bytes
    pub size: u64,
    /// Size after decoding
    pub extract_size: u64,
    /// Numeric identifier, when the container has one
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub id: Option<u64>,
    pub flags: EntryFlags,
}

impl Entry {
    /// End of the stored bytes, if it can be represented
    pub fn end(&self) -> Option<u64> {
        self.offset.checked_add(self.size)
    }
}

/// A resolved and opened file
///
/// Containers list their members; compression formats show up as a single member holding the
/// decoded data.
///
/// ```no_run
/// fn list_contents(path: &str) -> unpak_format::error::Result<()> {
///     let file = std::fs::File::open(path)?;
///     let mut archive = unpak_format::Archive::open(file, Some(path))?;
///
///     println!("{} with {} members", archive.format(), archive.len());
///     for i in 0..archive.len() {
///         let data = archive.extract_decoded(i)?;
///         println!("{}: {} bytes", archive.entries()[i].name, data.len());
///     }
///
///     Ok(())
/// }
/// ```
pub struct Archive<R> {
    reader: R,
    format: &'static FormatDescriptor,
    options: OpenOptions,
    names: IndexSet<String>,
    entries: Vec<Entry>,
    decoded: Option<Vec<u8>>,
}

impl<R> Debug for Archive<R> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Archive")
            .field("format", &self.format.kind)
            .field("entries", &self.entries.len())
            .field("decoded", &self.decoded.as_ref().map(Vec::len))
            .finish_non_exhaustive()
    }
}

/// Name of the single member of a compressed file
fn decoded_name(file_name: Option<&str>) -> String {
    let base = file_name
        .and_then(|name| name.rsplit(['/', '\\']).next())
        .filter(|name| !name.is_empty());
    match base {
        Some(name) => match name.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem.to_owned(),
            _ => name.to_owned(),
        },
        None => "data".to_owned(),
    }
}

/// Indexes entries by name, renaming later duplicates to `name#n`
fn index_entries(entries: &mut [Entry]) -> IndexSet<String> {
    let mut names = IndexSet::with_capacity(entries.len());
    for entry in entries {
        if names.contains(&entry.name) {
            let mut n = 1;
            let mut renamed = format!("{}#{n}", entry.name);
            while names.contains(&renamed) {
                n += 1;
                renamed = format!("{}#{n}", entry.name);
            }
            warn!(name = %entry.name, %renamed, "duplicate member name");
            entry.name = renamed;
        }
        names.insert(entry.name.clone());
    }
    names
}

impl<R: Read + Seek> Archive<R> {
    /// Resolves and opens a file with default options
    ///
    /// `file_name` is only used to match name patterns of the catalog.
    pub fn open(reader: R, file_name: Option<&str>) -> Result<Archive<R>> {
        Self::open_with(reader, file_name, OpenOptions::default())
    }

    /// Resolves and opens a file
    ///
    /// The format has to start at the beginning of the stream.
    #[instrument(skip(reader), err)]
    pub fn open_with(
        mut reader: R,
        file_name: Option<&str>,
        options: OpenOptions,
    ) -> Result<Archive<R>> {
        reader.rewind()?;
        let format = resolve(&mut reader, file_name, options.category)?
            .ok_or(Error::UnrecognizedFormat)?
            .descriptor;
        Self::open_as(reader, format, file_name, options)
    }

    /// Opens a file as `kind` without consulting the resolver
    pub fn open_kind(
        reader: R,
        kind: FormatKind,
        file_name: Option<&str>,
        options: OpenOptions,
    ) -> Result<Archive<R>> {
        let format = crate::catalog::descriptor(kind).ok_or(Error::UnrecognizedFormat)?;
        Self::open_as(reader, format, file_name, options)
    }

    fn open_as(
        mut reader: R,
        format: &'static FormatDescriptor,
        file_name: Option<&str>,
        options: OpenOptions,
    ) -> Result<Archive<R>> {
        reader.rewind()?;
        let opened = (format.open)(&mut reader, &options)?;

        let (mut entries, decoded) = match opened {
            Opened::Entries(entries) => (entries, None),
            Opened::Decoded(data) => {
                let size = reader.seek(SeekFrom::End(0))?;
                let entry = Entry {
                    name: decoded_name(file_name),
                    offset: 0,
                    size,
                    extract_size: data.len() as u64,
                    flags: EntryFlags {
                        compressed: true,
                        ..Default::default()
                    },
                    ..Default::default()
                };
                (vec![entry], Some(data))
            }
        };
        debug!(format = %format.kind, entries = entries.len(), "opened");

        Ok(Archive {
            reader,
            format,
            options,
            names: index_entries(&mut entries),
            entries,
            decoded,
        })
    }

    /// Copies the stored bytes of the member at `index`
    pub fn extract(&mut self, index: usize) -> Result<Vec<u8>> {
        let entry = self.entry(index)?;
        let (offset, size) = (entry.offset, entry.size);
        self.options.check_size(size)?;
        Ok(read_range(&mut self.reader, offset, size)?)
    }

    /// Copies the member at `index`, decoding it when the container marks it compressed
    ///
    /// Compressed CPK members hold a CRILAYLA stream. Members flagged compressed that do not
    /// carry the `CRILAYLA` tag are returned as stored.
    pub fn extract_decoded(&mut self, index: usize) -> Result<Vec<u8>> {
        if let Some(data) = &self.decoded {
            self.entry(index)?;
            return Ok(data.clone());
        }

        let entry = self.entry(index)?.clone();
        let raw = self.extract(index)?;
        if !entry.flags.compressed || !raw.starts_with(b"CRILAYLA") {
            return Ok(raw);
        }

        let header = CriLaylaHeader::parse(&raw)?;
        let body = self.options.check_size(header.uncompressed_size as u64)?;
        self.options.check_size(body as u64 + HEADER_LEN as u64)?;
        let data = Codec::CriLayla.decompress(&raw, body)?;
        if data.len() as u64 != entry.extract_size {
            warn!(
                name = %entry.name,
                decoded = data.len(),
                expected = entry.extract_size,
                "decoded size disagrees with the directory"
            );
        }
        Ok(data)
    }

    /// Copies the member called `name`
    pub fn by_name(&mut self, name: &str) -> Result<Vec<u8>> {
        let index = self
            .index_for_name(name)
            .ok_or_else(|| EntryNotFoundError::Name(name.to_owned()))?;
        self.extract_decoded(index)
    }
}

impl<R> Archive<R> {
    /// The format the file was opened as
    pub fn format(&self) -> FormatKind {
        self.format.kind
    }

    pub fn category(&self) -> Category {
        self.format.category
    }

    pub fn options(&self) -> &OpenOptions {
        &self.options
    }

    /// Number of members
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every member, in container order
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Get the index of a member by name, if it's present.
    #[inline(always)]
    pub fn index_for_name(&self, name: &str) -> Option<usize> {
        self.names.get_index_of(name)
    }

    /// Get the name of a member, if it's present.
    #[inline(always)]
    pub fn name_for_index(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(|e| e.name.as_str())
    }

    /// The decoded data of a compression format
    pub fn decoded(&self) -> Option<&[u8]> {
        self.decoded.as_deref()
    }

    /// Unwrap and return the inner reader object
    ///
    /// The position of the reader is undefined.
    pub fn into_inner(self) -> R {
        self.reader
    }

    fn entry(&self, index: usize) -> Result<&Entry> {
        self.entries
            .get(index)
            .ok_or_else(|| EntryNotFoundError::Index(index).into())
    }
}
