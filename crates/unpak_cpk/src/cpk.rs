//! Types for reading CPK archives

use std::{
    collections::BTreeMap,
    fmt,
    io::{self, Read, Seek, SeekFrom},
};

use binrw::BinRead;
use bon::Builder;
use tracing::{debug, instrument, warn};

use crate::{
    cipher,
    error::{EntryNotFoundError, Error, Result},
    utf::{UtfTable, Value},
};

/// Size of the envelope in front of every section's `@UTF` packet
pub const SECTION_HEADER_LEN: u64 = 0x10;

/// Envelope of a CPK section
#[derive(BinRead, Debug, Copy, Clone, PartialEq, Eq)]
#[br(little)]
pub struct SectionHeader {
    /// One of `CPK `, `TOC `, `ETOC`, `ITOC` or `GTOC`
    pub tag: [u8; 4],

    /// Unknown, usually `0xFF`
    pub flags: u32,

    /// Size of the `@UTF` packet that follows
    pub packet_size: u64,
}

/// The tables a CPK archive is assembled from
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum SectionKind {
    /// Archive header at the start of the file
    Header,
    /// Table of contents with file names
    Toc,
    /// Extended per file metadata, row-aligned with the TOC
    Etoc,
    /// File index keyed by identifier, used by archives without names
    Itoc,
    /// Group table of contents
    Gtoc,
}

impl SectionKind {
    /// Every section, in archive order
    pub const ALL: [SectionKind; 5] = [
        SectionKind::Header,
        SectionKind::Toc,
        SectionKind::Etoc,
        SectionKind::Itoc,
        SectionKind::Gtoc,
    ];

    pub fn tag(self) -> &'static [u8; 4] {
        match self {
            SectionKind::Header => b"CPK ",
            SectionKind::Toc => b"TOC ",
            SectionKind::Etoc => b"ETOC",
            SectionKind::Itoc => b"ITOC",
            SectionKind::Gtoc => b"GTOC",
        }
    }

    /// Name of the pseudo entry exposing this section's raw bytes
    pub fn entry_name(self) -> &'static str {
        match self {
            SectionKind::Header => "CPK_HDR",
            SectionKind::Toc => "TOC_HDR",
            SectionKind::Etoc => "ETOC_HDR",
            SectionKind::Itoc => "ITOC_HDR",
            SectionKind::Gtoc => "GTOC_HDR",
        }
    }

    fn offset_column(self) -> Option<&'static str> {
        match self {
            SectionKind::Header => None,
            SectionKind::Toc => Some("TocOffset"),
            SectionKind::Etoc => Some("EtocOffset"),
            SectionKind::Itoc => Some("ItocOffset"),
            SectionKind::Gtoc => Some("GtocOffset"),
        }
    }

    /// GTOC packets are always stored in the clear
    fn may_be_enciphered(self) -> bool {
        self != SectionKind::Gtoc
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(String::from_utf8_lossy(self.tag()).trim_end())
    }
}

/// One parsed section
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub kind: SectionKind,
    /// Absolute position of the envelope
    pub offset: u64,
    /// Size including the envelope
    pub size: u64,
    /// Whether the packet had to be deciphered
    pub enciphered: bool,
    pub table: UtfTable,
}

/// Options for how a CPK archive is indexed
#[derive(Debug, Clone, Copy, Default, Builder)]
pub struct CpkOptions {
    /// List the raw section tables as entries in front of the files
    #[builder(default)]
    pub include_headers: bool,
}

/// A member of a CPK archive
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CpkEntry {
    /// `DirName/FileName`, or the zero padded identifier for ITOC members
    pub name: String,
    /// Absolute offset of the member in the archive
    pub offset: u64,
    /// Stored size
    pub size: u64,
    /// Size once decompressed
    pub extract_size: u64,
    pub id: Option<u64>,
    /// `UpdateDateTime` from the ETOC
    pub update_date_time: Option<u64>,
    /// `LocalDir` from the ETOC
    pub local_dir: Option<String>,
    /// Set on the pseudo entries of [`CpkOptions::include_headers`]
    pub section: Option<SectionKind>,
    /// Whether the section behind a pseudo entry is enciphered on disk
    pub encrypted_header: bool,
    /// The member has no name, only an identifier
    pub identifier_only: bool,
}

impl CpkEntry {
    /// The stored bytes are a CRILAYLA stream
    pub fn is_compressed(&self) -> bool {
        self.extract_size > self.size
    }
}

/// The parsed index of a CPK archive, independent of the reader it came from
#[derive(Debug, Clone, PartialEq)]
pub struct Cpk {
    sections: Vec<Section>,
    content_offset: Option<u64>,
    align: u64,
    entries: Vec<CpkEntry>,
}

fn all_ones(value: &Value) -> u64 {
    match value.kind().width() {
        width if width >= 8 => u64::MAX,
        width => (1u64 << (width * 8)) - 1,
    }
}

/// Reads an offset column, treating zero and all-ones as absent
fn section_offset(table: &UtfTable, column: &str) -> Option<u64> {
    let value = table.get(0, column)?;
    value
        .as_u64()
        .filter(|offset| *offset != 0 && *offset != all_ones(value))
}

fn truncation(error: io::Error) -> Error {
    match error.kind() {
        io::ErrorKind::UnexpectedEof => Error::TruncatedInput,
        _ => Error::IOError(error),
    }
}

/// Copies `len` bytes at `offset` out of `reader`
pub fn read_range<R: Read + Seek + ?Sized>(
    reader: &mut R,
    offset: u64,
    len: u64,
) -> Result<Vec<u8>> {
    let len = usize::try_from(len).map_err(|_| Error::TruncatedInput)?;
    reader.seek(SeekFrom::Start(offset))?;
    let mut buffer = vec![0u8; len];
    reader.read_exact(&mut buffer).map_err(truncation)?;
    Ok(buffer)
}

fn align_up(value: u64, align: u64) -> Option<u64> {
    value.checked_next_multiple_of(align.max(1))
}

impl Cpk {
    /// Reads the archive header and every table it points to
    #[instrument(skip(reader), err)]
    pub fn read<R: Read + Seek + ?Sized>(reader: &mut R, options: &CpkOptions) -> Result<Cpk> {
        let stream_len = reader.seek(SeekFrom::End(0))?;

        let header = Self::read_section(reader, stream_len, SectionKind::Header, 0)?;
        let mut sections = vec![];
        for kind in &SectionKind::ALL[1..] {
            let Some(column) = kind.offset_column() else {
                continue;
            };
            if let Some(offset) = section_offset(&header.table, column) {
                sections.push(Self::read_section(reader, stream_len, *kind, offset)?);
            }
        }
        sections.insert(0, header);

        let mut cpk = Cpk {
            content_offset: section_offset(&sections[0].table, "ContentOffset"),
            align: sections[0].table.get_u64(0, "Align").unwrap_or(1),
            sections,
            entries: Vec::new(),
        };

        let mut entries = if options.include_headers {
            cpk.header_entries()
        } else {
            Vec::new()
        };
        let files = if cpk.section(SectionKind::Toc).is_some() {
            cpk.toc_entries()?
        } else if cpk.section(SectionKind::Itoc).is_some() {
            cpk.itoc_entries()?
        } else {
            Vec::new()
        };

        if let Some(declared) = cpk.header().table.get_u64(0, "Files") {
            if declared != files.len() as u64 {
                warn!(declared, found = files.len(), "file count disagrees with the header");
            }
        }
        entries.extend(files);

        for entry in &entries {
            match entry.offset.checked_add(entry.size) {
                Some(end) if end <= stream_len => {}
                _ => {
                    debug!(
                        name = %entry.name,
                        entry.offset,
                        entry.size,
                        stream_len,
                        "member outside the archive"
                    );
                    return Err(Error::TruncatedInput);
                }
            }
        }

        cpk.entries = entries;
        Ok(cpk)
    }

    fn read_section<R: Read + Seek + ?Sized>(
        reader: &mut R,
        stream_len: u64,
        kind: SectionKind,
        offset: u64,
    ) -> Result<Section> {
        reader.seek(SeekFrom::Start(offset))?;
        let envelope = SectionHeader::read(&mut &mut *reader).map_err(Error::from_read)?;
        if &envelope.tag != kind.tag() {
            return Err(Error::bad_signature(kind.tag()));
        }

        let packet_offset = offset + SECTION_HEADER_LEN;
        match packet_offset.checked_add(envelope.packet_size) {
            Some(end) if end <= stream_len => {}
            _ => return Err(Error::TruncatedInput),
        }
        let mut packet = read_range(reader, packet_offset, envelope.packet_size)?;

        let mut enciphered = false;
        if !packet.starts_with(b"@UTF") && kind.may_be_enciphered() {
            cipher::decipher(&mut packet);
            enciphered = true;
        }
        if !packet.starts_with(b"@UTF") {
            return Err(Error::bad_signature(b"@UTF"));
        }

        let table = UtfTable::parse(&packet, packet_offset)?;
        debug!(section = %kind, offset, enciphered, rows = table.row_count(), "read section");

        Ok(Section {
            kind,
            offset,
            size: SECTION_HEADER_LEN + envelope.packet_size,
            enciphered,
            table,
        })
    }

    fn header_entries(&self) -> Vec<CpkEntry> {
        self.sections
            .iter()
            .map(|section| CpkEntry {
                name: section.kind.entry_name().to_owned(),
                offset: section.offset,
                size: section.size,
                extract_size: section.size,
                section: Some(section.kind),
                encrypted_header: section.enciphered,
                ..Default::default()
            })
            .collect()
    }

    fn toc_entries(&self) -> Result<Vec<CpkEntry>> {
        let Some(toc) = self.section(SectionKind::Toc) else {
            return Ok(Vec::new());
        };
        let etoc = self.section(SectionKind::Etoc).map(|s| &s.table);

        // member offsets are relative to whichever of the content and the TOC comes first
        let base = match self.content_offset {
            Some(content) => content.min(toc.offset),
            None => toc.offset,
        };

        let table = &toc.table;
        (0..table.row_count())
            .map(|row| {
                let dir = table.get_str(row, "DirName").unwrap_or_default();
                let file = table.get_str(row, "FileName").unwrap_or_default();
                let id = table.get_u64(row, "ID");
                let name = match (dir.is_empty(), file.is_empty(), id) {
                    (_, true, Some(id)) => format!("{id:04}"),
                    (true, _, _) => file.to_owned(),
                    (false, _, _) => format!("{dir}/{file}"),
                };

                let size = table.get_u64(row, "FileSize").unwrap_or(0);
                let offset = table
                    .get_u64(row, "FileOffset")
                    .unwrap_or(0)
                    .checked_add(base)
                    .ok_or_else(|| Error::CorruptStream(format!("offset of {name} overflows")))?;

                Ok(CpkEntry {
                    offset,
                    size,
                    extract_size: table.get_u64(row, "ExtractSize").unwrap_or(size),
                    id,
                    update_date_time: etoc.and_then(|e| e.get_u64(row, "UpdateDateTime")),
                    local_dir: etoc
                        .and_then(|e| e.get_str(row, "LocalDir"))
                        .map(str::to_owned),
                    name,
                    ..Default::default()
                })
            })
            .collect()
    }

    /// Merges the 16-bit and 32-bit size tables and lays the members out by ascending identifier
    fn itoc_entries(&self) -> Result<Vec<CpkEntry>> {
        let Some(itoc) = self.section(SectionKind::Itoc) else {
            return Ok(Vec::new());
        };

        let mut sizes = BTreeMap::new();
        for column in ["DataL", "DataH"] {
            let Some(Value::Data { offset, bytes }) = itoc.table.get(0, column) else {
                continue;
            };
            if bytes.is_empty() {
                continue;
            }
            let nested = UtfTable::parse(bytes, *offset)?;
            for row in 0..nested.row_count() {
                let id = nested.get_u64(row, "ID").ok_or_else(|| {
                    Error::CorruptStream(format!("{column} row {row} has no identifier"))
                })?;
                let size = nested.get_u64(row, "FileSize").unwrap_or(0);
                let extract_size = nested.get_u64(row, "ExtractSize").unwrap_or(size);
                sizes.insert(id, (size, extract_size));
            }
        }

        let content = self.content_offset.unwrap_or(0);
        let mut running = 0u64;
        let mut entries = Vec::with_capacity(sizes.len());
        for (id, (size, extract_size)) in sizes {
            let offset = content.checked_add(running);
            running = running
                .checked_add(size)
                .and_then(|end| align_up(end, self.align))
                .ok_or_else(|| Error::CorruptStream(format!("member {id} overflows")))?;
            entries.push(CpkEntry {
                name: format!("{id:04}"),
                offset: offset
                    .ok_or_else(|| Error::CorruptStream(format!("member {id} overflows")))?,
                size,
                extract_size,
                id: Some(id),
                identifier_only: true,
                ..Default::default()
            });
        }
        Ok(entries)
    }

    /// The archive header section
    pub fn header(&self) -> &Section {
        &self.sections[0]
    }

    /// A section, if the archive carries it
    pub fn section(&self, kind: SectionKind) -> Option<&Section> {
        self.sections.iter().find(|s| s.kind == kind)
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn content_offset(&self) -> Option<u64> {
        self.content_offset
    }

    pub fn align(&self) -> u64 {
        self.align
    }

    pub fn entries(&self) -> &[CpkEntry] {
        &self.entries
    }

    /// Copies the stored bytes of entry `index` out of `reader`
    pub fn read_entry<R: Read + Seek + ?Sized>(
        &self,
        reader: &mut R,
        index: usize,
    ) -> Result<Vec<u8>> {
        let entry = self
            .entries
            .get(index)
            .ok_or(EntryNotFoundError::Index(index))?;
        read_range(reader, entry.offset, entry.size)
    }
}

/// CPK archive reader
///
/// ```no_run
/// fn list_cpk_contents(reader: impl std::io::Read + std::io::Seek) -> unpak_cpk::error::Result<()> {
///     let mut cpk = unpak_cpk::CpkArchive::new(reader)?;
///
///     for i in 0..cpk.len() {
///         let data = cpk.read(i)?;
///         println!("{}: {} bytes", cpk.entries()[i].name, data.len());
///     }
///
///     Ok(())
/// }
/// ```
pub struct CpkArchive<R> {
    reader: R,
    index: Cpk,
}

impl<R: Read + Seek> CpkArchive<R> {
    pub fn new(reader: R) -> Result<CpkArchive<R>> {
        Self::with_options(reader, CpkOptions::default())
    }

    pub fn with_options(mut reader: R, options: CpkOptions) -> Result<CpkArchive<R>> {
        let index = Cpk::read(&mut reader, &options)?;
        Ok(CpkArchive { reader, index })
    }

    /// Number of entries, including header pseudo entries when requested
    pub fn len(&self) -> usize {
        self.index.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn entries(&self) -> &[CpkEntry] {
        self.index.entries()
    }

    pub fn index(&self) -> &Cpk {
        &self.index
    }

    pub fn index_for_name(&self, name: &str) -> Option<usize> {
        self.index.entries.iter().position(|e| e.name == name)
    }

    /// Stored bytes of the entry at `index`
    pub fn read(&mut self, index: usize) -> Result<Vec<u8>> {
        self.index.read_entry(&mut self.reader, index)
    }

    /// Stored bytes of the first entry called `name`
    pub fn by_name(&mut self, name: &str) -> Result<Vec<u8>> {
        let index = self
            .index_for_name(name)
            .ok_or_else(|| EntryNotFoundError::Name(name.to_owned()))?;
        self.read(index)
    }

    /// Unwrap and return the inner reader object
    ///
    /// The position of the reader is undefined.
    pub fn into_inner(self) -> R {
        self.reader
    }
}
