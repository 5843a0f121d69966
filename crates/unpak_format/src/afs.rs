//! AFS, CRI's flat container for streamed audio and video.
//!
//! | Offset (bytes) | Field     | Description                                        |
//! |----------------|-----------|----------------------------------------------------|
//! | 0x0000         | Tag       | 4 bytes: `AFS\0`                                   |
//! | 0x0004         | Count     | 4 bytes                                            |
//! | 0x0008         | Members   | count x (4 bytes offset, 4 bytes size)             |
//! | after members  | Names     | 4 bytes offset, 4 bytes size of the name directory |
//!
//! Some writers leave the name directory pointer after the member table empty and store it in the
//! eight bytes in front of the first member instead. Each directory record is 0x30 bytes: a
//! 32-byte null padded name, six 16-bit timestamp fields and a 32-bit size. Archives without a
//! directory name their members by index.

use std::io::SeekFrom;

use binrw::BinRead;
use tracing::{debug, instrument};

use crate::{
    archive::{Entry, EntryFlags},
    catalog::{Opened, ReadSeek},
    error::{Error, Result},
    OpenOptions,
};

const HEADER_LEN: u64 = 8;
const SPAN_LEN: u64 = 8;
const NAME_RECORD_LEN: u64 = 0x30;

#[derive(BinRead, Debug, Copy, Clone, PartialEq, Eq)]
#[br(little, magic = b"AFS\0")]
pub struct AfsHeader {
    pub count: u32,
}

/// Position and size of a member or of the name directory
#[derive(BinRead, Debug, Copy, Clone, PartialEq, Eq)]
#[br(little)]
pub struct AfsSpan {
    pub offset: u32,
    pub size: u32,
}

impl AfsSpan {
    pub fn end(&self) -> u64 {
        self.offset as u64 + self.size as u64
    }
}

#[derive(BinRead, Debug, Copy, Clone, PartialEq, Eq)]
#[br(little)]
pub struct AfsName {
    pub name: [u8; 32],
    /// Year, month, day, hour, minute, second
    pub modified: [u16; 6],
    pub size: u32,
}

impl AfsName {
    fn name(&self) -> String {
        let end = self.name.iter().position(|b| *b == 0).unwrap_or(self.name.len());
        String::from_utf8_lossy(&self.name[..end]).trim().to_owned()
    }
}

fn read_span(reader: &mut dyn ReadSeek) -> Result<AfsSpan> {
    AfsSpan::read(&mut &mut *reader).map_err(Error::from_header)
}

/// Finds a name directory large enough for every member
fn directory(
    reader: &mut dyn ReadSeek,
    members: &[AfsSpan],
    stream_len: u64,
) -> Result<Option<AfsSpan>> {
    let after_table = HEADER_LEN + members.len() as u64 * SPAN_LEN;
    let before_first = members
        .iter()
        .map(|m| m.offset as u64)
        .filter(|offset| *offset >= after_table + SPAN_LEN)
        .min()
        .map(|offset| offset - SPAN_LEN);

    let needed = members.len() as u64 * NAME_RECORD_LEN;
    for position in [Some(after_table), before_first].into_iter().flatten() {
        if position + SPAN_LEN > stream_len {
            continue;
        }
        reader.seek(SeekFrom::Start(position))?;
        let span = read_span(reader)?;
        if span.offset != 0 && span.end() <= stream_len && span.size as u64 >= needed {
            debug!(position, offset = span.offset, "found name directory");
            return Ok(Some(span));
        }
    }
    Ok(None)
}

fn names(reader: &mut dyn ReadSeek, directory: AfsSpan, count: usize) -> Result<Vec<AfsName>> {
    reader.seek(SeekFrom::Start(directory.offset as u64))?;
    (0..count)
        .map(|_| AfsName::read(&mut &mut *reader).map_err(Error::from_header))
        .collect()
}

#[instrument(skip_all, err)]
pub(crate) fn open(reader: &mut dyn ReadSeek, _options: &OpenOptions) -> Result<Opened> {
    let stream_len = reader.seek(SeekFrom::End(0))?;
    reader.rewind()?;

    let header = AfsHeader::read(&mut &mut *reader).map_err(Error::from_header)?;
    if HEADER_LEN + header.count as u64 * SPAN_LEN > stream_len {
        return Err(Error::TruncatedInput);
    }
    let members = (0..header.count)
        .map(|_| read_span(reader))
        .collect::<Result<Vec<_>>>()?;

    let names = match directory(reader, &members, stream_len)? {
        Some(span) => names(reader, span, members.len())?,
        None => Vec::new(),
    };

    let mut entries = Vec::with_capacity(members.len());
    for (index, member) in members.iter().enumerate() {
        if member.end() > stream_len {
            debug!(
                index,
                offset = member.offset,
                size = member.size,
                stream_len,
                "member outside the archive"
            );
            return Err(Error::TruncatedInput);
        }
        let name = names
            .get(index)
            .map(AfsName::name)
            .filter(|name| !name.is_empty());
        entries.push(Entry {
            flags: EntryFlags {
                identifier_only: name.is_none(),
                ..Default::default()
            },
            name: name.unwrap_or_else(|| format!("{index:05}")),
            offset: member.offset as u64,
            size: member.size as u64,
            extract_size: member.size as u64,
            id: Some(index as u64),
        });
    }
    debug!(count = header.count, named = !names.is_empty(), "read AFS directory");
    Ok(Opened::Entries(entries))
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use pretty_assertions::assert_eq;

    use super::open;
    use crate::{
        archive::Entry,
        catalog::Opened,
        error::{Error, Result},
        Archive, OpenOptions,
    };

    enum Directory {
        Missing,
        AfterTable,
        BeforeFirst,
    }

    fn align(value: usize) -> usize {
        value.next_multiple_of(0x10)
    }

    /// Lays members out on 16-byte boundaries with the name directory last
    fn build(members: &[(&str, &[u8])], directory: Directory) -> Vec<u8> {
        let table_len = 8 + members.len() * 8 + 8;
        let mut out = vec![0u8; align(table_len) + 0x10];
        out[..4].copy_from_slice(b"AFS\0");
        out[4..8].copy_from_slice(&(members.len() as u32).to_le_bytes());

        let first = out.len();
        for (i, (_, data)) in members.iter().enumerate() {
            let offset = out.len() as u32;
            out[8 + i * 8..12 + i * 8].copy_from_slice(&offset.to_le_bytes());
            out[12 + i * 8..16 + i * 8].copy_from_slice(&(data.len() as u32).to_le_bytes());
            out.extend_from_slice(data);
            out.resize(align(out.len()), 0);
        }

        let directory_offset = out.len();
        for (name, data) in members {
            let mut record = [0u8; 0x30];
            record[..name.len()].copy_from_slice(name.as_bytes());
            record[32..34].copy_from_slice(&2004u16.to_le_bytes());
            record[44..48].copy_from_slice(&(data.len() as u32).to_le_bytes());
            out.extend_from_slice(&record);
        }

        let mut span = (directory_offset as u32).to_le_bytes().to_vec();
        span.extend_from_slice(&((members.len() * 0x30) as u32).to_le_bytes());
        match directory {
            Directory::Missing => out.truncate(directory_offset),
            Directory::AfterTable => out[table_len - 8..table_len].copy_from_slice(&span),
            Directory::BeforeFirst => out[first - 8..first].copy_from_slice(&span),
        }
        out
    }

    fn entries(data: Vec<u8>) -> Result<Vec<Entry>> {
        match open(&mut Cursor::new(data), &OpenOptions::default())? {
            Opened::Entries(entries) => Ok(entries),
            Opened::Decoded(_) => panic!("AFS is a container"),
        }
    }

    const MEMBERS: [(&str, &[u8]); 3] = [
        ("bgm_01.adx", b"first member"),
        ("empty.bin", b""),
        ("se.adx", b"0123456789abcdef"),
    ];

    #[test]
    fn names_from_directory() -> Result<()> {
        let entries = entries(build(&MEMBERS, Directory::AfterTable))?;
        let listed = entries
            .iter()
            .map(|e| (e.name.as_str(), e.offset, e.size))
            .collect::<Vec<_>>();
        assert_eq!(
            listed,
            [("bgm_01.adx", 0x40, 12), ("empty.bin", 0x50, 0), ("se.adx", 0x50, 16)]
        );
        assert!(entries.iter().all(|e| !e.flags.identifier_only));
        Ok(())
    }

    #[test]
    fn directory_before_first_member() -> Result<()> {
        let entries = entries(build(&MEMBERS, Directory::BeforeFirst))?;
        assert_eq!(entries[2].name, "se.adx");
        Ok(())
    }

    #[test]
    fn numbered_without_directory() -> Result<()> {
        let entries = entries(build(&MEMBERS, Directory::Missing))?;
        let names = entries.iter().map(|e| e.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, ["00000", "00001", "00002"]);
        assert!(entries.iter().all(|e| e.flags.identifier_only));
        Ok(())
    }

    #[test]
    fn member_past_the_end() {
        let mut data = build(&MEMBERS, Directory::Missing);
        data.pop();
        assert!(matches!(entries(data), Err(Error::TruncatedInput)));
    }

    #[test]
    fn extract_by_name() -> Result<()> {
        let data = build(&MEMBERS, Directory::AfterTable);
        let mut archive = Archive::open(Cursor::new(data), Some("voice.afs"))?;
        assert_eq!(archive.by_name("se.adx")?, b"0123456789abcdef");
        assert_eq!(archive.by_name("empty.bin")?, b"");
        assert!(matches!(
            archive.by_name("missing.adx"),
            Err(Error::EntryNotFound(_))
        ));
        Ok(())
    }
}
