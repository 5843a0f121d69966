//! AFS2, the numbered wave bank container of CRI ADX2.
//!
//! | Offset (bytes) | Field        | Description                                      |
//! |----------------|--------------|--------------------------------------------------|
//! | 0x0000         | Tag          | 4 bytes: `AFS2`                                  |
//! | 0x0004         | Version      | 1 byte                                           |
//! | 0x0005         | Offset width | 1 byte: 2 or 4                                   |
//! | 0x0006         | Id width     | 2 bytes: 2 or 4                                  |
//! | 0x0008         | Count        | 4 bytes                                          |
//! | 0x000C         | Alignment    | 2 bytes                                          |
//! | 0x000E         | Subkey       | 2 bytes: non-zero when members are scrambled     |
//! | 0x0010         | Ids          | count x id width                                 |
//! | after ids      | Offsets      | (count + 1) x offset width, the last one the end |
//!
//! Member `i` starts at its offset rounded up to the alignment and ends at offset `i + 1`.

use std::io::SeekFrom;

use binrw::BinRead;
use byteorder::{LittleEndian, ReadBytesExt};
use tracing::{debug, instrument};

use crate::{
    archive::{Entry, EntryFlags},
    catalog::{Opened, ReadSeek},
    error::{Error, Result},
    OpenOptions,
};

const HEADER_LEN: u64 = 0x10;

#[derive(BinRead, Debug, Copy, Clone, PartialEq, Eq)]
#[br(little, magic = b"AFS2")]
pub struct Afs2Header {
    pub version: u8,
    pub offset_width: u8,
    pub id_width: u16,
    pub count: u32,
    pub align: u16,
    pub subkey: u16,
}

fn read_width(reader: &mut dyn ReadSeek, width: u16, field: &str) -> Result<u64> {
    let value = match width {
        2 => reader.read_u16::<LittleEndian>().map(u64::from),
        4 => reader.read_u32::<LittleEndian>().map(u64::from),
        _ => return Err(Error::CorruptStream(format!("{field} width of {width} bytes"))),
    };
    value.map_err(Error::from_io)
}

#[instrument(skip_all, err)]
pub(crate) fn open(reader: &mut dyn ReadSeek, _options: &OpenOptions) -> Result<Opened> {
    let stream_len = reader.seek(SeekFrom::End(0))?;
    reader.rewind()?;

    let header = Afs2Header::read(&mut &mut *reader).map_err(Error::from_header)?;
    let count = header.count as u64;
    let tables_len = count * header.id_width as u64 + (count + 1) * header.offset_width as u64;
    if HEADER_LEN + tables_len > stream_len {
        return Err(Error::TruncatedInput);
    }
    if header.subkey != 0 {
        debug!(subkey = header.subkey, "members are scrambled and extracted as stored");
    }

    let ids = (0..count)
        .map(|_| read_width(reader, header.id_width, "id"))
        .collect::<Result<Vec<_>>>()?;
    let offsets = (0..=count)
        .map(|_| read_width(reader, header.offset_width as u16, "offset"))
        .collect::<Result<Vec<_>>>()?;

    let align = (header.align as u64).max(1);
    let mut entries = Vec::with_capacity(ids.len());
    for (index, id) in ids.iter().enumerate() {
        let (raw_start, end) = (offsets[index], offsets[index + 1]);
        if end < raw_start {
            return Err(Error::CorruptStream(format!(
                "member {id} ends at {end:#x} before it starts at {raw_start:#x}"
            )));
        }
        if end > stream_len {
            debug!(id, end, stream_len, "member outside the archive");
            return Err(Error::TruncatedInput);
        }
        let start = raw_start.next_multiple_of(align).min(end);
        entries.push(Entry {
            name: format!("{id:05}"),
            offset: start,
            size: end - start,
            extract_size: end - start,
            id: Some(*id),
            flags: EntryFlags {
                identifier_only: true,
                ..Default::default()
            },
        });
    }
    debug!(version = header.version, count, align, "read AFS2 directory");
    Ok(Opened::Entries(entries))
}
