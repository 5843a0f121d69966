//! Types for reading `@UTF` tables
//!
//! All multi-byte values in a table are big-endian. The four region offsets in the header are
//! relative to [`OFFSET_BASE`], the end of the tag and table size.

use std::{io::Cursor, ops::Range};

use binrw::BinRead;
use byteorder::{BigEndian, ByteOrder};
use tracing::{debug, instrument};

use crate::error::{Error, Result};

/// Distance from the start of a packet to the origin of its region offsets
pub const OFFSET_BASE: usize = 8;

/// Size of [`UtfHeader`] on disk, the column schema follows directly
pub const HEADER_LEN: usize = 0x20;

/// Fixed table header
#[derive(BinRead, Debug, Copy, Clone, PartialEq, Eq)]
#[br(magic = b"@UTF", big)]
pub struct UtfHeader {
    /// Size of the table after the first 8 bytes
    pub table_size: u32,

    /// Start of the row region
    pub rows_offset: u32,

    /// Start of the string heap
    pub strings_offset: u32,

    /// Start of the data heap
    pub data_offset: u32,

    /// String heap reference of the table name
    pub name_offset: u32,

    /// Number of columns in the schema
    pub column_count: u16,

    /// Bytes occupied by one row in the row region
    pub row_length: u16,

    /// Number of rows
    pub row_count: u32,
}

/// Where the values of a column live
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Storage {
    /// No value at all
    Absent,
    /// Every row reads as zero
    Zero,
    /// One value, stored in the schema, shared by all rows
    Constant,
    /// One value per row, stored in the row region
    PerRow,
}

impl Storage {
    fn from_flags(flags: u8) -> Option<Self> {
        match flags & 0xF0 {
            0x00 => Some(Storage::Absent),
            0x10 => Some(Storage::Zero),
            0x30 => Some(Storage::Constant),
            0x50 => Some(Storage::PerRow),
            _ => None,
        }
    }

    /// Storage class bits of a schema byte
    pub fn flags(self) -> u8 {
        match self {
            Storage::Absent => 0x00,
            Storage::Zero => 0x10,
            Storage::Constant => 0x30,
            Storage::PerRow => 0x50,
        }
    }
}

/// Declared type of a column
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ValueType {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
    /// Reference into the string heap
    String,
    /// Offset and size pair into the data heap
    Data,
}

impl ValueType {
    fn from_flags(flags: u8) -> Option<Self> {
        Some(match flags & 0x0F {
            0x0 => ValueType::U8,
            0x1 => ValueType::I8,
            0x2 => ValueType::U16,
            0x3 => ValueType::I16,
            0x4 => ValueType::U32,
            0x5 => ValueType::I32,
            0x6 => ValueType::U64,
            0x7 => ValueType::I64,
            0x8 => ValueType::F32,
            0xA => ValueType::String,
            0xB => ValueType::Data,
            _ => return None,
        })
    }

    /// Type bits of a schema byte
    pub fn flags(self) -> u8 {
        match self {
            ValueType::U8 => 0x0,
            ValueType::I8 => 0x1,
            ValueType::U16 => 0x2,
            ValueType::I16 => 0x3,
            ValueType::U32 => 0x4,
            ValueType::I32 => 0x5,
            ValueType::U64 => 0x6,
            ValueType::I64 => 0x7,
            ValueType::F32 => 0x8,
            ValueType::String => 0xA,
            ValueType::Data => 0xB,
        }
    }

    /// Bytes a value of this type occupies in a row or in the schema
    pub fn width(self) -> usize {
        match self {
            ValueType::U8 | ValueType::I8 => 1,
            ValueType::U16 | ValueType::I16 => 2,
            ValueType::U32 | ValueType::I32 | ValueType::F32 | ValueType::String => 4,
            ValueType::U64 | ValueType::I64 | ValueType::Data => 8,
        }
    }
}

/// A decoded table value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    U8(u8),
    I8(i8),
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    U64(u64),
    I64(i64),
    F32(f32),
    String(String),
    /// A blob from the data heap and its absolute position in the stream
    Data { offset: u64, bytes: Vec<u8> },
}

impl Value {
    fn zero(kind: ValueType) -> Self {
        match kind {
            ValueType::U8 => Value::U8(0),
            ValueType::I8 => Value::I8(0),
            ValueType::U16 => Value::U16(0),
            ValueType::I16 => Value::I16(0),
            ValueType::U32 => Value::U32(0),
            ValueType::I32 => Value::I32(0),
            ValueType::U64 => Value::U64(0),
            ValueType::I64 => Value::I64(0),
            ValueType::F32 => Value::F32(0.0),
            ValueType::String => Value::String(String::new()),
            ValueType::Data => Value::Data {
                offset: 0,
                bytes: Vec::new(),
            },
        }
    }

    /// Type of this value
    pub fn kind(&self) -> ValueType {
        match self {
            Value::U8(_) => ValueType::U8,
            Value::I8(_) => ValueType::I8,
            Value::U16(_) => ValueType::U16,
            Value::I16(_) => ValueType::I16,
            Value::U32(_) => ValueType::U32,
            Value::I32(_) => ValueType::I32,
            Value::U64(_) => ValueType::U64,
            Value::I64(_) => ValueType::I64,
            Value::F32(_) => ValueType::F32,
            Value::String(_) => ValueType::String,
            Value::Data { .. } => ValueType::Data,
        }
    }

    /// Widens any non-negative integer
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Value::U8(v) => Some(v.into()),
            Value::U16(v) => Some(v.into()),
            Value::U32(v) => Some(v.into()),
            Value::U64(v) => Some(v),
            Value::I8(v) => u64::try_from(v).ok(),
            Value::I16(v) => u64::try_from(v).ok(),
            Value::I32(v) => u64::try_from(v).ok(),
            Value::I64(v) => u64::try_from(v).ok(),
            Value::F32(_) | Value::String(_) | Value::Data { .. } => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Data { bytes, .. } => Some(bytes),
            _ => None,
        }
    }
}

/// One entry of the column schema
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub storage: Storage,
    pub kind: ValueType,
    /// The shared value of [`Storage::Constant`] and [`Storage::Zero`] columns
    pub constant: Option<Value>,
}

/// A value stored in the row region
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub value: Value,
    /// Absolute stream position of the value
    pub position: u64,
}

/// Bounds of the regions of one packet
struct Packet<'a> {
    data: &'a [u8],
    position: u64,
    strings: Range<usize>,
    heap: Range<usize>,
}

impl Packet<'_> {
    fn bytes(&self, at: usize, len: usize) -> Result<&[u8]> {
        self.data
            .get(at..at.checked_add(len).ok_or(Error::TruncatedInput)?)
            .ok_or(Error::TruncatedInput)
    }

    fn string(&self, reference: u32) -> Result<String> {
        let start = self
            .strings
            .start
            .checked_add(reference as usize)
            .filter(|start| *start < self.strings.end)
            .ok_or_else(|| {
                Error::CorruptStream(format!("string reference {reference:#x} outside the heap"))
            })?;
        let heap = &self.data[start..self.strings.end];
        let len = heap.iter().position(|&b| b == 0).unwrap_or(heap.len());
        Ok(String::from_utf8_lossy(&heap[..len]).into_owned())
    }

    fn blob(&self, offset: u32, size: u32) -> Result<Value> {
        let start = self.heap.start.checked_add(offset as usize);
        let end = start.and_then(|s| s.checked_add(size as usize));
        match (start, end) {
            (Some(start), Some(end)) if end <= self.heap.end => Ok(Value::Data {
                offset: self.position + start as u64,
                bytes: self.data[start..end].to_vec(),
            }),
            _ => Err(Error::CorruptStream(format!(
                "data reference {offset:#x}+{size:#x} outside the heap"
            ))),
        }
    }

    fn value(&self, at: usize, kind: ValueType) -> Result<Value> {
        let raw = self.bytes(at, kind.width())?;
        Ok(match kind {
            ValueType::U8 => Value::U8(raw[0]),
            ValueType::I8 => Value::I8(raw[0] as i8),
            ValueType::U16 => Value::U16(BigEndian::read_u16(raw)),
            ValueType::I16 => Value::I16(BigEndian::read_i16(raw)),
            ValueType::U32 => Value::U32(BigEndian::read_u32(raw)),
            ValueType::I32 => Value::I32(BigEndian::read_i32(raw)),
            ValueType::U64 => Value::U64(BigEndian::read_u64(raw)),
            ValueType::I64 => Value::I64(BigEndian::read_i64(raw)),
            ValueType::F32 => Value::F32(BigEndian::read_f32(raw)),
            ValueType::String => Value::String(self.string(BigEndian::read_u32(raw))?),
            ValueType::Data => {
                self.blob(BigEndian::read_u32(raw), BigEndian::read_u32(&raw[4..]))?
            }
        })
    }
}

/// A parsed `@UTF` table
///
/// ```
/// # fn doit(packet: &[u8]) -> unpak_cpk::error::Result<()> {
/// let table = unpak_cpk::UtfTable::parse(packet, 0)?;
/// for row in 0..table.row_count() {
///     println!("{:?}", table.get_str(row, "FileName"));
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct UtfTable {
    name: String,
    header: UtfHeader,
    position: u64,
    columns: Vec<Column>,
    row_count: usize,
    /// Empty when no column is stored per row
    rows: Vec<Vec<Option<Cell>>>,
}

impl UtfTable {
    /// Parses a deciphered packet that starts with `@UTF`
    ///
    /// `position` is the absolute stream offset of the packet, used for [`Cell::position`] and
    /// the offsets of data blobs.
    #[instrument(skip(packet), fields(packet_len = packet.len()), err)]
    pub fn parse(packet: &[u8], position: u64) -> Result<UtfTable> {
        let header = UtfHeader::read(&mut Cursor::new(packet)).map_err(|e| {
            if matches!(e.root_cause(), binrw::Error::BadMagic { .. }) {
                Error::bad_signature(b"@UTF")
            } else {
                Error::from_read(e)
            }
        })?;

        let region = |offset: u32| OFFSET_BASE + offset as usize;
        let table_end = region(header.table_size);
        let rows_start = region(header.rows_offset);
        let strings_start = region(header.strings_offset);
        let data_start = region(header.data_offset);
        if table_end > packet.len() {
            return Err(Error::TruncatedInput);
        }
        if !(HEADER_LEN <= rows_start
            && rows_start <= strings_start
            && strings_start <= data_start
            && data_start <= table_end)
        {
            return Err(Error::CorruptStream(format!(
                "regions out of order: rows {rows_start:#x}, strings {strings_start:#x}, data {data_start:#x}, end {table_end:#x}"
            )));
        }

        let row_length = usize::from(header.row_length);
        let row_count = header.row_count as usize;
        let rows_end = row_count
            .checked_mul(row_length)
            .and_then(|len| len.checked_add(rows_start))
            .filter(|end| *end <= strings_start)
            .ok_or_else(|| {
                Error::CorruptStream(format!(
                    "{row_count} rows of {row_length} bytes overrun the row region"
                ))
            })?;
        // rows without stored values take no space, so only the packet size bounds them
        if row_length == 0 && row_count > table_end {
            return Err(Error::CorruptStream(format!(
                "{row_count} empty rows in a {table_end} byte table"
            )));
        }

        let packet = Packet {
            data: &packet[..table_end],
            position,
            strings: strings_start..data_start,
            heap: data_start..table_end,
        };

        let name = packet.string(header.name_offset)?;
        let columns = Self::read_schema(&packet, &header, rows_start)?;

        let stored_rows = if columns.iter().any(|c| c.storage == Storage::PerRow) {
            row_count
        } else {
            0
        };
        let mut rows = Vec::with_capacity(stored_rows);
        for row in 0..stored_rows {
            let mut at = rows_start + row * row_length;
            let row_end = at + row_length;
            let mut cells = Vec::with_capacity(columns.len());
            for column in &columns {
                if column.storage != Storage::PerRow {
                    cells.push(None);
                    continue;
                }
                if at + column.kind.width() > row_end {
                    return Err(Error::CorruptStream(format!(
                        "column {} overruns row {row}",
                        column.name
                    )));
                }
                cells.push(Some(Cell {
                    value: packet.value(at, column.kind)?,
                    position: position + at as u64,
                }));
                at += column.kind.width();
            }
            rows.push(cells);
        }

        debug!(
            table = %name,
            columns = columns.len(),
            rows = row_count,
            rows_end,
            "parsed utf table"
        );

        Ok(UtfTable {
            name,
            header,
            position,
            columns,
            row_count,
            rows,
        })
    }

    fn read_schema(
        packet: &Packet<'_>,
        header: &UtfHeader,
        rows_start: usize,
    ) -> Result<Vec<Column>> {
        let mut at = HEADER_LEN;
        let mut columns = Vec::with_capacity(usize::from(header.column_count));
        for index in 0..usize::from(header.column_count) {
            let mut flags = packet.bytes(at, 1)?[0];
            at += 1;
            if flags == 0 {
                flags = packet.bytes(at + 3, 1)?[0];
                at += 4;
            }

            let unsupported = || Error::UnsupportedEncoding {
                flags,
                column: index,
            };
            let storage = Storage::from_flags(flags).ok_or_else(unsupported)?;
            let kind = ValueType::from_flags(flags).ok_or_else(unsupported)?;

            let name = packet.string(BigEndian::read_u32(packet.bytes(at, 4)?))?;
            at += 4;

            let constant = match storage {
                Storage::Constant => {
                    let value = packet.value(at, kind)?;
                    at += kind.width();
                    Some(value)
                }
                Storage::Zero => Some(Value::zero(kind)),
                Storage::Absent | Storage::PerRow => None,
            };

            columns.push(Column {
                name,
                storage,
                kind,
                constant,
            });
        }

        if at > rows_start {
            return Err(Error::CorruptStream(format!(
                "column schema ends at {at:#x}, after the row region at {rows_start:#x}"
            )));
        }
        Ok(columns)
    }

    /// Name of the table from the string heap
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn header(&self) -> &UtfHeader {
        &self.header
    }

    /// Absolute stream position of the packet
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// The per-row cell of a column, `None` for columns not stored per row
    pub fn cell(&self, row: usize, column: usize) -> Option<&Cell> {
        self.rows.get(row)?.get(column)?.as_ref()
    }

    /// Values stored in the row region for `row`
    pub fn cells(&self, row: usize) -> impl Iterator<Item = &Cell> {
        self.rows.get(row).into_iter().flatten().flatten()
    }

    /// Value of `column` in `row`, resolving constant and zero columns
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        if row >= self.row_count {
            return None;
        }
        let index = self.column_index(column)?;
        match self.columns[index].storage {
            Storage::PerRow => self.cell(row, index).map(|c| &c.value),
            Storage::Constant | Storage::Zero => self.columns[index].constant.as_ref(),
            Storage::Absent => None,
        }
    }

    pub fn get_u64(&self, row: usize, column: &str) -> Option<u64> {
        self.get(row, column)?.as_u64()
    }

    pub fn get_str(&self, row: usize, column: &str) -> Option<&str> {
        self.get(row, column)?.as_str()
    }

    pub fn get_data(&self, row: usize, column: &str) -> Option<&[u8]> {
        self.get(row, column)?.as_bytes()
    }

    /// Absolute position of a per-row value, for patching it in place
    pub fn position_of(&self, row: usize, column: &str) -> Option<u64> {
        self.cell(row, self.column_index(column)?).map(|c| c.position)
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    use super::{Storage, UtfTable, Value, ValueType, HEADER_LEN};
    use crate::{
        error::{Error, Result},
        fixture::TableBuilder,
    };

    fn demo() -> Vec<u8> {
        TableBuilder::new("Demo", 2)
            .constant("Version", Value::U16(7))
            .per_row(
                "Name",
                vec![Value::String("a.bin".into()), Value::String("b.bin".into())],
            )
            .per_row("Size", vec![Value::U32(10), Value::U32(20)])
            .per_row(
                "Blob",
                vec![TableBuilder::blob(b"xyz"), TableBuilder::blob(b"")],
            )
            .build()
    }

    #[traced_test]
    #[test]
    fn reads_rows_and_constants() -> Result<()> {
        let table = UtfTable::parse(&demo(), 0x100)?;

        assert_eq!(table.name(), "Demo");
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.columns().len(), 4);
        assert_eq!(table.get(0, "Version"), Some(&Value::U16(7)));
        assert_eq!(table.get(1, "Version"), Some(&Value::U16(7)));
        assert_eq!(table.get_str(1, "Name"), Some("b.bin"));
        assert_eq!(table.get_u64(0, "Size"), Some(10));
        assert_eq!(table.get_data(0, "Blob"), Some(&b"xyz"[..]));
        assert_eq!(table.get_data(1, "Blob"), Some(&b""[..]));
        assert_eq!(table.get(2, "Size"), None);
        assert_eq!(table.get(0, "Missing"), None);
        Ok(())
    }

    #[test]
    fn records_value_positions() -> Result<()> {
        let table = UtfTable::parse(&demo(), 0x100)?;

        // schema: three 5-byte entries plus the constant column carrying its u16
        let rows_start = HEADER_LEN as u64 + 5 * 4 + 2;
        let row_length = 4 + 4 + 8;
        assert_eq!(u64::from(table.header().row_length), row_length);
        assert_eq!(table.position_of(0, "Name"), Some(0x100 + rows_start));
        assert_eq!(
            table.position_of(1, "Size"),
            Some(0x100 + rows_start + row_length + 4)
        );
        assert_eq!(table.position_of(0, "Version"), None);
        Ok(())
    }

    #[test]
    fn constant_columns_read_nothing_per_row() -> Result<()> {
        let packet = TableBuilder::new("Consts", 3)
            .constant("A", Value::U32(1))
            .constant("B", Value::String("shared".into()))
            .build();
        let table = UtfTable::parse(&packet, 0)?;

        assert_eq!(table.row_count(), 3);
        assert_eq!(table.header().row_length, 0);
        for row in 0..3 {
            assert_eq!(table.cells(row).count(), 0);
            assert_eq!(table.get_str(row, "B"), Some("shared"));
        }
        Ok(())
    }

    #[test]
    fn empty_rows_are_bounded_by_the_table() -> Result<()> {
        let mut packet = TableBuilder::new("Consts", 1)
            .constant("A", Value::U32(1))
            .build();

        packet[0x1C..0x20].copy_from_slice(&u32::MAX.to_be_bytes());
        assert!(matches!(
            UtfTable::parse(&packet, 0),
            Err(Error::CorruptStream(_))
        ));

        let rows = packet.len();
        packet[0x1C..0x20].copy_from_slice(&(rows as u32).to_be_bytes());
        let table = UtfTable::parse(&packet, 0)?;
        assert_eq!(table.row_count(), rows);
        assert_eq!(table.get_u64(rows - 1, "A"), Some(1));
        assert_eq!(table.get(rows, "A"), None);
        assert_eq!(table.cells(0).count(), 0);
        Ok(())
    }

    #[test]
    fn zero_and_absent_columns() -> Result<()> {
        let packet = TableBuilder::new("Sparse", 1)
            .zero("Zero", ValueType::U64)
            .absent("Gone", ValueType::String)
            .build();
        let table = UtfTable::parse(&packet, 0)?;

        assert_eq!(table.columns()[0].storage, Storage::Zero);
        assert_eq!(table.get_u64(0, "Zero"), Some(0));
        assert_eq!(table.get(0, "Gone"), None);
        Ok(())
    }

    #[test]
    fn padded_schema_entry() -> Result<()> {
        let packet = TableBuilder::new("Padded", 1)
            .per_row("Id", vec![Value::U16(42)])
            .padded()
            .build();
        let table = UtfTable::parse(&packet, 0)?;

        assert_eq!(table.columns()[0].name, "Id");
        assert_eq!(table.get_u64(0, "Id"), Some(42));
        Ok(())
    }

    #[test]
    fn signed_values_do_not_widen_when_negative() -> Result<()> {
        let packet = TableBuilder::new("Signed", 1)
            .per_row("Neg", vec![Value::I32(-1)])
            .per_row("Pos", vec![Value::I16(5)])
            .build();
        let table = UtfTable::parse(&packet, 0)?;

        assert_eq!(table.get_u64(0, "Neg"), None);
        assert_eq!(table.get_u64(0, "Pos"), Some(5));
        Ok(())
    }

    #[test]
    fn unknown_type_is_unsupported() {
        let mut packet = demo();
        packet[HEADER_LEN] = 0x5C;
        assert!(matches!(
            UtfTable::parse(&packet, 0),
            Err(Error::UnsupportedEncoding { flags: 0x5C, column: 0 })
        ));
    }

    #[test]
    fn unknown_storage_is_unsupported() {
        let mut packet = demo();
        packet[HEADER_LEN] = 0x72;
        assert!(matches!(
            UtfTable::parse(&packet, 0),
            Err(Error::UnsupportedEncoding { flags: 0x72, .. })
        ));
    }

    #[test]
    fn missing_tag_is_bad_signature() {
        let mut packet = demo();
        packet[0] = b'#';
        assert!(matches!(
            UtfTable::parse(&packet, 0),
            Err(Error::BadSignature { .. })
        ));
    }

    #[test]
    fn short_packet_is_truncated() {
        let packet = demo();
        assert!(matches!(
            UtfTable::parse(&packet[..packet.len() - 1], 0),
            Err(Error::TruncatedInput)
        ));
        assert!(matches!(
            UtfTable::parse(&packet[..10], 0),
            Err(Error::TruncatedInput)
        ));
    }

    #[test]
    fn row_overrun_is_corrupt() {
        let mut packet = demo();
        // shrink the row length below the 16 bytes the schema needs
        packet[26..28].copy_from_slice(&2u16.to_be_bytes());
        assert!(matches!(
            UtfTable::parse(&packet, 0),
            Err(Error::CorruptStream(_))
        ));
    }
}
