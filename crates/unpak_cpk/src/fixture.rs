//! Builders for hand-assembled tables and archives, for tests of this crate and its dependents.

use crate::{
    cipher,
    utf::{Storage, Value, ValueType, HEADER_LEN, OFFSET_BASE},
};

struct ColumnSpec {
    name: String,
    storage: Storage,
    kind: ValueType,
    values: Vec<Value>,
    padded: bool,
}

/// Assembles an `@UTF` packet
pub struct TableBuilder {
    name: String,
    rows: usize,
    columns: Vec<ColumnSpec>,
}

fn intern(strings: &mut Vec<u8>, s: &str) -> u32 {
    let offset = strings.len() as u32;
    strings.extend_from_slice(s.as_bytes());
    strings.push(0);
    offset
}

fn encode(value: &Value, strings: &mut Vec<u8>, heap: &mut Vec<u8>) -> Vec<u8> {
    match value {
        Value::U8(v) => vec![*v],
        Value::I8(v) => v.to_be_bytes().to_vec(),
        Value::U16(v) => v.to_be_bytes().to_vec(),
        Value::I16(v) => v.to_be_bytes().to_vec(),
        Value::U32(v) => v.to_be_bytes().to_vec(),
        Value::I32(v) => v.to_be_bytes().to_vec(),
        Value::U64(v) => v.to_be_bytes().to_vec(),
        Value::I64(v) => v.to_be_bytes().to_vec(),
        Value::F32(v) => v.to_be_bytes().to_vec(),
        Value::String(s) => intern(strings, s).to_be_bytes().to_vec(),
        Value::Data { bytes, .. } => {
            let offset = heap.len() as u32;
            heap.extend_from_slice(bytes);
            let mut out = offset.to_be_bytes().to_vec();
            out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
            out
        }
    }
}

impl TableBuilder {
    pub fn new(name: &str, rows: usize) -> Self {
        Self {
            name: name.to_owned(),
            rows,
            columns: Vec::new(),
        }
    }

    pub fn blob(bytes: &[u8]) -> Value {
        Value::Data {
            offset: 0,
            bytes: bytes.to_vec(),
        }
    }

    fn column(
        mut self,
        name: &str,
        storage: Storage,
        kind: ValueType,
        values: Vec<Value>,
    ) -> Self {
        self.columns.push(ColumnSpec {
            name: name.to_owned(),
            storage,
            kind,
            values,
            padded: false,
        });
        self
    }

    pub fn constant(self, name: &str, value: Value) -> Self {
        let kind = value.kind();
        self.column(name, Storage::Constant, kind, vec![value])
    }

    pub fn zero(self, name: &str, kind: ValueType) -> Self {
        self.column(name, Storage::Zero, kind, Vec::new())
    }

    pub fn absent(self, name: &str, kind: ValueType) -> Self {
        self.column(name, Storage::Absent, kind, Vec::new())
    }

    pub fn per_row(self, name: &str, values: Vec<Value>) -> Self {
        assert_eq!(values.len(), self.rows, "one value per row");
        let kind = values.first().map_or(ValueType::U8, Value::kind);
        self.column(name, Storage::PerRow, kind, values)
    }

    /// Writes the last column's schema entry behind a zero byte and three padding bytes
    pub fn padded(mut self) -> Self {
        if let Some(column) = self.columns.last_mut() {
            column.padded = true;
        }
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut strings = Vec::new();
        let mut heap = Vec::new();
        let name_offset = intern(&mut strings, &self.name);

        let mut schema = Vec::new();
        for column in &self.columns {
            if column.padded {
                schema.extend_from_slice(&[0, 0, 0, 0]);
            }
            schema.push(column.storage.flags() | column.kind.flags());
            schema.extend_from_slice(&intern(&mut strings, &column.name).to_be_bytes());
            if column.storage == Storage::Constant {
                schema.extend(encode(&column.values[0], &mut strings, &mut heap));
            }
        }

        let mut rows = Vec::new();
        let mut row_length = 0;
        for row in 0..self.rows {
            let start = rows.len();
            for column in self.columns.iter().filter(|c| c.storage == Storage::PerRow) {
                rows.extend(encode(&column.values[row], &mut strings, &mut heap));
            }
            row_length = rows.len() - start;
        }

        let rows_offset = (HEADER_LEN + schema.len() - OFFSET_BASE) as u32;
        let strings_offset = rows_offset + rows.len() as u32;
        let data_offset = strings_offset + strings.len() as u32;
        let table_size = data_offset + heap.len() as u32;

        let mut packet = b"@UTF".to_vec();
        for field in [table_size, rows_offset, strings_offset, data_offset, name_offset] {
            packet.extend_from_slice(&field.to_be_bytes());
        }
        packet.extend_from_slice(&(self.columns.len() as u16).to_be_bytes());
        packet.extend_from_slice(&(row_length as u16).to_be_bytes());
        packet.extend_from_slice(&(self.rows as u32).to_be_bytes());
        packet.extend(schema);
        packet.extend(rows);
        packet.extend(strings);
        packet.extend(heap);
        packet
    }
}

/// Wraps a packet in the 16-byte section envelope, optionally enciphering it
pub fn section(tag: &[u8; 4], packet: &[u8], encipher: bool) -> Vec<u8> {
    let mut body = packet.to_vec();
    if encipher {
        cipher::decipher(&mut body);
    }
    let mut out = tag.to_vec();
    out.extend_from_slice(&0xFFu32.to_le_bytes());
    out.extend_from_slice(&(body.len() as u64).to_le_bytes());
    out.extend(body);
    out
}

/// Pads `data` with zeroes up to `len`
pub fn pad_to(data: &mut Vec<u8>, len: usize) {
    assert!(data.len() <= len, "fixture sections overlap");
    data.resize(len, 0);
}
