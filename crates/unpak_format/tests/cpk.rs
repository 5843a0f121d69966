use std::io::Cursor;

use pretty_assertions::assert_eq;
use unpak_cpk::{
    fixture::{pad_to, section, TableBuilder},
    utf::Value,
};
use unpak_format::{
    error::{Error, Result},
    Archive, Category, FormatKind, OpenOptions,
};

const TOC_OFFSET: usize = 0x800;
const CONTENT_OFFSET: usize = 0x1000;
const README: &[u8] = b"hello from the toc";

/// 400 bytes of `z` behind the 0x100 byte verbatim header
fn crilayla() -> Vec<u8> {
    #[rustfmt::skip]
    let payload = [0x40, 0xEC, 0xFF, 0x7F, 0x00, 0x50, 0x8F, 0x1E, 0x3D];
    let mut stream = b"CRILAYLA".to_vec();
    stream.extend_from_slice(&400u32.to_le_bytes());
    stream.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    stream.extend_from_slice(&payload);
    stream.extend((0..=255u8).collect::<Vec<_>>());
    stream
}

fn strings(values: &[&str]) -> Vec<Value> {
    values.iter().map(|s| Value::String((*s).into())).collect()
}

fn header(files: u32) -> Vec<u8> {
    TableBuilder::new("CpkHeader", 1)
        .constant("ContentOffset", Value::U64(CONTENT_OFFSET as u64))
        .constant("TocOffset", Value::U64(TOC_OFFSET as u64))
        .constant("EtocOffset", Value::U64(0))
        .per_row("Files", vec![Value::U32(files)])
        .constant("Align", Value::U16(0x20))
        .build()
}

fn build_cpk() -> Vec<u8> {
    let bgm = crilayla();
    let bgm_offset = CONTENT_OFFSET + 0x20;

    let toc = TableBuilder::new("CpkTocInfo", 2)
        .per_row("DirName", strings(&["data", "data"]))
        .per_row("FileName", strings(&["readme.txt", "bgm.bin"]))
        .per_row(
            "FileSize",
            vec![Value::U32(README.len() as u32), Value::U32(bgm.len() as u32)],
        )
        .per_row(
            "ExtractSize",
            vec![Value::U32(README.len() as u32), Value::U32(0x100 + 400)],
        )
        .per_row(
            "FileOffset",
            vec![
                Value::U64((CONTENT_OFFSET - TOC_OFFSET) as u64),
                Value::U64((bgm_offset - TOC_OFFSET) as u64),
            ],
        )
        .per_row("ID", vec![Value::U32(0), Value::U32(1)])
        .build();

    let mut cpk = section(b"CPK ", &header(2), false);
    pad_to(&mut cpk, TOC_OFFSET);
    cpk.extend(section(b"TOC ", &toc, false));
    pad_to(&mut cpk, CONTENT_OFFSET);
    cpk.extend_from_slice(README);
    pad_to(&mut cpk, bgm_offset);
    cpk.extend(bgm);
    cpk
}

#[test]
fn lists_and_extracts_members() -> Result<()> {
    let mut archive = Archive::open(Cursor::new(build_cpk()), Some("game.cpk"))?;
    assert_eq!(archive.format(), FormatKind::Cpk);
    assert_eq!(archive.category(), Category::Container);

    let names = archive
        .entries()
        .iter()
        .map(|e| e.name.as_str())
        .collect::<Vec<_>>();
    assert_eq!(names, ["data/readme.txt", "data/bgm.bin"]);
    assert_eq!(archive.entries()[0].offset, CONTENT_OFFSET as u64);
    assert!(!archive.entries()[0].flags.compressed);
    assert!(archive.entries()[1].flags.compressed);

    assert_eq!(archive.by_name("data/readme.txt")?, README);
    Ok(())
}

#[test]
fn compressed_members_are_decoded() -> Result<()> {
    let mut archive = Archive::open(Cursor::new(build_cpk()), Some("game.cpk"))?;
    let index = archive.index_for_name("data/bgm.bin").unwrap();

    let stored = archive.extract(index)?;
    assert!(stored.starts_with(b"CRILAYLA"));
    assert_eq!(stored.len() as u64, archive.entries()[index].size);

    let decoded = archive.extract_decoded(index)?;
    assert_eq!(decoded.len(), 0x100 + 400);
    assert_eq!(decoded[..0x100], (0..=255u8).collect::<Vec<_>>());
    assert!(decoded[0x100..].iter().all(|b| *b == b'z'));
    Ok(())
}

#[test]
fn header_pseudo_entries() -> Result<()> {
    let options = OpenOptions::builder().include_headers(true).build();
    let archive = Archive::open_with(Cursor::new(build_cpk()), None, options)?;
    let listed = archive
        .entries()
        .iter()
        .map(|e| (e.name.as_str(), e.flags.header))
        .collect::<Vec<_>>();
    assert_eq!(
        listed,
        [
            ("CPK_HDR", true),
            ("TOC_HDR", true),
            ("data/readme.txt", false),
            ("data/bgm.bin", false),
        ]
    );
    assert_eq!(archive.entries()[1].offset, TOC_OFFSET as u64);
    Ok(())
}

#[test]
fn decoded_size_is_limited() -> Result<()> {
    let options = OpenOptions::builder().max_output_size(300).build();
    let mut archive = Archive::open_with(Cursor::new(build_cpk()), None, options)?;
    let index = archive.index_for_name("data/bgm.bin").unwrap();
    assert_eq!(archive.extract(index)?.len(), 9 + 0x10 + 0x100);
    assert!(matches!(
        archive.extract_decoded(index),
        Err(Error::OutputTooLarge { .. })
    ));
    Ok(())
}

#[test]
fn category_restricts_resolution() {
    let options = OpenOptions::builder()
        .category(Category::Compression)
        .build();
    let result = Archive::open_with(Cursor::new(build_cpk()), Some("game.cpk"), options);
    assert!(matches!(result, Err(Error::UnrecognizedFormat)));
}

#[test]
fn truncated_archive_is_rejected() {
    let mut data = build_cpk();
    data.truncate(data.len() - 1);
    let result = Archive::open(Cursor::new(data), None);
    assert!(matches!(result, Err(Error::Cpk(_))));
}

#[test]
fn endless_empty_rows_fail_fast() {
    let mut toc = TableBuilder::new("CpkTocInfo", 1)
        .constant("FileName", Value::String("same.bin".into()))
        .build();
    toc[0x1C..0x20].copy_from_slice(&u32::MAX.to_be_bytes());

    let mut data = section(b"CPK ", &header(1), false);
    pad_to(&mut data, TOC_OFFSET);
    data.extend(section(b"TOC ", &toc, false));

    let result = Archive::open(Cursor::new(data), Some("game.cpk"));
    assert!(matches!(
        result,
        Err(Error::Cpk(unpak_cpk::error::Error::CorruptStream(_)))
    ));
}
