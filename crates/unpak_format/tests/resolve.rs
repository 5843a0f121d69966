use std::io::Cursor;

use pretty_assertions::assert_eq;
use proptest::{collection::vec, prelude::*};
use unpak_format::{
    catalog::{catalog, FormatDescriptor},
    resolve::resolve,
    Archive, FormatKind, OpenOptions,
};

/// A name that satisfies only the pattern of `kind`
fn name_for(kind: FormatKind) -> Option<&'static str> {
    match kind {
        FormatKind::Lz10 => Some("stage.lz10"),
        FormatKind::Lz11 => Some("stage.lz11"),
        FormatKind::Rle => Some("font.rle"),
        FormatKind::Zlib => Some("save.zlib"),
        _ => None,
    }
}

fn signature_bearing() -> impl Iterator<Item = &'static FormatDescriptor> {
    catalog().iter().filter(|d| !d.signatures.is_empty())
}

#[test]
fn each_signature_resolves_to_its_own_format() {
    for descriptor in signature_bearing() {
        for signature in descriptor.signatures {
            let mut window = vec![0xEE; signature.extent() as usize];
            let start = signature.offset as usize;
            window[start..start + signature.bytes.len()].copy_from_slice(signature.bytes);

            let found = resolve(&mut Cursor::new(window), name_for(descriptor.kind), None)
                .unwrap()
                .map(|f| f.descriptor.kind);
            assert_eq!(found, Some(descriptor.kind), "{signature:?}");
        }
    }
}

#[test]
fn names_alone_do_not_identify_signed_formats() {
    for descriptor in signature_bearing() {
        let found = resolve(&mut Cursor::new(vec![0xEE; 16]), name_for(descriptor.kind), None)
            .unwrap();
        assert!(found.is_none(), "{} matched without its signature", descriptor.kind);
    }
}

proptest! {
    #[test]
    fn resolution_is_idempotent(
        data in vec(any::<u8>(), 0..64),
        name in prop::option::of(prop::sample::select(vec!["a.lz", "a.rle", "a.zlib", "a.bin"])),
    ) {
        let mut stream = Cursor::new(data);
        let first = resolve(&mut stream, name, None).unwrap().map(|f| f.descriptor.kind);
        let second = resolve(&mut stream, name, None).unwrap().map(|f| f.descriptor.kind);
        prop_assert_eq!(first, second);
        prop_assert_eq!(stream.position(), 0);
    }

    #[test]
    fn opening_arbitrary_bytes_never_panics(
        tag in prop::sample::select(vec![
            &b"CPK "[..], b"AFS\0", b"AFS2", b"CRILAYLA", b"Yaz0", b"LZ77\x10", b"LZSS",
            b"ERLE", b"BPE1", b"NLZ0", b"\x78\x9C", b"\x10", b"\x11", b"\x30",
        ]),
        rest in vec(any::<u8>(), 0..256),
    ) {
        let mut data = tag.to_vec();
        data.extend(rest);
        let options = OpenOptions::builder().max_output_size(1 << 16).build();
        if let Ok(mut archive) = Archive::open_with(Cursor::new(data), Some("any.lz"), options) {
            for index in 0..archive.len() {
                let _ = archive.extract_decoded(index);
            }
        }
    }
}
