//! Picks the most specific catalogued format for a stream.

use std::io::{Read, Seek, SeekFrom};

use tracing::{debug, instrument, trace};

use crate::{
    catalog::{catalog, Category, FormatDescriptor},
    error::Result,
};

/// Weight of any signature match, before adding the signature length
pub const SIGNATURE_WEIGHT: u64 = 0x10000;

/// Weight of a match on the file name alone
pub const PATTERN_WEIGHT: u64 = 1;

/// The descriptor chosen for a stream
#[derive(Debug, Copy, Clone)]
pub struct ResolvedFormat {
    pub descriptor: &'static FormatDescriptor,
    pub weight: u64,
}

fn weigh(descriptor: &FormatDescriptor, window: &[u8], file_name: Option<&str>) -> Option<u64> {
    let signature = if descriptor.signatures.is_empty() {
        None
    } else {
        // a declared signature that is absent rules the format out
        Some(descriptor.signature_match(window)?)
    };
    let pattern = descriptor.pattern_match(file_name);

    match (signature, pattern) {
        (Some(len), true) => Some(SIGNATURE_WEIGHT + len as u64),
        (Some(_), false) if descriptor.requires_both => None,
        (Some(len), false) => Some(SIGNATURE_WEIGHT + len as u64),
        (None, true) if !descriptor.requires_both => Some(PATTERN_WEIGHT),
        (None, _) => None,
    }
}

/// Reads the bytes the catalog needs, then restores the stream position
fn read_window<R: Read + Seek + ?Sized>(reader: &mut R, len: u64) -> Result<Vec<u8>> {
    let start = reader.stream_position()?;
    let mut window = Vec::new();
    let read = (&mut *reader).take(len).read_to_end(&mut window);
    reader.seek(SeekFrom::Start(start))?;
    read?;
    Ok(window)
}

/// Matches a stream against `descriptors`, first registered winning ties
///
/// Signatures are tested relative to the current stream position, which is unchanged
/// afterwards.
pub fn resolve_in<'a, R: Read + Seek + ?Sized>(
    descriptors: &'a [FormatDescriptor],
    reader: &mut R,
    file_name: Option<&str>,
    category: Option<Category>,
) -> Result<Option<(&'a FormatDescriptor, u64)>> {
    let extent = descriptors
        .iter()
        .flat_map(|d| d.signatures.iter().map(|s| s.extent()))
        .max()
        .unwrap_or(0);
    let window = read_window(reader, extent)?;

    let mut best: Option<(&FormatDescriptor, u64)> = None;
    for descriptor in descriptors {
        if category.is_some_and(|c| c != descriptor.category) {
            continue;
        }
        let Some(weight) = weigh(descriptor, &window, file_name) else {
            continue;
        };
        trace!(kind = %descriptor.kind, weight, "candidate");
        if best.map_or(true, |(_, w)| weight > w) {
            best = Some((descriptor, weight));
        }
    }
    Ok(best)
}

/// Finds the catalogued format of a stream
///
/// Returns `None` when nothing matches; the caller decides whether that is an error.
///
/// ```
/// use std::io::Cursor;
/// use unpak_format::{catalog::FormatKind, resolve::resolve};
///
/// let mut stream = Cursor::new(b"Yaz0\0\0\0\x10\0\0\0\0\0\0\0\0".to_vec());
/// let found = resolve(&mut stream, Some("model.szs"), None)?;
/// assert_eq!(found.map(|f| f.descriptor.kind), Some(FormatKind::Yaz0));
/// # Ok::<(), unpak_format::error::Error>(())
/// ```
#[instrument(skip(reader), err)]
pub fn resolve<R: Read + Seek + ?Sized>(
    reader: &mut R,
    file_name: Option<&str>,
    category: Option<Category>,
) -> Result<Option<ResolvedFormat>> {
    let found = resolve_in(catalog(), reader, file_name, category)?
        .map(|(descriptor, weight)| ResolvedFormat { descriptor, weight });
    match &found {
        Some(f) => debug!(kind = %f.descriptor.kind, weight = f.weight, "resolved format"),
        None => debug!("no format matched"),
    }
    Ok(found)
}

#[cfg(test)]
mod test {
    use std::io::{Cursor, Seek, SeekFrom};

    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    use super::{resolve, resolve_in, PATTERN_WEIGHT, SIGNATURE_WEIGHT};
    use crate::{
        catalog::{Category, FormatDescriptor, FormatKind, Opened, Signature},
        error::Result,
    };

    fn resolved(bytes: &[u8], name: Option<&str>) -> Option<FormatKind> {
        resolve(&mut Cursor::new(bytes.to_vec()), name, None)
            .unwrap()
            .map(|f| f.descriptor.kind)
    }

    #[traced_test]
    #[test]
    fn signatures_alone() {
        assert_eq!(resolved(b"CPK \xff\0\0\0", None), Some(FormatKind::Cpk));
        assert_eq!(resolved(b"AFS\0\x01\0\0\0", None), Some(FormatKind::Afs));
        assert_eq!(resolved(b"CRILAYLA", Some("x.bin")), Some(FormatKind::CriLayla));
        assert_eq!(resolved(b"plain text", None), None);
        assert_eq!(resolved(b"", None), None);
    }

    #[test]
    fn short_signatures_need_the_name() {
        let lz10 = [0x10, 0x20, 0x00, 0x00];
        assert_eq!(resolved(&lz10, None), None);
        assert_eq!(resolved(&lz10, Some("a.bin")), None);
        assert_eq!(resolved(&lz10, Some("a.lz")), Some(FormatKind::Lz10));
        assert_eq!(resolved(&[0x11, 0, 0, 0], Some("a.LZ")), Some(FormatKind::Lz11));
        assert_eq!(resolved(&[0x78, 0x9C], Some("blob.zlib")), Some(FormatKind::Zlib));
        assert_eq!(resolved(&[0x78, 0x9C], Some("blob.lz")), None);
    }

    #[test]
    fn wii_lz77_framing() {
        assert_eq!(
            resolved(b"LZ77\x10\x08\0\0", Some("a.lz")),
            Some(FormatKind::Lz77Wii)
        );
        assert_eq!(resolved(b"LZ77\x11\x08\0\0", None), None);
    }

    #[test]
    fn position_is_restored() -> Result<()> {
        let mut stream = Cursor::new(b"....Yaz0\0\0\0\0".to_vec());
        stream.seek(SeekFrom::Start(4))?;
        let found = resolve(&mut stream, None, None)?;
        assert_eq!(found.map(|f| f.descriptor.kind), Some(FormatKind::Yaz0));
        assert_eq!(stream.position(), 4);

        let found = resolve(&mut stream, None, Some(Category::Container))?;
        assert!(found.is_none());
        assert_eq!(stream.position(), 4);
        Ok(())
    }

    fn open_nothing(
        _: &mut dyn crate::catalog::ReadSeek,
        _: &crate::OpenOptions,
    ) -> Result<Opened> {
        Ok(Opened::Entries(Vec::new()))
    }

    const AB: &[Signature] = &[Signature { bytes: b"AB", offset: 0 }];
    const ABC: &[Signature] = &[Signature { bytes: b"ABC", offset: 0 }];

    fn custom() -> Vec<FormatDescriptor> {
        use Category::Container;
        use FormatKind::{Afs, Afs2, Cpk, Lz10, Zlib};
        vec![
            FormatDescriptor::new(Afs, Container, &[], &[r"\.afs$"], false, open_nothing),
            FormatDescriptor::new(Afs2, Container, AB, &[], false, open_nothing),
            FormatDescriptor::new(Cpk, Container, AB, &[], false, open_nothing),
            FormatDescriptor::new(Zlib, Container, ABC, &[], false, open_nothing),
            FormatDescriptor::new(Lz10, Container, &[], &["(unclosed"], false, open_nothing),
        ]
    }

    #[test]
    fn weights_and_ties() -> Result<()> {
        let catalog = custom();

        let (d, w) = resolve_in(&catalog, &mut Cursor::new(b"ABD"), None, None)?.unwrap();
        assert_eq!((d.kind, w), (FormatKind::Afs2, SIGNATURE_WEIGHT + 2));

        let (d, w) = resolve_in(&catalog, &mut Cursor::new(b"ABC"), None, None)?.unwrap();
        assert_eq!((d.kind, w), (FormatKind::Zlib, SIGNATURE_WEIGHT + 3));

        let (d, w) =
            resolve_in(&catalog, &mut Cursor::new(b"xyz"), Some("a.AFS"), None)?.unwrap();
        assert_eq!((d.kind, w), (FormatKind::Afs, PATTERN_WEIGHT));

        // a signature match outranks a name match
        let (d, _) =
            resolve_in(&catalog, &mut Cursor::new(b"AB"), Some("a.afs"), None)?.unwrap();
        assert_eq!(d.kind, FormatKind::Afs2);
        Ok(())
    }

    #[traced_test]
    #[test]
    fn invalid_patterns_are_skipped() {
        let catalog = custom();
        assert!(catalog[4].patterns.is_empty());
        assert!(logs_contain("skipping file name pattern"));
    }
}
