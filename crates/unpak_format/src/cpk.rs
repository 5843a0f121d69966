//! CPK archives, read through [`unpak_cpk`]

use tracing::instrument;
use unpak_cpk::{Cpk, CpkEntry, CpkOptions};

use crate::{
    archive::{Entry, EntryFlags},
    catalog::{Opened, ReadSeek},
    error::Result,
    OpenOptions,
};

impl From<&CpkEntry> for Entry {
    fn from(entry: &CpkEntry) -> Self {
        Entry {
            name: entry.name.clone(),
            offset: entry.offset,
            size: entry.size,
            extract_size: entry.extract_size,
            id: entry.id,
            flags: EntryFlags {
                compressed: entry.is_compressed(),
                encrypted_header: entry.encrypted_header,
                identifier_only: entry.identifier_only,
                header: entry.section.is_some(),
            },
        }
    }
}

#[instrument(skip_all, err)]
pub(crate) fn open(reader: &mut dyn ReadSeek, options: &OpenOptions) -> Result<Opened> {
    let cpk_options = CpkOptions::builder()
        .include_headers(options.include_headers)
        .build();
    let index = Cpk::read(reader, &cpk_options)?;
    Ok(Opened::Entries(index.entries().iter().map(Entry::from).collect()))
}
