use std::path::PathBuf;

use clap::Args;
use miette::{IntoDiagnostic, Result};
use owo_colors::{OwoColorize, Stream::Stdout};
use unpak_format::{EntryFlags, OpenOptions};

use super::{open, CategoryArg};

#[derive(Args)]
pub struct ListArgs {
    /// An input file
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// Print the members as JSON
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Include the container's own index tables
    #[arg(long, default_value_t = false)]
    headers: bool,

    /// Only consider formats of this category
    #[arg(short, long, value_enum)]
    category: Option<CategoryArg>,
}

/// `C`ompressed, `E`nciphered, `H`eader table, `#` numbered only
fn flag_column(flags: &EntryFlags) -> String {
    [
        (flags.compressed, 'C'),
        (flags.encrypted_header, 'E'),
        (flags.header, 'H'),
        (flags.identifier_only, '#'),
    ]
    .iter()
    .map(|(set, c)| if *set { *c } else { '-' })
    .collect()
}

impl ListArgs {
    pub fn handle(&self) -> Result<()> {
        let options = OpenOptions::builder()
            .include_headers(self.headers)
            .maybe_category(self.category.map(Into::into))
            .build();
        let archive = open(&self.file, options)?;

        if self.json {
            let json = serde_json::to_string_pretty(archive.entries()).into_diagnostic()?;
            println!("{json}");
            return Ok(());
        }

        println!(
            "{} {} with {} members",
            self.file.display(),
            archive.format().if_supports_color(Stdout, |t| t.green()),
            archive.len()
        );
        println!("{:>10} {:>10} {:>10} flags name", "offset", "size", "extracted");
        for entry in archive.entries() {
            println!(
                "{:>#10x} {:>10} {:>10} {} {}",
                entry.offset,
                entry.size,
                entry.extract_size,
                flag_column(&entry.flags),
                entry.name
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use unpak_format::EntryFlags;

    use super::flag_column;

    #[test]
    fn flags() {
        assert_eq!(flag_column(&EntryFlags::default()), "----");
        let flags = EntryFlags {
            compressed: true,
            identifier_only: true,
            ..Default::default()
        };
        assert_eq!(flag_column(&flags), "C--#");
    }
}
