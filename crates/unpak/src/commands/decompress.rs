use std::{io::Write, path::PathBuf};

use clap::Args;
use miette::{Context, IntoDiagnostic, Result};
use tracing::info;
use unpak_format::{Category, OpenOptions};
use unpak_lz::Codec;

use super::{create, open};

#[derive(Args)]
pub struct DecompressArgs {
    /// An input file
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// Where to write the decoded data
    #[arg(short, long, value_name = "FILE")]
    output: PathBuf,

    /// Decode the whole file with this codec instead of identifying its framing
    #[arg(long, value_parser = parse_codec, requires = "size")]
    codec: Option<Codec>,

    /// Decoded size for `--codec`, not counting the 0x100 byte CRILAYLA header
    #[arg(long)]
    size: Option<usize>,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

fn parse_codec(name: &str) -> std::result::Result<Codec, String> {
    Codec::ALL
        .into_iter()
        .find(|c| c.name().eq_ignore_ascii_case(name))
        .ok_or_else(|| {
            let names = Codec::ALL.map(Codec::name).join(", ");
            format!("expected one of {names}")
        })
}

impl DecompressArgs {
    pub fn handle(&self) -> Result<()> {
        let data = match self.codec {
            Some(codec) => {
                let input = std::fs::read(&self.file)
                    .into_diagnostic()
                    .context(format!("path: {}", self.file.display()))?;
                codec.decompress(&input, self.size.unwrap_or_default())?
            }
            None => {
                let options = OpenOptions::builder()
                    .category(Category::Compression)
                    .build();
                let mut archive = open(&self.file, options)?;
                info!(format = %archive.format(), "decoding");
                archive.extract_decoded(0)?
            }
        };

        info!("writing {} bytes to {}", data.len(), self.output.display());
        create(&self.output, self.overwrite)?
            .write_all(&data)
            .into_diagnostic()?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use unpak_lz::Codec;

    use super::parse_codec;

    #[test]
    fn codec_names() {
        assert_eq!(parse_codec("lz10"), Ok(Codec::Lz10));
        assert_eq!(parse_codec("CRILAYLA"), Ok(Codec::CriLayla));
        assert!(parse_codec("lzma").is_err_and(|e| e.contains("escape-rle")));
    }
}
