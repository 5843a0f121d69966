use std::{
    io::Write,
    path::{Component, Path, PathBuf},
};

use clap::Args;
use miette::{Context, IntoDiagnostic, Result};
use tracing::{info, warn};
use unpak_format::OpenOptions;

use super::{create, open};

#[derive(Args)]
pub struct ExtractArgs {
    /// An input file
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// A target directory
    #[arg(short, long, value_name = "DIR")]
    directory: PathBuf,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,

    /// Write members as stored instead of decoding compressed ones
    #[arg(long, default_value_t = false)]
    raw: bool,

    /// Also write the container's own index tables
    #[arg(long, default_value_t = false)]
    headers: bool,
}

/// Joins a member name onto `directory`, refusing names that would leave it
fn member_path(directory: &Path, name: &str) -> Option<PathBuf> {
    let name = name.replace('\\', "/");
    let mut path = directory.to_path_buf();
    let mut pushed = false;
    for component in Path::new(&name).components() {
        match component {
            Component::Normal(part) => {
                path.push(part);
                pushed = true;
            }
            Component::CurDir => {}
            _ => return None,
        }
    }
    pushed.then_some(path)
}

impl ExtractArgs {
    pub fn handle(&self) -> Result<()> {
        let options = OpenOptions::builder().include_headers(self.headers).build();
        let mut archive = open(&self.file, options)?;

        for i in 0..archive.len() {
            let name = archive.entries()[i].name.clone();
            let Some(p) = member_path(&self.directory, &name) else {
                warn!(%name, "skipping member with an unsafe path");
                continue;
            };

            let data = if self.raw {
                archive.extract(i)
            } else {
                archive.extract_decoded(i)
            }
            .context(format!("extracting {name}"))?;

            info!("writing {}", p.display());
            if let Some(parent) = p.parent() {
                std::fs::create_dir_all(parent)
                    .into_diagnostic()
                    .context(format!("creating {}", parent.display()))?;
            }
            create(&p, self.overwrite)?
                .write_all(&data)
                .into_diagnostic()?;
        }
        Ok(())
    }
}
