use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use clap::Args;
use miette::{Context, IntoDiagnostic, Result};
use owo_colors::{OwoColorize, Stream::Stdout};
use tracing::info;
use unpak_format::resolve::{resolve, ResolvedFormat};
use walkdir::WalkDir;

use super::{file_name, CategoryArg};

#[derive(Args)]
pub struct IdentifyArgs {
    /// Files or directories to inspect
    #[arg(value_name = "PATH", required = true)]
    paths: Vec<PathBuf>,

    /// Only consider formats of this category
    #[arg(short, long, value_enum)]
    category: Option<CategoryArg>,

    /// Also print files that no format matched
    #[arg(short, long, default_value_t = false)]
    all: bool,
}

impl IdentifyArgs {
    pub fn handle(&self) -> Result<()> {
        let (mut total, mut identified) = (0usize, 0usize);
        for root in &self.paths {
            for entry in WalkDir::new(root).sort_by_file_name() {
                let entry = entry.into_diagnostic()?;
                if !entry.file_type().is_file() {
                    continue;
                }
                total += 1;

                let path = entry.path();
                match self.identify(path)? {
                    Some(found) => {
                        identified += 1;
                        println!(
                            "{}: {} ({}, weight {:#x})",
                            path.display(),
                            found.descriptor.kind.if_supports_color(Stdout, |t| t.green()),
                            found.descriptor.category,
                            found.weight
                        );
                    }
                    None if self.all => println!(
                        "{}: {}",
                        path.display(),
                        "unrecognized".if_supports_color(Stdout, |t| t.dimmed())
                    ),
                    None => {}
                }
            }
        }
        info!(identified, total, "identified files");
        Ok(())
    }

    fn identify(&self, path: &Path) -> Result<Option<ResolvedFormat>> {
        let file = File::open(path)
            .into_diagnostic()
            .context(format!("path: {}", path.display()))?;
        let found = resolve(
            &mut BufReader::new(file),
            file_name(path),
            self.category.map(Into::into),
        )?;
        Ok(found)
    }
}
