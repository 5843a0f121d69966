pub mod decompress;
pub mod extract;
pub mod identify;
pub mod list;

#[derive(clap::Subcommand)]
pub enum Commands {
    /// Name the format of files, descending into directories
    Identify(identify::IdentifyArgs),
    /// List the members of a file
    List(list::ListArgs),
    /// Extract the members of a file into a directory
    Extract(extract::ExtractArgs),
    /// Decode a compressed file
    Decompress(decompress::DecompressArgs),
}

impl Commands {
    pub fn handle(&self) -> miette::Result<()> {
        match self {
            Commands::Identify(identify) => identify.handle(),
            Commands::List(list) => list.handle(),
            Commands::Extract(extract) => extract.handle(),
            Commands::Decompress(decompress) => decompress.handle(),
        }
    }
}

/// File name handed to the resolver for its name patterns
pub(crate) fn file_name(path: &std::path::Path) -> Option<&str> {
    path.file_name().and_then(|name| name.to_str())
}

/// Restricts identification to one category of formats
#[derive(Debug, Copy, Clone, PartialEq, Eq, clap::ValueEnum)]
pub enum CategoryArg {
    Container,
    Compression,
}

impl From<CategoryArg> for unpak_format::Category {
    fn from(category: CategoryArg) -> Self {
        match category {
            CategoryArg::Container => unpak_format::Category::Container,
            CategoryArg::Compression => unpak_format::Category::Compression,
        }
    }
}

/// Resolves and opens the file at `path`
pub(crate) fn open(
    path: &std::path::Path,
    options: unpak_format::OpenOptions,
) -> miette::Result<unpak_format::Archive<std::io::BufReader<std::fs::File>>> {
    use miette::{Context, IntoDiagnostic};

    let file = std::fs::File::open(path)
        .into_diagnostic()
        .context(format!("path: {}", path.display()))?;
    unpak_format::Archive::open_with(std::io::BufReader::new(file), file_name(path), options)
        .context(format!("opening {}", path.display()))
}

/// Creates `path`, refusing to replace an existing file unless `overwrite` is set
pub(crate) fn create(path: &std::path::Path, overwrite: bool) -> miette::Result<std::fs::File> {
    use miette::{Context, IntoDiagnostic};

    let file = if overwrite {
        std::fs::File::create(path)
    } else {
        std::fs::File::create_new(path)
    };
    file.into_diagnostic()
        .context(format!("creating {}", path.display()))
}
