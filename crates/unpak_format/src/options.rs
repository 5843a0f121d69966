//! Settings that control how files are opened

use bon::Builder;

use crate::catalog::Category;

/// Default allocation cap for decoded output, 512 MiB
pub const DEFAULT_MAX_OUTPUT_SIZE: u64 = 512 * 1024 * 1024;

/// Options for how a file is identified and opened
///
/// ```
/// use unpak_format::{catalog::Category, OpenOptions};
///
/// let options = OpenOptions::builder()
///     .category(Category::Container)
///     .include_headers(true)
///     .build();
/// assert_eq!(options.max_output_size, unpak_format::options::DEFAULT_MAX_OUTPUT_SIZE);
/// ```
#[derive(Debug, Clone, Copy, Builder)]
pub struct OpenOptions {
    /// Largest decoded size any codec may allocate
    #[builder(default = DEFAULT_MAX_OUTPUT_SIZE)]
    pub max_output_size: u64,

    /// Expose the raw tables of CPK archives as entries
    #[builder(default)]
    pub include_headers: bool,

    /// Only consider formats of this category
    pub category: Option<Category>,
}

impl Default for OpenOptions {
    fn default() -> Self {
        OpenOptions::builder().build()
    }
}

impl OpenOptions {
    /// Rejects declared sizes above [`OpenOptions::max_output_size`]
    pub(crate) fn check_size(&self, declared: u64) -> crate::error::Result<usize> {
        if declared > self.max_output_size {
            return Err(crate::error::Error::OutputTooLarge {
                declared,
                limit: self.max_output_size,
            });
        }
        usize::try_from(declared).map_err(|_| crate::error::Error::OutputTooLarge {
            declared,
            limit: self.max_output_size,
        })
    }
}
