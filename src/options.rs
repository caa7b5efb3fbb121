//! Reader configuration.

/// How many padding bytes follow an entry's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Padding {
    /// Pad up to the next 512-byte boundary, nothing if already aligned.
    #[default]
    Aligned,
    /// Always consume `512 - size % 512` bytes, which is a whole extra block
    /// for content that is already block-aligned. Only useful for streams
    /// produced by tools that expect this byte consumption.
    Legacy,
}

impl Padding {
    /// Number of padding bytes after `size` bytes of content.
    #[must_use]
    pub fn after(self, size: u64) -> u64 {
        let block = crate::BLOCK_SIZE as u64;
        match self {
            Padding::Aligned => (block - size % block) % block,
            Padding::Legacy => block - size % block,
        }
    }
}

/// What to do with entry names that point outside the extraction root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PathPolicy {
    /// Strip a leading `/` and refuse names containing `..` components.
    #[default]
    Strict,
    /// Strip a leading `/` but pass `..` components through unchanged.
    Permissive,
}

/// Options controlling how an archive is read.
///
/// # Example
///
/// ```
/// use ustar_stream::{Padding, ReaderOptions};
///
/// let options = ReaderOptions {
///     padding: Padding::Legacy,
///     ..Default::default()
/// };
/// assert!(!options.verify_checksum);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderOptions {
    /// Padding arithmetic applied after each entry's content.
    ///
    /// Default: [`Padding::Aligned`].
    pub padding: Padding,

    /// Verify each header's checksum field against the block contents.
    ///
    /// Mismatches fail with [`TarError::ChecksumMismatch`].
    ///
    /// Default: `false`.
    ///
    /// [`TarError::ChecksumMismatch`]: crate::TarError::ChecksumMismatch
    pub verify_checksum: bool,

    /// Handling of `..` and absolute names during extraction.
    ///
    /// Default: [`PathPolicy::Strict`].
    pub path_policy: PathPolicy,

    /// Accept an archive that stops where a header is expected, or after a
    /// single zero block, as if the terminator were complete.
    ///
    /// When unset, the missing terminator fails with
    /// [`TarError::TruncatedHeader`] or [`TarError::StrayZeroBlock`].
    ///
    /// Default: `false`.
    ///
    /// [`TarError::TruncatedHeader`]: crate::TarError::TruncatedHeader
    /// [`TarError::StrayZeroBlock`]: crate::TarError::StrayZeroBlock
    pub allow_missing_terminator: bool,

    /// Size of the buffer used to move content to a destination or skip it.
    ///
    /// Default: 8192 bytes.
    pub chunk_size: usize,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            padding: Padding::Aligned,
            verify_checksum: false,
            path_policy: PathPolicy::Strict,
            allow_missing_terminator: false,
            chunk_size: 8192,
        }
    }
}

impl ReaderOptions {
    /// Create options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Options for untrusted archives: checksums are verified and unsafe
    /// paths are rejected.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            verify_checksum: true,
            ..Self::default()
        }
    }

    /// Options matching the historic byte consumption, path handling and
    /// end-of-archive tolerance.
    #[must_use]
    pub fn legacy() -> Self {
        Self {
            padding: Padding::Legacy,
            path_policy: PathPolicy::Permissive,
            allow_missing_terminator: true,
            ..Self::default()
        }
    }
}
