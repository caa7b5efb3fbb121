//! Error types for ustar archive reading.

use std::path::PathBuf;

use thiserror::Error;

use crate::reader::ReadState;

/// Errors that can occur while decoding or reading a ustar archive.
#[derive(Debug, Error)]
pub enum TarError {
    /// I/O error from the underlying archive stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended partway through a header block.
    #[error("truncated header at position {pos}")]
    TruncatedHeader {
        /// Offset of the block that could not be read completely.
        pos: u64,
    },

    /// The stream ended before an entry's content (or padding) was complete.
    #[error("truncated content at position {pos}: {missing} bytes missing")]
    TruncatedContent {
        /// Position in the stream where EOF occurred.
        pos: u64,
        /// Number of bytes that could not be read.
        missing: u64,
    },

    /// The header is not a ustar header, or uses an encoding this reader
    /// does not handle.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// A zero block was not followed by a second one.
    #[error("stray zero block at position {pos}")]
    StrayZeroBlock {
        /// Offset of the zero block.
        pos: u64,
    },

    /// A numeric header field contains something other than octal digits.
    #[error("invalid {field} field: {raw:?}")]
    InvalidNumeric {
        /// Name of the header field.
        field: &'static str,
        /// The raw field bytes.
        raw: Vec<u8>,
    },

    /// The stored header checksum does not match the computed one.
    #[error("checksum mismatch: stored {stored}, computed {computed}")]
    ChecksumMismatch {
        /// Checksum recorded in the header.
        stored: u64,
        /// Checksum computed over the header block.
        computed: u64,
    },

    /// An operation was called while the reader was in the wrong state.
    #[error("cannot {operation} while {state}")]
    InvalidOperation {
        /// The operation that was attempted.
        operation: &'static str,
        /// The state the reader was in.
        state: ReadState,
    },

    /// An entry name would escape the extraction root.
    #[error("unsafe entry path: {0:?}")]
    UnsafePath(String),

    /// Entry is too large to be held in memory.
    #[error("entry of {0} bytes does not fit in memory")]
    EntryTooLarge(u64),

    /// Creating or writing to the extraction destination failed.
    #[error("failed to write {path:?}: {source}")]
    Destination {
        /// Destination-relative path of the entry.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },
}

/// Result type for archive reading operations.
pub type Result<T> = std::result::Result<T, TarError>;
