//! Sequential reader for ustar tar archives.
//!
//! The crate is split into a header codec ([`header`]) that turns one
//! 512-byte block into a [`HeaderRecord`], and an [`ArchiveReader`] that
//! walks an archive stream entry by entry while enforcing the order of
//! operations: read a header, consume its content, read the next header.
//!
//! Only the ustar format is understood (including GNU headers that share the
//! `ustar` magic).  PAX and GNU extension entries, sparse files and archive
//! writing are out of scope.
//!
//! # Example
//!
//! ```
//! use ustar_stream::ArchiveReader;
//!
//! // An archive holding nothing but the terminator
//! let data = [0u8; 1024];
//! let mut reader = ArchiveReader::new(&data[..]);
//! assert!(reader.read_header().unwrap().is_none());
//! ```

pub mod error;
pub mod extract;
pub mod header;
pub mod input;
pub mod options;
pub mod reader;
mod util;


pub use error::{Result, TarError};
pub use extract::{DirDestination, Destination};
pub use header::{EntryType, HeaderRecord};
pub use input::{open_archive, Compression};
pub use options::{Padding, PathPolicy, ReaderOptions};
pub use reader::{ArchiveReader, ReadState};

/// Size of a tar block in bytes.  Headers occupy exactly one block and
/// content is padded to a multiple of it.
pub const BLOCK_SIZE: usize = 512;
