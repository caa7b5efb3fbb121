//! Sequential archive reader.

use std::fmt;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use log::{debug, trace};

use crate::error::{Result, TarError};
use crate::extract::{entry_path, DirDestination, Destination};
use crate::header::{decode, Decoded, HeaderRecord};
use crate::options::ReaderOptions;
use crate::util::{copy_exactish, CopyError};

/// Where the reader is in the header/content cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadState {
    /// The next operation must be [`ArchiveReader::read_header`].
    AwaitingHeader,
    /// A header has been read; its content must be read, skipped or
    /// extracted next.
    AwaitingContent,
    /// The terminator was reached or the reader was closed.
    Exhausted,
}

impl fmt::Display for ReadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReadState::AwaitingHeader => "awaiting a header",
            ReadState::AwaitingContent => "awaiting content",
            ReadState::Exhausted => "exhausted",
        })
    }
}

/// Sequential reader over a ustar archive stream.
///
/// The reader alternates between two steps: [`read_header`] yields the next
/// entry's header, after which the entry's content must be consumed with
/// [`read_content`], [`skip_content`] or [`extract_to_destination`] before
/// the next header can be read.  Calling an operation out of turn fails with
/// [`TarError::InvalidOperation`].
///
/// # Example
///
/// ```no_run
/// use std::fs::File;
/// use std::io::BufReader;
/// use ustar_stream::ArchiveReader;
///
/// let file = File::open("archive.tar").unwrap();
/// let mut reader = ArchiveReader::new(BufReader::new(file));
///
/// while let Some(header) = reader.read_header().unwrap() {
///     println!("{} ({} bytes)", header.name(), header.size());
///     if header.is_dir() {
///         reader.skip_content().unwrap();
///     } else {
///         let content = reader.read_content().unwrap();
///         println!("  read {} bytes", content.len());
///     }
/// }
/// ```
///
/// [`read_header`]: ArchiveReader::read_header
/// [`read_content`]: ArchiveReader::read_content
/// [`skip_content`]: ArchiveReader::skip_content
/// [`extract_to_destination`]: ArchiveReader::extract_to_destination
#[derive(Debug)]
pub struct ArchiveReader<R> {
    reader: Option<R>,
    options: ReaderOptions,
    state: ReadState,
    current: Option<HeaderRecord>,
    /// Bytes consumed from the stream so far
    pos: u64,
}

impl<R: Read> ArchiveReader<R> {
    /// Create a reader with default options.
    pub fn new(reader: R) -> Self {
        Self::with_options(reader, ReaderOptions::default())
    }

    /// Create a reader with the given options.
    pub fn with_options(reader: R, options: ReaderOptions) -> Self {
        Self {
            reader: Some(reader),
            options,
            state: ReadState::AwaitingHeader,
            current: None,
            pos: 0,
        }
    }

    /// The current state.
    #[must_use]
    pub fn state(&self) -> ReadState {
        self.state
    }

    /// Number of bytes consumed from the archive stream.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// The options this reader was created with.
    #[must_use]
    pub fn options(&self) -> &ReaderOptions {
        &self.options
    }

    /// The header whose content is pending, if any.
    #[must_use]
    pub fn current_header(&self) -> Option<&HeaderRecord> {
        self.current.as_ref()
    }

    /// Mutable access to the pending header, to override its name or size
    /// before the content is consumed.
    pub fn current_header_mut(&mut self) -> Option<&mut HeaderRecord> {
        self.current.as_mut()
    }

    /// Read the next header.
    ///
    /// Returns `Ok(None)` once the end-of-archive marker has been read; the
    /// reader is then exhausted.  A stream that stops short of the marker
    /// is an error unless [`ReaderOptions::allow_missing_terminator`] is set.
    /// Decode errors leave the state unchanged, but the archive should not be
    /// read further.
    pub fn read_header(&mut self) -> Result<Option<&HeaderRecord>> {
        self.expect_state(ReadState::AwaitingHeader, "read a header")?;
        let pos = self.pos;
        let reader = self.reader.as_mut().ok_or_else(closed)?;
        let (decoded, consumed) = decode(reader, pos, &self.options)?;
        self.pos += consumed;

        match decoded {
            Decoded::EndOfArchive => {
                self.current = None;
                self.state = ReadState::Exhausted;
                Ok(None)
            }
            Decoded::Header(header) => {
                self.state = ReadState::AwaitingContent;
                Ok(Some(&*self.current.insert(header)))
            }
        }
    }

    /// Read the pending entry's content into memory.
    ///
    /// Not allowed for directories.  For large entries prefer
    /// [`extract_to_destination`](Self::extract_to_destination).
    pub fn read_content(&mut self) -> Result<Vec<u8>> {
        let header = self.pending("read content")?;
        if header.is_dir() {
            return Err(TarError::InvalidOperation {
                operation: "read content of a directory",
                state: self.state,
            });
        }
        let size = header.size();
        let len = usize::try_from(size).map_err(|_| TarError::EntryTooLarge(size))?;

        let mut content = vec![0u8; len];
        let pos = self.pos;
        let got = crate::util::read_exactish(self.stream()?, &mut content)?;
        if got < len {
            return Err(TarError::TruncatedContent {
                pos: pos + got as u64,
                missing: (len - got) as u64,
            });
        }
        self.pos += size;

        self.skip_padding(size)?;
        self.finish_entry();
        Ok(content)
    }

    /// Discard the pending entry's content without buffering it.
    ///
    /// Directory entries carry no content, so nothing is consumed for them.
    pub fn skip_content(&mut self) -> Result<()> {
        let header = self.pending("skip content")?;
        if !header.is_dir() {
            let size = header.size();
            self.transfer(None, size)?;
            self.skip_padding(size)?;
        }
        self.finish_entry();
        Ok(())
    }

    /// Write the pending entry to `dest`.
    ///
    /// Directories are created (with their parents) without reading from the
    /// stream.  Any other entry becomes a regular file holding its content,
    /// copied in chunks of [`ReaderOptions::chunk_size`] bytes.
    pub fn extract_to_destination<D: Destination>(&mut self, dest: &mut D) -> Result<()> {
        let header = self.pending("extract an entry")?;
        let path = entry_path(header.name(), self.options.path_policy)?;
        let size = header.size();
        let destination_error = |source| TarError::Destination {
            path: path.clone(),
            source,
        };

        if header.is_dir() {
            debug!("creating directory {path:?}");
            dest.create_dir_all(&path).map_err(destination_error)?;
            self.finish_entry();
            return Ok(());
        }

        debug!("extracting {path:?} ({size} bytes)");
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            dest.create_dir_all(parent).map_err(destination_error)?;
        }
        let mut file = dest.create_file(&path).map_err(destination_error)?;
        self.transfer(Some(&mut file), size)?;
        file.flush().map_err(destination_error)?;
        self.skip_padding(size)?;
        self.finish_entry();
        Ok(())
    }

    /// Extract the pending entry below the directory at `root`.
    pub fn extract_to(&mut self, root: impl AsRef<Path>) -> Result<()> {
        let root = root.as_ref();
        let mut dest = DirDestination::open(root).map_err(|source| TarError::Destination {
            path: root.to_path_buf(),
            source,
        })?;
        self.extract_to_destination(&mut dest)
    }

    /// Release the underlying stream.  Calling this more than once is fine.
    pub fn close(&mut self) {
        self.reader = None;
        self.current = None;
        self.state = ReadState::Exhausted;
    }

    /// Get a reference to the underlying stream, unless closed.
    pub fn get_ref(&self) -> Option<&R> {
        self.reader.as_ref()
    }

    /// Consume the reader and return the underlying stream, unless closed.
    pub fn into_inner(self) -> Option<R> {
        self.reader
    }

    // =========================================================================
    // Internal helpers
    // =========================================================================

    fn expect_state(&self, wanted: ReadState, operation: &'static str) -> Result<()> {
        if self.state == wanted {
            Ok(())
        } else {
            Err(TarError::InvalidOperation {
                operation,
                state: self.state,
            })
        }
    }

    /// The header whose content is next in the stream.
    fn pending(&self, operation: &'static str) -> Result<&HeaderRecord> {
        self.expect_state(ReadState::AwaitingContent, operation)?;
        self.current.as_ref().ok_or(TarError::InvalidOperation {
            operation,
            state: self.state,
        })
    }

    fn stream(&mut self) -> Result<&mut R> {
        self.reader.as_mut().ok_or_else(closed)
    }

    fn finish_entry(&mut self) {
        self.current = None;
        self.state = ReadState::AwaitingHeader;
    }

    /// Move `len` bytes from the stream to `writer`, or discard them.
    fn transfer(&mut self, writer: Option<&mut dyn Write>, len: u64) -> Result<()> {
        let mut buf = vec![0u8; self.options.chunk_size.max(1)];
        let pos = self.pos;
        let path: PathBuf = self
            .current
            .as_ref()
            .map(|h| h.name().into())
            .unwrap_or_default();
        let done = copy_exactish(self.stream()?, writer, len, &mut buf).map_err(|e| match e {
            CopyError::Read(e) => TarError::Io(e),
            CopyError::Write(source) => TarError::Destination { path, source },
        })?;
        self.pos += done;
        trace!("transferred {done} of {len} bytes at {pos}");
        if done < len {
            return Err(TarError::TruncatedContent {
                pos: pos + done,
                missing: len - done,
            });
        }
        Ok(())
    }

    fn skip_padding(&mut self, size: u64) -> Result<()> {
        let padding = self.options.padding.after(size);
        trace!("skipping {padding} padding bytes after {size} bytes of content");
        self.transfer(None, padding)
    }
}

fn closed() -> TarError {
    TarError::InvalidOperation {
        operation: "read from a closed archive",
        state: ReadState::Exhausted,
    }
}
