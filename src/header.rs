//! Zerocopy-based ustar header decoding.
//!
//! Every header occupies one 512-byte block with the following layout:
//!
//! | Offset | Size | Field     | Description                              |
//! |--------|------|-----------|------------------------------------------|
//! | 0      | 100  | name      | File path (null-terminated if < 100)     |
//! | 100    | 8    | mode      | File mode in octal ASCII                 |
//! | 108    | 8    | uid       | Owner user ID in octal ASCII             |
//! | 116    | 8    | gid       | Owner group ID in octal ASCII            |
//! | 124    | 12   | size      | File size in octal ASCII                 |
//! | 136    | 12   | mtime     | Modification time (Unix epoch, octal)    |
//! | 148    | 8    | checksum  | Header checksum in octal ASCII           |
//! | 156    | 1    | typeflag  | Entry type (see [`EntryType`])           |
//! | 157    | 100  | linkname  | Link target for hard/symbolic links      |
//! | 257    | 6    | magic     | "ustar\0" (or GNU "ustar ")              |
//! | 263    | 2    | version   | "00"                                     |
//! | 265    | 32   | uname     | Owner user name                          |
//! | 297    | 32   | gname     | Owner group name                         |
//! | 329    | 8    | devmajor  | Device major number                      |
//! | 337    | 8    | devminor  | Device minor number                      |
//! | 345    | 155  | prefix    | Path prefix for long names               |
//! | 500    | 12   | pad       | Unused                                   |
//!
//! An archive ends with two consecutive all-zero blocks.

use std::fmt;
use std::io::Read;

use log::{debug, warn};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::error::{Result, TarError};
use crate::options::ReaderOptions;
use crate::util::read_exactish;
use crate::BLOCK_SIZE;

/// The magic tag every accepted header carries, once NULs and spaces are trimmed.
pub const USTAR_MAGIC: &[u8] = b"ustar";

/// Raw ustar header block with named fields.
#[derive(Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct UstarHeader {
    /// File path name (null-terminated if shorter than 100 bytes).
    pub name: [u8; 100],
    /// File mode in octal ASCII.
    pub mode: [u8; 8],
    /// Owner user ID in octal ASCII.
    pub uid: [u8; 8],
    /// Owner group ID in octal ASCII.
    pub gid: [u8; 8],
    /// File size in octal ASCII.
    pub size: [u8; 12],
    /// Modification time as Unix timestamp in octal ASCII.
    pub mtime: [u8; 12],
    /// Header checksum in octal ASCII.
    pub checksum: [u8; 8],
    /// Entry type flag.
    pub typeflag: u8,
    /// Link target name for hard/symbolic links.
    pub linkname: [u8; 100],
    /// Magic string identifying the format.
    pub magic: [u8; 6],
    /// Format version.
    pub version: [u8; 2],
    /// Owner user name (null-terminated).
    pub uname: [u8; 32],
    /// Owner group name (null-terminated).
    pub gname: [u8; 32],
    /// Device major number in octal ASCII.
    pub devmajor: [u8; 8],
    /// Device minor number in octal ASCII.
    pub devminor: [u8; 8],
    /// Path prefix for names longer than 100 bytes.
    pub prefix: [u8; 155],
    /// Padding to fill the 512-byte block.
    pub pad: [u8; 12],
}

impl UstarHeader {
    /// Compute the header checksum.
    ///
    /// This is the unsigned sum of all header bytes, treating the checksum
    /// field (bytes 148..156) as spaces (0x20).
    #[must_use]
    pub fn compute_checksum(&self) -> u64 {
        self.as_bytes()
            .iter()
            .enumerate()
            .map(|(i, &byte)| {
                if (148..156).contains(&i) {
                    u64::from(b' ')
                } else {
                    u64::from(byte)
                }
            })
            .sum()
    }
}

impl fmt::Debug for UstarHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UstarHeader")
            .field("name", &String::from_utf8_lossy(truncate_null(&self.name)))
            .field("mode", &String::from_utf8_lossy(truncate_null(&self.mode)))
            .field("typeflag", &self.typeflag)
            .field("magic", &self.magic)
            .finish_non_exhaustive()
    }
}

/// Tar entry type indicating the kind of file system object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntryType {
    /// Regular file (type '0' or '\0' for old tar compatibility).
    Regular,
    /// Hard link to another file in the archive (type '1').
    Link,
    /// Symbolic link (type '2').
    Symlink,
    /// Character device (type '3').
    Char,
    /// Block device (type '4').
    Block,
    /// Directory (type '5').
    Directory,
    /// FIFO/named pipe (type '6').
    Fifo,
    /// Contiguous file (type '7', reserved).
    Continuous,
    /// Anything else.
    Other(u8),
}

impl EntryType {
    /// Parse an entry type from a raw byte value.
    #[must_use]
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            b'0' | b'\0' => EntryType::Regular,
            b'1' => EntryType::Link,
            b'2' => EntryType::Symlink,
            b'3' => EntryType::Char,
            b'4' => EntryType::Block,
            b'5' => EntryType::Directory,
            b'6' => EntryType::Fifo,
            b'7' => EntryType::Continuous,
            other => EntryType::Other(other),
        }
    }

    /// Returns true if this is a directory entry.
    #[must_use]
    pub fn is_dir(self) -> bool {
        self == EntryType::Directory
    }

    /// Single-character tag used in listings.
    #[must_use]
    pub fn tag(self) -> char {
        match self {
            EntryType::Regular | EntryType::Continuous => '-',
            EntryType::Link => 'h',
            EntryType::Symlink => 'l',
            EntryType::Char => 'c',
            EntryType::Block => 'b',
            EntryType::Directory => 'd',
            EntryType::Fifo => 'p',
            EntryType::Other(_) => '?',
        }
    }
}

impl From<u8> for EntryType {
    fn from(byte: u8) -> Self {
        Self::from_byte(byte)
    }
}

/// A decoded ustar header.
///
/// All fields are kept verbatim in [`raw`](HeaderRecord::raw); `name` and
/// `size` are decoded eagerly because reading the archive depends on them.
/// Both may be overridden before the entry's content is consumed.
#[derive(Clone)]
pub struct HeaderRecord {
    raw: UstarHeader,
    name: String,
    size: u64,
}

impl HeaderRecord {
    /// Decode a header from a block that is already known not to be zero.
    ///
    /// # Errors
    ///
    /// Returns [`TarError::UnsupportedFormat`] for a non-ustar magic or a
    /// base-256 size, [`TarError::InvalidNumeric`] for a malformed size.
    pub fn from_block(block: &[u8; BLOCK_SIZE]) -> Result<Self> {
        let raw: UstarHeader = zerocopy::transmute!(*block);

        if trim_field(&raw.magic) != USTAR_MAGIC {
            return Err(TarError::UnsupportedFormat(format!(
                "can only read ustar, not {:?}",
                String::from_utf8_lossy(&raw.magic)
            )));
        }

        if raw.size[0] & 0x80 != 0 {
            return Err(TarError::UnsupportedFormat(
                "only octal file sizes are supported".to_string(),
            ));
        }
        let size = parse_octal(&raw.size[..11]).ok_or_else(|| TarError::InvalidNumeric {
            field: "size",
            raw: raw.size.to_vec(),
        })?;

        let name = String::from_utf8_lossy(truncate_null(&raw.name))
            .trim_end_matches(' ')
            .to_string();

        Ok(Self { raw, name, size })
    }

    /// The raw header fields.
    #[must_use]
    pub fn raw(&self) -> &UstarHeader {
        &self.raw
    }

    /// Entry name, without the ustar prefix.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Override the entry name.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Entry name with the ustar prefix field prepended, if there is one.
    #[must_use]
    pub fn full_name(&self) -> String {
        let prefix = truncate_null(&self.raw.prefix);
        if prefix.is_empty() {
            self.name.clone()
        } else {
            format!("{}/{}", String::from_utf8_lossy(prefix), self.name)
        }
    }

    /// Content size in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Override the content size.
    pub fn set_size(&mut self, size: u64) {
        self.size = size;
    }

    /// The entry type.
    #[must_use]
    pub fn entry_type(&self) -> EntryType {
        EntryType::from_byte(self.raw.typeflag)
    }

    /// Returns true for directory entries.
    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.entry_type().is_dir()
    }

    /// File mode (permissions).
    pub fn mode(&self) -> Result<u32> {
        numeric_u32("mode", &self.raw.mode)
    }

    /// Owner user ID.
    pub fn uid(&self) -> Result<u64> {
        numeric("uid", &self.raw.uid)
    }

    /// Owner group ID.
    pub fn gid(&self) -> Result<u64> {
        numeric("gid", &self.raw.gid)
    }

    /// Modification time as a Unix timestamp.
    pub fn mtime(&self) -> Result<u64> {
        numeric("mtime", &self.raw.mtime)
    }

    /// The checksum stored in the header.
    pub fn checksum(&self) -> Result<u64> {
        numeric("checksum", &self.raw.checksum)
    }

    /// Device major number.
    pub fn device_major(&self) -> Result<u32> {
        numeric_u32("devmajor", &self.raw.devmajor)
    }

    /// Device minor number.
    pub fn device_minor(&self) -> Result<u32> {
        numeric_u32("devminor", &self.raw.devminor)
    }

    /// Raw link name bytes.
    #[must_use]
    pub fn link_name_bytes(&self) -> &[u8] {
        truncate_null(&self.raw.linkname)
    }

    /// Owner user name bytes.
    #[must_use]
    pub fn username(&self) -> &[u8] {
        truncate_null(&self.raw.uname)
    }

    /// Owner group name bytes.
    #[must_use]
    pub fn groupname(&self) -> &[u8] {
        truncate_null(&self.raw.gname)
    }

    /// Check the stored checksum against the block contents.
    ///
    /// # Errors
    ///
    /// Returns [`TarError::ChecksumMismatch`] if the values differ.
    pub fn verify_checksum(&self) -> Result<()> {
        let stored = self.checksum()?;
        let computed = self.raw.compute_checksum();
        if stored == computed {
            Ok(())
        } else {
            Err(TarError::ChecksumMismatch { stored, computed })
        }
    }
}

impl fmt::Debug for HeaderRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeaderRecord")
            .field("name", &self.name)
            .field("size", &self.size)
            .field("entry_type", &self.entry_type())
            .field("mode", &self.mode().ok().map(|m| format!("{m:04o}")))
            .finish()
    }
}

/// Outcome of decoding the next block(s) of an archive.
#[derive(Debug)]
pub enum Decoded {
    /// A regular header.
    Header(HeaderRecord),
    /// The two-block terminator, or its absence when that is allowed.
    EndOfArchive,
}

/// Decode the next header from `reader`.
///
/// Consumes exactly one block for a header and two for the terminator.
/// `pos` is the stream offset of the block, used for error reporting; the
/// number of bytes consumed is returned alongside the result.
///
/// A stream that ends where a header is expected, or after a single zero
/// block, fails unless [`ReaderOptions::allow_missing_terminator`] is set.
pub fn decode<R: Read>(
    reader: &mut R,
    pos: u64,
    options: &ReaderOptions,
) -> Result<(Decoded, u64)> {
    let mut block = [0u8; BLOCK_SIZE];

    if !read_block(reader, &mut block, pos)? {
        if !options.allow_missing_terminator {
            return Err(TarError::TruncatedHeader { pos });
        }
        warn!("archive ends at {pos} without terminator");
        return Ok((Decoded::EndOfArchive, 0));
    }

    if is_zero_block(&block) {
        let next = pos + BLOCK_SIZE as u64;
        if !read_block(reader, &mut block, next)? {
            if !options.allow_missing_terminator {
                return Err(TarError::StrayZeroBlock { pos });
            }
            warn!("archive ends after a single zero block at {pos}");
            return Ok((Decoded::EndOfArchive, BLOCK_SIZE as u64));
        }
        if !is_zero_block(&block) {
            return Err(TarError::StrayZeroBlock { pos });
        }
        debug!("end of archive at {pos}");
        return Ok((Decoded::EndOfArchive, 2 * BLOCK_SIZE as u64));
    }

    let header = HeaderRecord::from_block(&block)?;
    if options.verify_checksum {
        header.verify_checksum()?;
    }
    debug!(
        "header at {pos}: {:?} ({} bytes, {:?})",
        header.name(),
        header.size(),
        header.entry_type()
    );
    Ok((Decoded::Header(header), BLOCK_SIZE as u64))
}

/// Read one block; `Ok(false)` on a clean EOF before any byte.
fn read_block<R: Read>(reader: &mut R, block: &mut [u8; BLOCK_SIZE], pos: u64) -> Result<bool> {
    match read_exactish(reader, block)? {
        0 => Ok(false),
        BLOCK_SIZE => Ok(true),
        _ => Err(TarError::TruncatedHeader { pos }),
    }
}

fn is_zero_block(block: &[u8; BLOCK_SIZE]) -> bool {
    block.iter().all(|&b| b == 0)
}

fn numeric(field: &'static str, bytes: &[u8]) -> Result<u64> {
    parse_octal(bytes).ok_or_else(|| TarError::InvalidNumeric {
        field,
        raw: bytes.to_vec(),
    })
}

fn numeric_u32(field: &'static str, bytes: &[u8]) -> Result<u32> {
    numeric(field, bytes).and_then(|value| {
        u32::try_from(value).map_err(|_| TarError::InvalidNumeric {
            field,
            raw: bytes.to_vec(),
        })
    })
}

/// Parse an octal ASCII field into a u64.
///
/// Octal fields in tar headers are ASCII strings with optional leading
/// spaces and trailing spaces or null bytes. For example:
/// - `"0000644\0"` -> 420 (file mode 0644)
/// - `"     123 "` -> 83
///
/// Returns `None` if the field contains anything other than spaces, digits
/// 0-7 or null bytes, if anything but spaces and null bytes follows the
/// digits, or if the value overflows.
#[must_use]
pub fn parse_octal(bytes: &[u8]) -> Option<u64> {
    let start = bytes.iter().position(|&b| b != b' ').unwrap_or(bytes.len());
    let end = bytes[start..]
        .iter()
        .position(|&b| b == b' ' || b == b'\0')
        .map_or(bytes.len(), |i| start + i);
    if bytes[end..].iter().any(|&b| b != b' ' && b != b'\0') {
        return None;
    }

    bytes[start..end].iter().try_fold(0u64, |value, &byte| {
        if !(b'0'..=b'7').contains(&byte) {
            return None;
        }
        value.checked_mul(8)?.checked_add(u64::from(byte - b'0'))
    })
}

/// Truncate a byte slice at the first null byte.
///
/// ```
/// use ustar_stream::header::truncate_null;
///
/// assert_eq!(truncate_null(b"hello\0world"), b"hello");
/// assert_eq!(truncate_null(b"no null here"), b"no null here");
/// ```
#[must_use]
pub fn truncate_null(bytes: &[u8]) -> &[u8] {
    match bytes.iter().position(|&b| b == 0) {
        Some(pos) => &bytes[..pos],
        None => bytes,
    }
}

/// Strip NULs and ASCII whitespace from both ends of a field.
fn trim_field(bytes: &[u8]) -> &[u8] {
    let blank = |b: &u8| *b == 0 || b.is_ascii_whitespace();
    let start = bytes.iter().position(|b| !blank(b)).unwrap_or(bytes.len());
    let end = bytes.iter().rposition(|b| !blank(b)).map_or(start, |i| i + 1);
    &bytes[start..end]
}
