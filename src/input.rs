//! Opening archive streams, with optional transparent decompression.
//!
//! The reader itself only ever sees plain ustar bytes; gzip and zstd
//! wrappers are peeled off here before the stream is handed over.

use std::{
    fs::File,
    io::{BufRead, BufReader, Read, Result},
    path::Path,
};

use flate2::read::GzDecoder;
use log::debug;

const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b];
const ZSTD_MAGIC: &[u8] = &[0x28, 0xb5, 0x2f, 0xfd];

/// Compression wrapped around an archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    /// Detect from the first bytes of the stream.
    #[default]
    Auto,
    /// Plain tar.
    None,
    /// gzip (`.tar.gz`, `.tgz`).
    Gzip,
    /// Zstandard (`.tar.zst`).
    Zstd,
}

impl Compression {
    /// Guess the compression from the leading bytes of a stream.
    #[must_use]
    pub fn sniff(head: &[u8]) -> Self {
        if head.starts_with(GZIP_MAGIC) {
            Compression::Gzip
        } else if head.starts_with(ZSTD_MAGIC) {
            Compression::Zstd
        } else {
            Compression::None
        }
    }
}

/// Wrap `reader` in the decoder required by `compression`.
pub fn decompress<'a, R: BufRead + 'a>(
    mut reader: R,
    compression: Compression,
) -> Result<Box<dyn Read + 'a>> {
    let compression = match compression {
        Compression::Auto => Compression::sniff(reader.fill_buf()?),
        other => other,
    };
    debug!("archive compression: {compression:?}");
    Ok(match compression {
        Compression::Gzip => Box::new(GzDecoder::new(reader)),
        Compression::Zstd => Box::new(zstd::stream::read::Decoder::with_buffer(reader)?),
        Compression::None | Compression::Auto => Box::new(reader),
    })
}

/// Open the archive at `path` (`-` for stdin).
pub fn open_archive(path: impl AsRef<Path>, compression: Compression) -> Result<Box<dyn Read>> {
    let path = path.as_ref();
    if path == Path::new("-") {
        decompress(BufReader::new(std::io::stdin()), compression)
    } else {
        decompress(BufReader::new(File::open(path)?), compression)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use similar_asserts::assert_eq;

    use super::*;

    fn read_all(mut reader: impl Read) -> Vec<u8> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data).unwrap();
        data
    }

    #[test]
    fn test_sniff() {
        assert_eq!(Compression::sniff(&[0x1f, 0x8b, 8, 0]), Compression::Gzip);
        assert_eq!(Compression::sniff(ZSTD_MAGIC), Compression::Zstd);
        assert_eq!(Compression::sniff(b"3040642.stg"), Compression::None);
        assert_eq!(Compression::sniff(b""), Compression::None);
    }

    #[test]
    fn test_gzip_auto() {
        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::fast());
        encoder.write_all(b"plain tar bytes").unwrap();
        let gz = encoder.finish().unwrap();

        let reader = decompress(&gz[..], Compression::Auto).unwrap();
        assert_eq!(read_all(reader), b"plain tar bytes");
    }

    #[test]
    fn test_zstd_auto() {
        let zst = zstd::stream::encode_all(&b"plain tar bytes"[..], 3).unwrap();
        let reader = decompress(&zst[..], Compression::Auto).unwrap();
        assert_eq!(read_all(reader), b"plain tar bytes");
    }

    #[test]
    fn test_passthrough() {
        let reader = decompress(&b"plain"[..], Compression::None).unwrap();
        assert_eq!(read_all(reader), b"plain");
    }

    #[test]
    fn test_open_archive_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"on disk").unwrap();
        let reader = open_archive(file.path(), Compression::Auto).unwrap();
        assert_eq!(read_all(reader), b"on disk");
    }
}
