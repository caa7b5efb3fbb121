use std::io::{ErrorKind, Read, Result, Write};

/// This function reads as many bytes as are required to fill the buffer, possibly performing
/// multiple reads to do so (and also retrying if required to deal with EINTR).
///
/// The "-ish" is that, unlike the standard Read::read_exact() method, hitting EOF is not an
/// error: the return value is the number of bytes actually placed in the buffer, which lets the
/// caller tell a clean EOF (0) apart from an incomplete read (anything less than `buf.len()`).
///
/// Errors from the underlying Read implementation are returned directly.
pub(crate) fn read_exactish(reader: &mut impl Read, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;

    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    Ok(filled)
}

/// Moves up to `len` bytes from `reader` to `writer` through `buf`, stopping early at EOF.
///
/// Returns the number of bytes moved.  A `None` writer discards the data.  Failures are tagged
/// with the side they came from, see [`CopyError`].
pub(crate) fn copy_exactish(
    reader: &mut impl Read,
    mut writer: Option<&mut dyn Write>,
    len: u64,
    buf: &mut [u8],
) -> std::result::Result<u64, CopyError> {
    let mut done = 0u64;

    while done < len {
        let want = std::cmp::min(len - done, buf.len() as u64) as usize;
        let got = read_exactish(reader, &mut buf[..want]).map_err(CopyError::Read)?;
        if let Some(w) = writer.as_mut() {
            w.write_all(&buf[..got]).map_err(CopyError::Write)?;
        }
        done += got as u64;
        if got < want {
            break;
        }
    }

    Ok(done)
}

/// Which side of a [`copy_exactish`] failed.
#[derive(Debug)]
pub(crate) enum CopyError {
    Read(std::io::Error),
    Write(std::io::Error),
}

#[cfg(test)]
mod test {
    use similar_asserts::assert_eq;

    use super::*;

    #[test]
    fn test_read_exactish() {
        // empty returns 0 immediately
        let mut r = b"" as &[u8];
        assert_eq!(read_exactish(&mut r, &mut [0; 9]).unwrap(), 0);
        assert_eq!(read_exactish(&mut r, &mut [0; 9]).unwrap(), 0); // repeatable

        // read one full buffer and then a partial one
        r = b"twelve bytes";
        assert_eq!(read_exactish(&mut r, &mut [0; 9]).unwrap(), 9);
        assert_eq!(read_exactish(&mut r, &mut [0; 9]).unwrap(), 3);
        assert_eq!(read_exactish(&mut r, &mut [0; 9]).unwrap(), 0);
    }

    #[test]
    fn test_read_exactish_short_reads() {
        // a reader that hands out one byte at a time
        struct Trickle<'a>(&'a [u8]);
        impl Read for Trickle<'_> {
            fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
                if self.0.is_empty() || buffer.is_empty() {
                    return Ok(0);
                }
                buffer[0] = self.0[0];
                self.0 = &self.0[1..];
                Ok(1)
            }
        }

        let mut buf = [0; 9];
        assert_eq!(
            read_exactish(&mut Trickle(b"ninebytes"), &mut buf).unwrap(),
            9
        );
        assert_eq!(&buf, b"ninebytes");
    }

    #[test]
    fn test_read_exactish_broken_reader() {
        struct BrokenReader;
        impl Read for BrokenReader {
            fn read(&mut self, _buffer: &mut [u8]) -> Result<usize> {
                Err(ErrorKind::NetworkDown.into())
            }
        }

        // read from a broken reader
        assert_eq!(
            read_exactish(&mut BrokenReader, &mut [0; 9])
                .unwrap_err()
                .kind(),
            ErrorKind::NetworkDown
        );
    }

    #[test]
    fn test_copy_exactish() {
        let mut r = b"0123456789abcdef" as &[u8];
        let mut out = Vec::new();
        let n = copy_exactish(&mut r, Some(&mut out), 10, &mut [0; 4]).unwrap();
        assert_eq!(n, 10);
        assert_eq!(out, b"0123456789");
        assert_eq!(r, b"abcdef");

        // discard, stopping at EOF
        let n = copy_exactish(&mut r, None, 100, &mut [0; 4]).unwrap();
        assert_eq!(n, 6);
    }
}
