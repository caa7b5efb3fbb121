//! Extracting entries to directories and custom destinations.

use std::{
    io::{self, Sink},
    path::{Path, PathBuf},
};

use similar_asserts::assert_eq;
use ustar_stream::{
    ArchiveReader, Destination, DirDestination, PathPolicy, ReadState, ReaderOptions, TarError,
};

fn ustar_header(name: &str, entry_type: tar::EntryType, size: u64) -> tar::Header {
    let mut header = tar::Header::new_ustar();
    header.as_ustar_mut().unwrap().name[..name.len()].copy_from_slice(name.as_bytes());
    header.set_mode(0o644);
    header.set_uid(1000);
    header.set_gid(1000);
    header.set_mtime(1234567890);
    header.set_size(size);
    header.set_entry_type(entry_type);
    header.set_cksum();
    header
}

fn archive(entries: &[(&str, tar::EntryType, &[u8])]) -> Vec<u8> {
    let mut data = Vec::new();
    for (name, entry_type, content) in entries {
        let header = ustar_header(name, *entry_type, content.len() as u64);
        data.extend_from_slice(header.as_bytes());
        data.extend_from_slice(content);
        data.resize(data.len().next_multiple_of(512), 0);
    }
    data.extend_from_slice(&[0u8; 1024]);
    data
}

#[test]
fn test_extract_matches_read_content() {
    let stg = b"OBJECT_SHARED Models/Airport/Jetway/jetway.xml 5.1 60.2 10.0 0\n".repeat(8);
    let data = archive(&[
        ("3040642.stg", tar::EntryType::Regular, &stg[..]),
        ("Terrain/e005n60/3040642.btg.gz", tar::EntryType::Regular, &[0x1f; 2000][..]),
    ]);
    let tmp = tempfile::tempdir().unwrap();

    let mut reader = ArchiveReader::new(&data[..]);
    while reader.read_header().unwrap().is_some() {
        reader.extract_to(tmp.path()).unwrap();
    }
    assert_eq!(reader.position(), data.len() as u64);

    let mut reader = ArchiveReader::new(&data[..]);
    while let Some(header) = reader.read_header().unwrap() {
        let path = tmp.path().join(header.name());
        let content = reader.read_content().unwrap();
        assert_eq!(std::fs::read(path).unwrap(), content);
    }
}

#[test]
fn test_extract_directory_consumes_nothing() {
    let data = archive(&[
        ("Roads/w010n50/", tar::EntryType::Directory, &b""[..]),
        ("next.txt", tar::EntryType::Regular, &b"next"[..]),
    ]);
    let tmp = tempfile::tempdir().unwrap();
    let mut reader = ArchiveReader::new(&data[..]);

    reader.read_header().unwrap().unwrap();
    reader.extract_to(tmp.path()).unwrap();
    assert!(tmp.path().join("Roads/w010n50").is_dir());
    assert_eq!(reader.position(), 512);
    assert_eq!(reader.state(), ReadState::AwaitingHeader);

    assert_eq!(reader.read_header().unwrap().unwrap().name(), "next.txt");
}

#[test]
fn test_extract_creates_parents() {
    let data = archive(&[("a/b/c/deep.txt", tar::EntryType::Regular, &b"deep"[..])]);
    let tmp = tempfile::tempdir().unwrap();
    let mut reader = ArchiveReader::new(&data[..]);

    reader.read_header().unwrap();
    reader.extract_to(tmp.path()).unwrap();
    assert_eq!(std::fs::read(tmp.path().join("a/b/c/deep.txt")).unwrap(), b"deep");
}

#[test]
fn test_extract_overwrites() {
    let data = archive(&[("same.txt", tar::EntryType::Regular, &b"new"[..])]);
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(tmp.path().join("same.txt"), b"much older content").unwrap();

    let mut reader = ArchiveReader::new(&data[..]);
    reader.read_header().unwrap();
    reader.extract_to(tmp.path()).unwrap();
    assert_eq!(std::fs::read(tmp.path().join("same.txt")).unwrap(), b"new");
}

#[test]
fn test_absolute_name_stays_inside_root() {
    let data = archive(&[("/abs.txt", tar::EntryType::Regular, &b"abs"[..])]);
    let tmp = tempfile::tempdir().unwrap();
    let mut reader = ArchiveReader::new(&data[..]);

    reader.read_header().unwrap();
    reader.extract_to(tmp.path()).unwrap();
    assert_eq!(std::fs::read(tmp.path().join("abs.txt")).unwrap(), b"abs");
}

#[test]
fn test_traversal_rejected() {
    let data = archive(&[
        ("../evil.txt", tar::EntryType::Regular, &b"evil"[..]),
        ("good.txt", tar::EntryType::Regular, &b"good"[..]),
    ]);
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("root");
    let mut reader = ArchiveReader::new(&data[..]);

    reader.read_header().unwrap();
    let err = reader.extract_to(&root).unwrap_err();
    assert!(matches!(err, TarError::UnsafePath(ref name) if name == "../evil.txt"), "{err}");
    assert!(!tmp.path().join("evil.txt").exists());

    // nothing was consumed, so the entry can still be skipped
    assert_eq!(reader.state(), ReadState::AwaitingContent);
    reader.skip_content().unwrap();
    reader.read_header().unwrap();
    reader.extract_to(&root).unwrap();
    assert!(root.join("good.txt").exists());
}

#[test]
fn test_traversal_permitted() {
    let data = archive(&[("../escaped.txt", tar::EntryType::Regular, &b"out"[..])]);
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("root");
    let options = ReaderOptions {
        path_policy: PathPolicy::Permissive,
        ..Default::default()
    };
    let mut reader = ArchiveReader::with_options(&data[..], options);

    reader.read_header().unwrap();
    reader.extract_to(&root).unwrap();
    assert_eq!(std::fs::read(tmp.path().join("escaped.txt")).unwrap(), b"out");
}

#[test]
fn test_extract_truncated() {
    let mut data = ustar_header("cut.bin", tar::EntryType::Regular, 4096)
        .as_bytes()
        .to_vec();
    data.extend_from_slice(&[9u8; 1000]);
    let tmp = tempfile::tempdir().unwrap();
    let mut reader = ArchiveReader::new(&data[..]);

    reader.read_header().unwrap();
    let err = reader.extract_to(tmp.path()).unwrap_err();
    assert!(
        matches!(err, TarError::TruncatedContent { pos: 1512, missing: 3096 }),
        "{err}"
    );
}

#[test]
fn test_dir_destination_from_fd() {
    let tmp = tempfile::tempdir().unwrap();
    let fd = rustix::fs::open(
        tmp.path(),
        rustix::fs::OFlags::RDONLY | rustix::fs::OFlags::DIRECTORY,
        rustix::fs::Mode::empty(),
    )
    .unwrap();
    let mut dest = DirDestination::from_fd(fd);

    let data = archive(&[("from_fd.txt", tar::EntryType::Regular, &b"fd"[..])]);
    let mut reader = ArchiveReader::new(&data[..]);
    reader.read_header().unwrap();
    reader.extract_to_destination(&mut dest).unwrap();
    assert_eq!(std::fs::read(tmp.path().join("from_fd.txt")).unwrap(), b"fd");
}

/// Records what was asked of it and throws the content away.
#[derive(Default)]
struct Recorder {
    dirs: Vec<PathBuf>,
    files: Vec<PathBuf>,
}

impl Destination for Recorder {
    type File = Sink;

    fn create_dir_all(&mut self, path: &Path) -> io::Result<()> {
        self.dirs.push(path.to_path_buf());
        Ok(())
    }

    fn create_file(&mut self, path: &Path) -> io::Result<Sink> {
        self.files.push(path.to_path_buf());
        Ok(io::sink())
    }
}

#[test]
fn test_custom_destination() {
    let data = archive(&[
        ("Roads/", tar::EntryType::Directory, &b""[..]),
        ("Roads/w010n50/tile.stg", tar::EntryType::Regular, &b"tile"[..]),
        ("top.txt", tar::EntryType::Regular, &b"top"[..]),
    ]);
    let mut dest = Recorder::default();
    let mut reader = ArchiveReader::new(&data[..]);
    while reader.read_header().unwrap().is_some() {
        reader.extract_to_destination(&mut dest).unwrap();
    }

    assert_eq!(
        dest.dirs,
        vec![PathBuf::from("Roads"), PathBuf::from("Roads/w010n50")]
    );
    assert_eq!(
        dest.files,
        vec![
            PathBuf::from("Roads/w010n50/tile.stg"),
            PathBuf::from("top.txt")
        ]
    );
}

/// Fails every file creation.
struct ReadOnly;

impl Destination for ReadOnly {
    type File = Sink;

    fn create_dir_all(&mut self, _path: &Path) -> io::Result<()> {
        Ok(())
    }

    fn create_file(&mut self, _path: &Path) -> io::Result<Sink> {
        Err(io::Error::from(io::ErrorKind::PermissionDenied))
    }
}

#[test]
fn test_destination_error() {
    let data = archive(&[("locked.txt", tar::EntryType::Regular, &b"x"[..])]);
    let mut reader = ArchiveReader::new(&data[..]);
    reader.read_header().unwrap();

    let err = reader.extract_to_destination(&mut ReadOnly).unwrap_err();
    match err {
        TarError::Destination { path, source } => {
            assert_eq!(path, PathBuf::from("locked.txt"));
            assert_eq!(source.kind(), io::ErrorKind::PermissionDenied);
        }
        other => panic!("unexpected error: {other}"),
    }
}
