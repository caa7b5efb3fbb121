//! Extraction destinations.
//!
//! [`ArchiveReader::extract_to_destination`] only needs two operations from
//! its sink: create a directory (with parents) and create a file to write
//! into.  [`DirDestination`] provides both on top of a directory file
//! descriptor, resolving every entry relative to it with `openat()` and
//! `mkdirat()`.
//!
//! [`ArchiveReader::extract_to_destination`]: crate::ArchiveReader::extract_to_destination

use std::{
    ffi::OsStr,
    fs::File,
    io::{Result, Write},
    path::{Component, Path, PathBuf},
};

use rustix::{
    fd::OwnedFd,
    fs::{mkdirat, openat, Mode, OFlags, CWD},
    io::Errno,
};

use crate::error::TarError;
use crate::options::PathPolicy;

/// A place extracted entries are written to.
///
/// Paths handed to these methods are relative to the destination root.
pub trait Destination {
    /// The writer returned for new files.
    type File: Write;

    /// Create `path` and any missing parents.  An existing directory is not
    /// an error.
    fn create_dir_all(&mut self, path: &Path) -> Result<()>;

    /// Create (or truncate) the file at `path`.  The parent directory is
    /// expected to exist.
    fn create_file(&mut self, path: &Path) -> Result<Self::File>;
}

/// A [`Destination`] rooted at a directory on the local filesystem.
#[derive(Debug)]
pub struct DirDestination {
    root: OwnedFd,
}

impl DirDestination {
    /// Open `path` as extraction root, creating it if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        std::fs::create_dir_all(path)?;
        let root = openat(
            CWD,
            path,
            OFlags::RDONLY | OFlags::DIRECTORY | OFlags::CLOEXEC,
            Mode::empty(),
        )?;
        Ok(Self { root })
    }

    /// Use an already-open directory as extraction root.
    pub fn from_fd(root: OwnedFd) -> Self {
        Self { root }
    }

    fn open_dir(&self, dirfd: &OwnedFd, name: &OsStr) -> Result<OwnedFd> {
        Ok(openat(
            dirfd,
            name,
            OFlags::RDONLY | OFlags::DIRECTORY | OFlags::CLOEXEC,
            Mode::empty(),
        )?)
    }

    /// Walk to the directory containing the last component of `path`.
    fn walk(&self, path: &Path, create: bool) -> Result<Option<OwnedFd>> {
        let mut dirfd: Option<OwnedFd> = None;
        for component in path.components() {
            let name = match component {
                Component::Normal(name) => name,
                Component::ParentDir => OsStr::new(".."),
                Component::CurDir | Component::RootDir | Component::Prefix(_) => continue,
            };
            let parent = dirfd.as_ref().unwrap_or(&self.root);
            if create {
                match mkdirat(parent, name, Mode::from_raw_mode(0o755)) {
                    Ok(()) | Err(Errno::EXIST) => {}
                    Err(e) => Err(e)?,
                }
            }
            dirfd = Some(self.open_dir(parent, name)?);
        }
        Ok(dirfd)
    }
}

impl Destination for DirDestination {
    type File = File;

    fn create_dir_all(&mut self, path: &Path) -> Result<()> {
        self.walk(path, true)?;
        Ok(())
    }

    fn create_file(&mut self, path: &Path) -> Result<File> {
        let name = path
            .file_name()
            .ok_or_else(|| std::io::Error::other(format!("{path:?} has no file name")))?;
        let parent = match path.parent() {
            Some(parent) => self.walk(parent, false)?,
            None => None,
        };
        let fd = openat(
            parent.as_ref().unwrap_or(&self.root),
            name,
            OFlags::CREATE | OFlags::TRUNC | OFlags::WRONLY | OFlags::CLOEXEC,
            Mode::from_raw_mode(0o644),
        )?;
        Ok(File::from(fd))
    }
}

/// Turn an entry name into a destination-relative path.
///
/// A leading `/` is always dropped.  Under [`PathPolicy::Strict`], names
/// with `..` components are refused.
pub fn entry_path(name: &str, policy: PathPolicy) -> crate::error::Result<PathBuf> {
    let mut path = PathBuf::new();
    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => path.push(part),
            Component::ParentDir => match policy {
                PathPolicy::Strict => return Err(TarError::UnsafePath(name.to_string())),
                PathPolicy::Permissive => path.push(".."),
            },
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }
    if path.as_os_str().is_empty() {
        return Err(TarError::UnsafePath(name.to_string()));
    }
    Ok(path)
}
