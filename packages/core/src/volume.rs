//! The filesystem seam: what the mount sequence needs from a volume.
//!
//! Handles are owned trait objects. Dropping a handle closes it, so every
//! exit path releases what it opened.

use std::io::{self, Read, Write};

use serde::{Deserialize, Serialize};

use crate::VolumePath;

/// Filesystem kinds a descriptor can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FsKind {
    #[default]
    Fat,
}

/// What to mount and where.
///
/// Built once at startup and handed to the sequencer; there is no unmount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountDescriptor {
    pub kind: FsKind,
    /// Name of the backing block device, e.g. `SD`.
    pub backing: String,
    /// Mount point, e.g. `/SD:`.
    pub mount_point: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Directory,
    File,
}

/// One directory entry. `size` is only meaningful for files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
    pub size: u64,
}

impl DirEntry {
    pub fn file(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::File,
            size,
        }
    }

    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Directory,
            size: 0,
        }
    }

    /// The end-of-directory marker: an entry with an empty name.
    pub fn end() -> Self {
        Self::file(String::new(), 0)
    }

    pub fn is_end(&self) -> bool {
        self.name.is_empty()
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenMode {
    #[default]
    Read,
    /// Write, creating the file if it does not exist. Existing content is
    /// not truncated.
    CreateWrite,
}

/// An open directory. Dropping it closes it.
pub trait DirStream {
    /// Next entry, or `DirEntry::end()` once the directory is exhausted.
    fn read_next(&mut self) -> io::Result<DirEntry>;
}

/// An open file. Dropping it closes it.
pub trait FileHandle: Read + Write {}
impl<T: Read + Write + ?Sized> FileHandle for T {}

/// A mountable filesystem.
///
/// Paths passed to a mounted volume carry the mount point; implementations
/// reject paths under a different mount point.
pub trait Volume {
    fn mount(&mut self, descriptor: &MountDescriptor) -> io::Result<()>;

    fn is_mounted(&self) -> bool;

    fn open_dir<'a>(&'a self, path: &VolumePath) -> io::Result<Box<dyn DirStream + 'a>>;

    fn open<'a>(&'a self, path: &VolumePath, mode: OpenMode)
        -> io::Result<Box<dyn FileHandle + 'a>>;

    fn unlink(&self, path: &VolumePath) -> io::Result<()>;
}

/// Error returned by volumes for operations attempted before `mount`.
pub(crate) fn not_mounted() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "volume is not mounted")
}
