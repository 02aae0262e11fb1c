//! Filesystem access used by resolution and authorization.
//!
//! Everything that touches the curated namespace or a candidate mount goes
//! through [`Filesystem`], so that tests can substitute synthetic ownership
//! and count accesses.

use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

/// What kind of entry a status describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    File,
    Symlink,
    Other,
}

/// Ownership and mode of a filesystem entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStatus {
    pub uid: u32,
    pub gid: u32,
    /// Permission bits (`st_mode & 0o7777`).
    pub mode: u32,
    pub kind: EntryKind,
}

impl FileStatus {
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

impl From<&std::fs::Metadata> for FileStatus {
    fn from(meta: &std::fs::Metadata) -> Self {
        let ft = meta.file_type();
        let kind = if ft.is_symlink() {
            EntryKind::Symlink
        } else if ft.is_dir() {
            EntryKind::Directory
        } else if ft.is_file() {
            EntryKind::File
        } else {
            EntryKind::Other
        };
        Self {
            uid: meta.uid(),
            gid: meta.gid(),
            mode: meta.mode() & 0o7777,
            kind,
        }
    }
}

/// Read-only view of the host filesystem.
pub trait Filesystem: Send + Sync {
    /// Status of `path`, following symlinks.
    fn stat(&self, path: &Path) -> io::Result<FileStatus>;

    /// Status of `path` itself, never following a symlink.
    fn lstat(&self, path: &Path) -> io::Result<FileStatus>;

    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// First-level symbolic links in `dir` as `(link name, target)`, sorted by
    /// name. Relative targets are joined onto `dir`.
    fn symlinks(&self, dir: &Path) -> io::Result<Vec<(String, PathBuf)>>;
}

/// [`Filesystem`] backed by `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostFilesystem;

impl Filesystem for HostFilesystem {
    fn stat(&self, path: &Path) -> io::Result<FileStatus> {
        std::fs::metadata(path).map(|m| FileStatus::from(&m))
    }

    fn lstat(&self, path: &Path) -> io::Result<FileStatus> {
        std::fs::symlink_metadata(path).map(|m| FileStatus::from(&m))
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn symlinks(&self, dir: &Path) -> io::Result<Vec<(String, PathBuf)>> {
        let mut links = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_symlink() {
                continue;
            }
            // Names that are not UTF-8 cannot be expressed as mount keys.
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            let target = std::fs::read_link(entry.path())?;
            links.push((name, dir.join(target)));
        }
        links.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(links)
    }
}
