//! Authorization of requested host mounts against the resolution's anchor.
//!
//! A mount is exposed only when all of these hold:
//!
//! 1. the host path has no `.` or `..` components, and starts with an
//!    allowed prefix (plain byte prefix, so `/mnt/home` also admits
//!    `/mnt/home2/...`);
//! 2. `lstat` of the host path is a directory (a further symlink is refused);
//! 3. the directory's owner matches the anchor's owner, or it is world
//!    read+execute. A group match alone grants nothing.

use std::os::unix::ffi::OsStrExt;
use std::path::{Component, Path, PathBuf};

use log::warn;

use crate::error::{DenyReason, ResolveError};
use crate::fs::{FileStatus, Filesystem};
use crate::resolve::Anchor;

const OTHER_RX: u32 = 0o005;

pub struct MountAuthorizer<'a> {
    fs: &'a dyn Filesystem,
    allowed_prefixes: &'a [String],
    anchor: &'a Anchor,
}

impl<'a> MountAuthorizer<'a> {
    pub fn new(fs: &'a dyn Filesystem, allowed_prefixes: &'a [String], anchor: &'a Anchor) -> Self {
        Self {
            fs,
            allowed_prefixes,
            anchor,
        }
    }

    /// Authorize one `(name, host_path)` candidate.
    pub fn authorize(&self, name: &str, host_path: &Path) -> Result<(), ResolveError> {
        let result = self.check(host_path);
        if let Err(e) = &result {
            warn!("mount {name:?} refused: {e}");
        }
        result
    }

    /// Authorize every candidate; the first refusal aborts.
    pub fn authorize_all(&self, mounts: &[(String, PathBuf)]) -> Result<(), ResolveError> {
        mounts
            .iter()
            .try_for_each(|(name, host_path)| self.authorize(name, host_path))
    }

    fn check(&self, host_path: &Path) -> Result<(), ResolveError> {
        if !is_canonical(host_path) {
            return Err(ResolveError::PermissionDenied {
                path: host_path.to_path_buf(),
                reason: DenyReason::NonCanonicalPath,
            });
        }
        if !has_allowed_prefix(host_path, self.allowed_prefixes) {
            return Err(ResolveError::PermissionDenied {
                path: host_path.to_path_buf(),
                reason: DenyReason::OutsideAllowedPrefix,
            });
        }
        let status = match self.fs.lstat(host_path) {
            Ok(status) if status.is_dir() => status,
            _ => {
                return Err(ResolveError::NotADirectory {
                    path: host_path.to_path_buf(),
                });
            }
        };
        if !ownership_permits(&status, &self.anchor.status) {
            return Err(ResolveError::PermissionDenied {
                path: host_path.to_path_buf(),
                reason: DenyReason::Ownership,
            });
        }
        Ok(())
    }
}

/// True when no component is `..` (or a leading `.`). The prefix test
/// compares bytes, so a path the kernel would normalize must be refused first.
pub fn is_canonical(path: &Path) -> bool {
    !path
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::CurDir))
}

pub fn has_allowed_prefix(path: &Path, prefixes: &[String]) -> bool {
    let bytes = path.as_os_str().as_bytes();
    prefixes.iter().any(|p| bytes.starts_with(p.as_bytes()))
}

/// Ownership/mode part of the check:
/// `uid == anchor.uid || (gid == anchor.gid && o+rx) || o+rx`, which reduces
/// to owner match or world read+execute. A group match alone grants nothing.
pub fn ownership_permits(target: &FileStatus, anchor: &FileStatus) -> bool {
    target.uid == anchor.uid || target.mode & OTHER_RX == OTHER_RX
}
