//! Volume/mount records handed to the orchestrator.

use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::config::MountNaming;
use crate::escape;

/// Orchestrator volume names are DNS labels.
pub const MAX_MOUNT_NAME_LEN: usize = 63;
const ESCAPED_PREFIX: &str = "mount-";
/// Hex digits of the key digest kept when an escaped name is too long.
const DIGEST_HEX_LEN: usize = 16;

/// One read-only host-path volume. Only ever built from authorized mounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Mount {
    pub name: String,
    pub host_path: PathBuf,
    pub mount_path: PathBuf,
    pub read_only: bool,
}

/// Turn authorized `(key, host path)` pairs into mount records, in order.
///
/// A key that is an absolute path is used as the mount path; any other key
/// is placed under `home_mount_point`.
pub fn build_mounts(
    authorized: &[(String, PathBuf)],
    naming: MountNaming,
    home_mount_point: &str,
) -> Vec<Mount> {
    authorized
        .iter()
        .enumerate()
        .map(|(i, (key, host_path))| {
            let name = match naming {
                MountNaming::Positional => format!("mount{}", i + 1),
                MountNaming::Escaped => escaped_name(key),
            };
            let mount_path = if Path::new(key).is_absolute() {
                PathBuf::from(key)
            } else {
                Path::new(home_mount_point).join(key)
            };
            Mount {
                name,
                host_path: host_path.clone(),
                mount_path,
                read_only: true,
            }
        })
        .collect()
}

/// `mount-<escape(key)>`, reversible while it fits in a volume name.
///
/// Longer names keep a readable head of the escaped key and end in a digest
/// of the whole key, so they stay stable and distinct but are not reversible.
pub fn escaped_name(key: &str) -> String {
    let name = format!("{ESCAPED_PREFIX}{}", escape::escape(key));
    if name.len() <= MAX_MOUNT_NAME_LEN {
        return name;
    }
    let digest: String = Sha256::digest(key.as_bytes())
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect();
    let head = MAX_MOUNT_NAME_LEN - DIGEST_HEX_LEN - 1;
    format!("{}-{}", &name[..head], &digest[..DIGEST_HEX_LEN])
}
