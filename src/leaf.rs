//! Normalization of a terminal record into a [`LaunchDescriptor`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::warn;
use serde::Deserialize;
use serde_yaml::{Mapping, Value};

use crate::authorize;
use crate::config::Config;
use crate::error::ResolveError;
use crate::providers::ProviderKind;
use crate::resolve::Terminal;

const DEFAULT_BRANCH: &str = "master";

/// Canonical launch parameters for one resolved spec.
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchDescriptor {
    pub provider_kind: ProviderKind,
    /// Never empty.
    pub resolved_spec: String,
    /// Requested mounts as `(mount key, host path)`, in record order.
    pub mounts: Vec<(String, PathBuf)>,
    /// Allowed pass-through launch options (e.g. `cpu_limit`).
    pub options: BTreeMap<String, Value>,
}

/// Shape of a leaf record. Unknown keys land in `extra`.
#[derive(Debug, Deserialize)]
struct LeafRecord {
    provider: Option<String>,
    spec: Option<String>,
    repo: Option<String>,
    branch: Option<String>,
    mounts: Option<Mapping>,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

pub fn extract(terminal: Terminal, config: &Config) -> Result<LaunchDescriptor, ResolveError> {
    match terminal {
        Terminal::BareDirectory { path, links } => Ok(LaunchDescriptor {
            provider_kind: ProviderKind::LocalDir,
            resolved_spec: path.to_string_lossy().into_owned(),
            mounts: links,
            options: BTreeMap::new(),
        }),
        Terminal::Record { origin, record } => from_record(origin, record, config),
    }
}

fn from_record(
    origin: PathBuf,
    record: Mapping,
    config: &Config,
) -> Result<LaunchDescriptor, ResolveError> {
    let leaf: LeafRecord = serde_yaml::from_value(Value::Mapping(record)).map_err(|_| {
        ResolveError::InvalidLeafType {
            path: origin.clone(),
            found: "malformed record",
        }
    })?;

    let token = leaf.provider.as_deref().unwrap_or(config.providers.default.as_str());
    let provider_kind = ProviderKind::from_token(token)?;

    let resolved_spec = match (leaf.spec, leaf.repo) {
        (Some(spec), _) if !spec.is_empty() => spec,
        (_, Some(repo)) if !repo.is_empty() => {
            let branch = leaf.branch.as_deref().unwrap_or(DEFAULT_BRANCH);
            format!("{repo}/{branch}")
        }
        _ => return Err(ResolveError::MissingSpec { path: origin }),
    };

    let mut mounts = Vec::new();
    for (key, value) in leaf.mounts.unwrap_or_default() {
        match (key, value) {
            (Value::String(name), Value::String(host)) => {
                if !is_mount_key(&name) {
                    return Err(ResolveError::InvalidMountKey {
                        path: origin,
                        key: name,
                    });
                }
                mounts.push((name, PathBuf::from(host)));
            }
            _ => {
                return Err(ResolveError::InvalidLeafType {
                    path: origin,
                    found: "non-string mount entry",
                });
            }
        }
    }

    let mut options = BTreeMap::new();
    for (key, value) in leaf.extra {
        if config.options.allowed.contains(&key) {
            options.insert(key, value);
        } else {
            warn!("{}: ignoring unrecognized key {key:?}", origin.display());
        }
    }

    Ok(LaunchDescriptor {
        provider_kind,
        resolved_spec,
        mounts,
        options,
    })
}

/// A key becomes the in-container target, so it must not climb out of the
/// home mount point or name it outright.
pub fn is_mount_key(key: &str) -> bool {
    !key.is_empty() && key != "/" && authorize::is_canonical(Path::new(key))
}
