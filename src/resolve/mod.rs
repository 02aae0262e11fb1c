//! Recursive walk of the curated namespace.
//!
//! The walk is a function over [`Node`]: directories consume one spec segment
//! per level, mapping files are parsed once and then indexed key by key. The
//! status of the last filesystem entry reached becomes the [`Anchor`] that
//! mount authorization is checked against.
//!
//! A directory may carry a per-directory mapping file (`dir_config`). It is
//! the directory's own record when no segments remain, and supplies keys for
//! segments that name no child on disk.

pub mod template;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::debug;
use serde_yaml::{Mapping, Value};

use crate::config::{LocalConfig, ResolverConfig};
use crate::error::ResolveError;
use crate::fs::{FileStatus, Filesystem};
use crate::spec::{self, Spec};

/// Extensions tried, in order, when a segment names a mapping file.
const MAPPING_EXTENSIONS: [&str; 3] = ["yaml", "yml", "json"];

/// Ownership snapshot of the curated entry a resolution ended on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    pub path: PathBuf,
    pub status: FileStatus,
}

/// What the walk ended on.
#[derive(Debug, Clone, PartialEq)]
pub enum Terminal {
    /// A mapping record inside the mapping file at `origin`.
    Record { origin: PathBuf, record: Mapping },
    /// A directory with no segments left: a raw repository. `links` are its
    /// first-level symlinks, each a proposed mount.
    BareDirectory {
        path: PathBuf,
        links: Vec<(String, PathBuf)>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawResolution {
    pub terminal: Terminal,
    pub anchor: Anchor,
}

#[derive(Debug)]
enum Node {
    Directory(PathBuf),
    /// `names_itself`: the file was named by the template, so a remaining
    /// segment equal to its stem is consumed as naming it. A file reached
    /// from a spec segment has already consumed that segment.
    MappingFile { path: PathBuf, names_itself: bool },
    /// A value inside a parsed mapping file. `stem` is set only at the file's
    /// top level, where a segment equal to it names the file itself.
    Value {
        origin: PathBuf,
        stem: Option<String>,
        value: Value,
    },
}

pub struct PathResolver<'a> {
    fs: &'a dyn Filesystem,
    resolver: &'a ResolverConfig,
    local: &'a LocalConfig,
}

impl<'a> PathResolver<'a> {
    pub fn new(fs: &'a dyn Filesystem, resolver: &'a ResolverConfig, local: &'a LocalConfig) -> Self {
        Self {
            fs,
            resolver,
            local,
        }
    }

    /// Fill `template` from `spec` and `vars`, then walk from the resulting path.
    pub fn resolve(
        &self,
        template: &str,
        spec: &Spec,
        vars: &BTreeMap<String, String>,
    ) -> Result<RawResolution, ResolveError> {
        if let Some(bad) = vars.values().find(|v| !spec::is_safe(v)) {
            return Err(ResolveError::InvalidSpecCharacters { spec: bad.clone() });
        }
        let sub = template::substitute(template, spec.segments(), vars)?;
        let start = PathBuf::from(&sub.path);
        debug!("resolving {:?} from {}", spec.raw(), start.display());
        let (node, anchor) = self.locate(&start)?;
        let node = match node {
            Node::MappingFile { path, .. } => Node::MappingFile {
                path,
                names_itself: true,
            },
            other => other,
        };
        self.walk(node, anchor, &sub.remaining)
    }

    fn walk(
        &self,
        node: Node,
        anchor: Anchor,
        remaining: &[String],
    ) -> Result<RawResolution, ResolveError> {
        match node {
            Node::Directory(path) => match remaining.split_first() {
                None => match self.dir_config(&path)? {
                    Some((node, anchor)) => self.walk(node, anchor, remaining),
                    None => self.bare_directory(path, anchor),
                },
                Some((segment, rest)) => match self.locate(&path.join(segment)) {
                    Ok((child, anchor)) => self.walk(child, anchor, rest),
                    Err(missing) => match self.dir_config(&path)? {
                        Some((node, anchor)) => self.walk(node, anchor, remaining),
                        None => Err(missing),
                    },
                },
            },
            Node::MappingFile { path, names_itself } => {
                let value = self.parse_mapping(&path)?;
                let stem = if names_itself {
                    mapping_stem(&path)
                } else {
                    None
                };
                let node = Node::Value {
                    origin: path,
                    stem,
                    value,
                };
                self.walk(node, anchor, remaining)
            }
            Node::Value {
                origin,
                stem,
                value,
            } => {
                let Some((segment, rest)) = remaining.split_first() else {
                    return match value {
                        Value::Mapping(record) => Ok(RawResolution {
                            terminal: Terminal::Record { origin, record },
                            anchor,
                        }),
                        other => Err(ResolveError::InvalidLeafType {
                            path: origin,
                            found: value_kind(&other),
                        }),
                    };
                };
                let next = match &value {
                    Value::Mapping(m) => m.get(segment.as_str()).cloned(),
                    _ => None,
                };
                let value = match next {
                    Some(v) => v,
                    None if stem.as_deref() == Some(segment.as_str()) => value,
                    None => {
                        return Err(ResolveError::unresolved(
                            &origin,
                            format!("no key {segment:?}"),
                        ));
                    }
                };
                let node = Node::Value {
                    origin,
                    stem: None,
                    value,
                };
                self.walk(node, anchor, rest)
            }
        }
    }

    fn parse_mapping(&self, path: &Path) -> Result<Value, ResolveError> {
        let text = self
            .fs
            .read_to_string(path)
            .map_err(|e| ResolveError::unresolved(path, e.to_string()))?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_yaml::from_str(&text)
            .map_err(|e| ResolveError::unresolved(path, format!("unparseable mapping file: {e}")))
    }

    /// The directory's own mapping file, anchored on that file. An empty file
    /// (such as a bare marker) counts as absent.
    fn dir_config(&self, dir: &Path) -> Result<Option<(Node, Anchor)>, ResolveError> {
        if self.resolver.dir_config.is_empty() {
            return Ok(None);
        }
        let path = dir.join(&self.resolver.dir_config);
        let status = match self.fs.stat(&path) {
            Ok(status) if !status.is_dir() => status,
            _ => return Ok(None),
        };
        let value = self.parse_mapping(&path)?;
        if value.is_null() {
            return Ok(None);
        }
        debug!("{} carries its own mapping", dir.display());
        let node = Node::Value {
            origin: path.clone(),
            stem: None,
            value,
        };
        Ok(Some((node, Anchor { path, status })))
    }

    /// `path` itself, falling back to `path.<ext>` for mapping files.
    fn locate(&self, path: &Path) -> Result<(Node, Anchor), ResolveError> {
        if let Ok(found) = self.classify(path) {
            return Ok(found);
        }
        MAPPING_EXTENSIONS
            .iter()
            .find_map(|ext| {
                let mut candidate = path.as_os_str().to_owned();
                candidate.push(".");
                candidate.push(ext);
                self.classify(Path::new(&candidate)).ok()
            })
            .ok_or_else(|| ResolveError::unresolved(path, "no such directory or mapping file"))
    }

    fn classify(&self, path: &Path) -> std::io::Result<(Node, Anchor)> {
        let status = self.fs.stat(path)?;
        let node = if status.is_dir() {
            Node::Directory(path.to_path_buf())
        } else {
            Node::MappingFile {
                path: path.to_path_buf(),
                names_itself: false,
            }
        };
        let anchor = Anchor {
            path: path.to_path_buf(),
            status,
        };
        Ok((node, anchor))
    }

    fn bare_directory(&self, path: PathBuf, anchor: Anchor) -> Result<RawResolution, ResolveError> {
        if !self.local.required_marker.is_empty() {
            let marker = path.join(&self.local.required_marker);
            if self.fs.stat(&marker).is_err() {
                return Err(ResolveError::unresolved(
                    marker,
                    "required marker file is missing",
                ));
            }
        }
        let links = self
            .fs
            .symlinks(&path)
            .map_err(|e| ResolveError::unresolved(&path, e.to_string()))?;
        debug!("{} is a bare repository with {} link(s)", path.display(), links.len());
        Ok(RawResolution {
            terminal: Terminal::BareDirectory { path, links },
            anchor,
        })
    }
}

fn mapping_stem(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?;
    if !MAPPING_EXTENSIONS.contains(&ext) {
        return None;
    }
    path.file_stem()?.to_str().map(String::from)
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}
