//! Error kinds surfaced by a resolution, plus the provider-owned error category.

use std::path::PathBuf;

use thiserror::Error;

/// Why a requested mount (or a bare-directory repository) was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// Host path does not start with any allowed mount prefix.
    OutsideAllowedPrefix,
    /// Host path has `.` or `..` components, so its bytes do not name where it leads.
    NonCanonicalPath,
    /// Owner differs from the anchor's and the path is not world read+execute.
    Ownership,
    /// A bare-directory repository lives outside the allowed local paths.
    LocalPathNotAllowed,
}

impl DenyReason {
    pub fn as_str(self) -> &'static str {
        match self {
            DenyReason::OutsideAllowedPrefix => "outside allowed prefixes",
            DenyReason::NonCanonicalPath => "path has `.` or `..` components",
            DenyReason::Ownership => "ownership/mode mismatch with anchor",
            DenyReason::LocalPathNotAllowed => "local path not allowed",
        }
    }
}

/// A failed resolution. Every variant is terminal: nothing is retried.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("spec {spec:?} contains characters outside [A-Za-z0-9_/-]")]
    InvalidSpecCharacters { spec: String },

    #[error("cannot resolve {}: {reason}", path.display())]
    PathResolutionFailure { path: PathBuf, reason: String },

    #[error("{} resolves to a {found} where a mapping record was expected", path.display())]
    InvalidLeafType { path: PathBuf, found: &'static str },

    #[error("record in {} has neither `spec` nor `repo`", path.display())]
    MissingSpec { path: PathBuf },

    #[error("unknown provider kind {kind:?}")]
    UnknownProviderKind { kind: String },

    #[error("permission denied for {}: {}", path.display(), reason.as_str())]
    PermissionDenied { path: PathBuf, reason: DenyReason },

    #[error("{} is not a directory", path.display())]
    NotADirectory { path: PathBuf },

    #[error("mount key {key:?} in {} is empty or has `.`/`..` components", path.display())]
    InvalidMountKey { path: PathBuf, key: String },

    #[error("spec {spec:?} is not valid for provider {kind}: {reason}")]
    InvalidProviderSpec {
        kind: &'static str,
        spec: String,
        reason: String,
    },
}

impl ResolveError {
    /// Stable machine-readable name, used by the CLI and the resolution log.
    pub fn kind(&self) -> &'static str {
        match self {
            ResolveError::InvalidSpecCharacters { .. } => "invalid_spec_characters",
            ResolveError::PathResolutionFailure { .. } => "path_resolution_failure",
            ResolveError::InvalidLeafType { .. } => "invalid_leaf_type",
            ResolveError::MissingSpec { .. } => "missing_spec",
            ResolveError::UnknownProviderKind { .. } => "unknown_provider_kind",
            ResolveError::PermissionDenied { .. } => "permission_denied",
            ResolveError::NotADirectory { .. } => "not_a_directory",
            ResolveError::InvalidMountKey { .. } => "invalid_mount_key",
            ResolveError::InvalidProviderSpec { .. } => "invalid_provider_spec",
        }
    }

    pub(crate) fn unresolved(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        ResolveError::PathResolutionFailure {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Failure inside a concrete repository provider.
///
/// Kept apart from [`ResolveError`]: a provider failing to look up a ref says
/// nothing about whether the curated definition was valid or authorized.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{kind}: ref {reference:?} cannot be resolved without a remote lookup")]
    LookupUnavailable {
        kind: &'static str,
        reference: String,
    },

    #[error("{kind}: {source}")]
    Io {
        kind: &'static str,
        #[source]
        source: std::io::Error,
    },
}
