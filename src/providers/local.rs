use std::path::PathBuf;
use std::time::UNIX_EPOCH;

use url::Url;

use crate::error::{DenyReason, ProviderError, ResolveError};
use crate::providers::{ProviderContext, ProviderKind, RepoProvider, invalid_spec};

/// A directory in the curated namespace used directly as the repository.
#[derive(Debug)]
pub struct LocalDirProvider {
    path: PathBuf,
}

impl LocalDirProvider {
    /// The spec is the directory path. It must start with one of the allowed
    /// local paths (byte-wise, like mount prefixes).
    pub fn boxed(spec: &str, ctx: &ProviderContext) -> Result<Box<dyn RepoProvider>, ResolveError> {
        if !spec.starts_with('/') {
            return Err(invalid_spec(ProviderKind::LocalDir, spec, "not an absolute path"));
        }
        if !ctx
            .local_allowed_paths
            .iter()
            .any(|prefix| spec.starts_with(prefix.as_str()))
        {
            return Err(ResolveError::PermissionDenied {
                path: spec.into(),
                reason: DenyReason::LocalPathNotAllowed,
            });
        }
        Ok(Box::new(Self { path: spec.into() }))
    }
}

impl RepoProvider for LocalDirProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::LocalDir
    }

    fn repo_url(&self) -> String {
        Url::from_directory_path(&self.path)
            .map(String::from)
            .unwrap_or_else(|()| format!("file://{}", self.path.display()))
    }

    /// Directory modification time in seconds, as hex.
    fn resolved_ref(&self) -> Result<String, ProviderError> {
        let io = |source: std::io::Error| ProviderError::Io {
            kind: ProviderKind::LocalDir.token(),
            source,
        };
        let modified = std::fs::metadata(&self.path).and_then(|m| m.modified()).map_err(io)?;
        let secs = modified
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        Ok(format!("{secs:x}"))
    }
}
