//! Repository providers and the registry that dispatches to them.
//!
//! A provider turns a resolved spec string into something the build pipeline
//! can fetch. Only the kinds listed in `providers.enabled` are registered;
//! anything else is an [`ResolveError::UnknownProviderKind`].

/// Gist-backed repositories (`user/id[/ref]`).
pub mod gist;
/// Plain git URLs (`<repo-url>/<ref>`).
pub mod git;
/// GitHub and GitLab (`org/repo/ref`).
pub mod hosted;
/// Local directories found as bare repositories in the curated namespace.
pub mod local;

use std::collections::HashMap;
use std::fmt;

use crate::config::Config;
use crate::error::{ProviderError, ResolveError};
use crate::escape;

/// Closed set of provider kinds, identified in records by a short token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProviderKind {
    GitHub,
    GitLab,
    Gist,
    Git,
    LocalDir,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 5] = [
        ProviderKind::GitHub,
        ProviderKind::GitLab,
        ProviderKind::Gist,
        ProviderKind::Git,
        ProviderKind::LocalDir,
    ];

    pub fn token(self) -> &'static str {
        match self {
            ProviderKind::GitHub => "gh",
            ProviderKind::GitLab => "gl",
            ProviderKind::Gist => "gist",
            ProviderKind::Git => "git",
            ProviderKind::LocalDir => "dir",
        }
    }

    pub fn from_token(token: &str) -> Result<Self, ResolveError> {
        Self::ALL
            .into_iter()
            .find(|k| k.token() == token)
            .ok_or_else(|| ResolveError::UnknownProviderKind {
                kind: token.to_string(),
            })
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Capabilities every concrete provider exposes to the outer service.
pub trait RepoProvider: Send + Sync + fmt::Debug {
    fn kind(&self) -> ProviderKind;

    fn repo_url(&self) -> String;

    /// The commit (or equivalent) to build. May need a remote lookup.
    fn resolved_ref(&self) -> Result<String, ProviderError>;

    /// Image-name-safe identifier for the repository.
    fn build_slug(&self) -> String {
        escape::escape(&self.repo_url().to_lowercase())
    }
}

/// Settings constructors may need beyond the spec string.
#[derive(Debug, Clone, Default)]
pub struct ProviderContext {
    pub local_allowed_paths: Vec<String>,
}

type Constructor = fn(&str, &ProviderContext) -> Result<Box<dyn RepoProvider>, ResolveError>;

/// Registry of enabled provider kinds, keyed by kind.
pub struct ProviderRegistry {
    constructors: HashMap<ProviderKind, Constructor>,
    context: ProviderContext,
}

impl ProviderRegistry {
    /// Build the registry from configuration. Unknown tokens are skipped;
    /// `Config::validate` rejects them up front.
    pub fn from_config(config: &Config) -> Self {
        let mut constructors: HashMap<ProviderKind, Constructor> = HashMap::new();
        for kind in config
            .providers
            .enabled
            .iter()
            .filter_map(|t| ProviderKind::from_token(t).ok())
        {
            constructors.insert(kind, constructor(kind));
        }
        Self {
            constructors,
            context: ProviderContext {
                local_allowed_paths: config.local.allowed_paths.clone(),
            },
        }
    }

    pub fn is_registered(&self, kind: ProviderKind) -> bool {
        self.constructors.contains_key(&kind)
    }

    /// Instantiate the provider for `kind` with the resolved spec.
    pub fn instantiate(
        &self,
        kind: ProviderKind,
        spec: &str,
    ) -> Result<Box<dyn RepoProvider>, ResolveError> {
        let ctor = self
            .constructors
            .get(&kind)
            .ok_or_else(|| ResolveError::UnknownProviderKind {
                kind: kind.token().to_string(),
            })?;
        ctor(spec, &self.context)
    }
}

fn constructor(kind: ProviderKind) -> Constructor {
    match kind {
        ProviderKind::GitHub => hosted::HostedGitProvider::github,
        ProviderKind::GitLab => hosted::HostedGitProvider::gitlab,
        ProviderKind::Gist => gist::GistProvider::boxed,
        ProviderKind::Git => git::GitUrlProvider::boxed,
        ProviderKind::LocalDir => local::LocalDirProvider::boxed,
    }
}

/// True for a full 40-character hex commit id.
pub(crate) fn is_commit_sha(reference: &str) -> bool {
    reference.len() == 40 && reference.bytes().all(|b| b.is_ascii_hexdigit())
}

/// A ref that can be returned as-is, or the error a remote lookup would be needed for.
pub(crate) fn pinned_ref(kind: ProviderKind, reference: &str) -> Result<String, ProviderError> {
    if is_commit_sha(reference) {
        Ok(reference.to_lowercase())
    } else {
        Err(ProviderError::LookupUnavailable {
            kind: kind.token(),
            reference: reference.to_string(),
        })
    }
}

pub(crate) fn invalid_spec(kind: ProviderKind, spec: &str, reason: &str) -> ResolveError {
    ResolveError::InvalidProviderSpec {
        kind: kind.token(),
        spec: spec.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_round_trip() {
        for kind in ProviderKind::ALL {
            assert_eq!(ProviderKind::from_token(kind.token()).unwrap(), kind);
        }
    }

    #[test]
    fn unknown_token() {
        assert!(matches!(
            ProviderKind::from_token("svn"),
            Err(ResolveError::UnknownProviderKind { .. })
        ));
    }

    #[test]
    fn registry_only_holds_enabled_kinds() {
        let mut config = Config::default_config();
        config.providers.enabled = vec!["gh".into(), "dir".into()];
        let registry = ProviderRegistry::from_config(&config);
        assert!(registry.is_registered(ProviderKind::GitHub));
        assert!(!registry.is_registered(ProviderKind::Gist));
        let err = registry
            .instantiate(ProviderKind::Gist, "user/abc")
            .unwrap_err();
        assert!(matches!(err, ResolveError::UnknownProviderKind { .. }));
    }

    #[test]
    fn dispatches_to_concrete_provider() {
        let registry = ProviderRegistry::from_config(&Config::default_config());
        let provider = registry
            .instantiate(ProviderKind::GitHub, "org/repo/main")
            .unwrap();
        assert_eq!(provider.kind(), ProviderKind::GitHub);
        assert_eq!(provider.repo_url(), "https://github.com/org/repo");
    }

    #[test]
    fn pinned_refs() {
        let sha = "0123456789abcdef0123456789ABCDEF01234567";
        assert_eq!(
            pinned_ref(ProviderKind::Git, sha).unwrap(),
            sha.to_lowercase()
        );
        assert!(matches!(
            pinned_ref(ProviderKind::Git, "main"),
            Err(ProviderError::LookupUnavailable { .. })
        ));
    }
}
