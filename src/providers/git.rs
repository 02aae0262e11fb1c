use url::Url;

use crate::error::{ProviderError, ResolveError};
use crate::providers::{ProviderContext, ProviderKind, RepoProvider, invalid_spec, pinned_ref};

/// An arbitrary git remote, spec `<repo-url>/<ref>`.
///
/// The ref is everything after the last `/`, so it cannot itself contain one.
#[derive(Debug)]
pub struct GitUrlProvider {
    url: Url,
    reference: String,
}

impl GitUrlProvider {
    pub fn boxed(spec: &str, _ctx: &ProviderContext) -> Result<Box<dyn RepoProvider>, ResolveError> {
        let kind = ProviderKind::Git;
        let Some((repo, reference)) = spec.rsplit_once('/') else {
            return Err(invalid_spec(kind, spec, "expected <repo-url>/<ref>"));
        };
        if reference.is_empty() {
            return Err(invalid_spec(kind, spec, "empty ref"));
        }
        let url = Url::parse(repo).map_err(|e| invalid_spec(kind, spec, &e.to_string()))?;
        if url.cannot_be_a_base() {
            return Err(invalid_spec(kind, spec, "repository URL has no path"));
        }
        Ok(Box::new(Self {
            url,
            reference: reference.to_string(),
        }))
    }
}

impl RepoProvider for GitUrlProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Git
    }

    fn repo_url(&self) -> String {
        self.url.to_string()
    }

    fn resolved_ref(&self) -> Result<String, ProviderError> {
        pinned_ref(ProviderKind::Git, &self.reference)
    }
}
