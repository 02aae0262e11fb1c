use crate::error::{ProviderError, ResolveError};
use crate::providers::{ProviderContext, ProviderKind, RepoProvider, invalid_spec, pinned_ref};

const DEFAULT_REF: &str = "master";

#[derive(Debug)]
pub struct GistProvider {
    user: String,
    gist_id: String,
    reference: String,
}

impl GistProvider {
    /// Spec `user/gist-id[/ref]`; the ref defaults to `master`.
    pub fn boxed(spec: &str, _ctx: &ProviderContext) -> Result<Box<dyn RepoProvider>, ResolveError> {
        let mut parts = spec.splitn(3, '/');
        let (Some(user), Some(gist_id)) = (parts.next(), parts.next()) else {
            return Err(invalid_spec(ProviderKind::Gist, spec, "expected user/gist-id[/ref]"));
        };
        if user.is_empty() || gist_id.is_empty() {
            return Err(invalid_spec(ProviderKind::Gist, spec, "empty user or gist id"));
        }
        let reference = parts.next().filter(|r| !r.is_empty()).unwrap_or(DEFAULT_REF);
        Ok(Box::new(Self {
            user: user.to_string(),
            gist_id: gist_id.to_string(),
            reference: reference.to_string(),
        }))
    }
}

impl RepoProvider for GistProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gist
    }

    fn repo_url(&self) -> String {
        format!("https://gist.github.com/{}/{}", self.user, self.gist_id)
    }

    fn resolved_ref(&self) -> Result<String, ProviderError> {
        pinned_ref(ProviderKind::Gist, &self.reference)
    }
}
