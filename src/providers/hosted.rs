use crate::error::{ProviderError, ResolveError};
use crate::providers::{ProviderContext, ProviderKind, RepoProvider, invalid_spec, pinned_ref};

/// A repository on a git hosting service, spec `namespace/project/ref`.
///
/// GitHub takes exactly `org/repo/ref` (the ref may itself contain `/`).
/// GitLab namespaces may be nested, so the last segment is the ref and
/// everything before it is the project path.
#[derive(Debug)]
pub struct HostedGitProvider {
    kind: ProviderKind,
    host: &'static str,
    project: String,
    reference: String,
}

impl HostedGitProvider {
    pub fn github(spec: &str, _ctx: &ProviderContext) -> Result<Box<dyn RepoProvider>, ResolveError> {
        let kind = ProviderKind::GitHub;
        let mut parts = spec.splitn(3, '/');
        let (Some(org), Some(repo), Some(reference)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid_spec(kind, spec, "expected org/repo/ref"));
        };
        if org.is_empty() || repo.is_empty() || reference.is_empty() {
            return Err(invalid_spec(kind, spec, "empty org, repo, or ref"));
        }
        Ok(Box::new(Self {
            kind,
            host: "github.com",
            project: format!("{org}/{repo}"),
            reference: reference.to_string(),
        }))
    }

    pub fn gitlab(spec: &str, _ctx: &ProviderContext) -> Result<Box<dyn RepoProvider>, ResolveError> {
        let kind = ProviderKind::GitLab;
        let Some((project, reference)) = spec.rsplit_once('/') else {
            return Err(invalid_spec(kind, spec, "expected namespace/project/ref"));
        };
        if reference.is_empty() || !project.contains('/') || project.split('/').any(str::is_empty)
        {
            return Err(invalid_spec(kind, spec, "expected namespace/project/ref"));
        }
        Ok(Box::new(Self {
            kind,
            host: "gitlab.com",
            project: project.to_string(),
            reference: reference.to_string(),
        }))
    }
}

impl RepoProvider for HostedGitProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn repo_url(&self) -> String {
        format!("https://{}/{}", self.host, self.project)
    }

    fn resolved_ref(&self) -> Result<String, ProviderError> {
        pinned_ref(self.kind, &self.reference)
    }
}
