//! specgate: resolves curated repository specs into vetted launch descriptors.
//!
//! A short user-supplied spec (`alice/analysis`) is validated, walked through
//! an administrator-curated tree of directories and mapping files, normalized
//! into a [`leaf::LaunchDescriptor`], dispatched to a repository provider, and
//! every host mount it requests is authorized before any [`launch::Mount`] is
//! produced.
//!
//! # Architecture
//!
//! - **[`spec`]**: Safe-charset check and segmentation of the raw spec.
//! - **[`resolve`]**: Template substitution and the recursive namespace walk; captures the anchor.
//! - **[`leaf`]**: Terminal record → launch descriptor (provider, spec, mounts, options).
//! - **[`providers`]**: Provider kinds, the registry, and concrete providers.
//! - **[`authorize`]**: Prefix, directory, and ownership checks for host mounts.
//! - **[`launch`]**: Authorized mounts → read-only volume records.
//! - **[`config`]**: Embedded defaults + user overlay merge.
//! - **[`logging`]**: stderr and file logging of resolutions.

/// Host-mount authorization against the resolution anchor.
pub mod authorize;
/// Configuration types, loading, and overlay merge logic.
pub mod config;
/// Resolution and provider error kinds.
pub mod error;
/// Reversible `[a-z0-9-]` escaping.
pub mod escape;
/// Filesystem seam: status, symlink scan, file reads.
pub mod fs;
/// Orchestrator mount records.
pub mod launch;
/// Leaf record normalization.
pub mod leaf;
/// Logger setup and per-request resolution log lines.
pub mod logging;
/// Provider registry and concrete repository providers.
pub mod providers;
/// Curated namespace traversal.
pub mod resolve;
/// Spec validation.
pub mod spec;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use log::info;
use serde::Deserialize;

use authorize::MountAuthorizer;
use config::Config;
use error::ResolveError;
use fs::{Filesystem, HostFilesystem};
use launch::Mount;
use leaf::LaunchDescriptor;
use providers::{ProviderRegistry, RepoProvider};
use resolve::{Anchor, PathResolver};
use spec::Spec;

/// One resolution request: the spec and any named template variables.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Request {
    pub spec: String,
    #[serde(default)]
    pub vars: BTreeMap<String, String>,
}

/// A fully vetted resolution. Every entry in `mounts` has been authorized.
#[derive(Debug)]
pub struct Resolution {
    pub descriptor: LaunchDescriptor,
    pub mounts: Vec<Mount>,
    pub provider: Box<dyn RepoProvider>,
    pub anchor: Anchor,
}

/// Resolves specs against one immutable configuration snapshot.
///
/// Shareable across threads; resolutions hold no mutable state.
pub struct Resolver<F: Filesystem = HostFilesystem> {
    config: Arc<Config>,
    registry: ProviderRegistry,
    fs: F,
}

impl Resolver<HostFilesystem> {
    pub fn new(config: Arc<Config>) -> Self {
        Self::with_filesystem(config, HostFilesystem)
    }
}

impl<F: Filesystem> Resolver<F> {
    pub fn with_filesystem(config: Arc<Config>, fs: F) -> Self {
        let registry = ProviderRegistry::from_config(&config);
        Self {
            config,
            registry,
            fs,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn filesystem(&self) -> &F {
        &self.fs
    }

    pub fn resolve(&self, spec: &str) -> Result<Resolution, ResolveError> {
        self.resolve_with(spec, &BTreeMap::new())
    }

    /// Validate, walk, extract, dispatch, authorize, build. Fails fast on the
    /// first violated check; no partial result is returned.
    pub fn resolve_with(
        &self,
        spec: &str,
        vars: &BTreeMap<String, String>,
    ) -> Result<Resolution, ResolveError> {
        let spec = Spec::parse(spec)?;
        let raw = PathResolver::new(&self.fs, &self.config.resolver, &self.config.local)
            .resolve(&self.config.resolver.config_path, &spec, vars)?;
        let anchor = raw.anchor;
        let mut descriptor = leaf::extract(raw.terminal, &self.config)?;
        let provider = self
            .registry
            .instantiate(descriptor.provider_kind, &descriptor.resolved_spec)?;

        // A record's own mount under the same key takes precedence.
        if let Some((key, home)) = self.user_home(&spec, vars)?
            && !descriptor.mounts.iter().any(|(k, _)| *k == key)
        {
            descriptor.mounts.push((key, home));
        }

        MountAuthorizer::new(&self.fs, &self.config.mounts.allowed_prefixes, &anchor)
            .authorize_all(&descriptor.mounts)?;
        let mounts = launch::build_mounts(
            &descriptor.mounts,
            self.config.mounts.naming,
            &self.config.mounts.home_mount_point,
        );

        info!(
            "{} resolved to {}:{} via {}",
            spec.raw(),
            descriptor.provider_kind,
            descriptor.resolved_spec,
            anchor.path.display()
        );
        Ok(Resolution {
            descriptor,
            mounts,
            provider,
            anchor,
        })
    }

    /// The tenant's home as a `(key, host path)` mount, when configured.
    fn user_home(
        &self,
        spec: &Spec,
        vars: &BTreeMap<String, String>,
    ) -> Result<Option<(String, PathBuf)>, ResolveError> {
        let mounts = &self.config.mounts;
        if mounts.user_mount.is_empty() {
            return Ok(None);
        }
        let home = resolve::template::substitute(&mounts.user_home, spec.segments(), vars)?;
        Ok(Some((mounts.user_mount.clone(), PathBuf::from(home.path))))
    }

    /// Resolve each request on its own thread; results are in request order.
    pub fn resolve_many(&self, requests: &[Request]) -> Vec<Result<Resolution, ResolveError>> {
        std::thread::scope(|scope| {
            let handles: Vec<_> = requests
                .iter()
                .map(|r| scope.spawn(move || self.resolve_with(&r.spec, &r.vars)))
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
                .collect()
        })
    }
}

/// Resolve a spec with the default configuration on the host filesystem.
///
/// This is the main entry point for tests and simple usage.
/// For CLI usage with a user overlay, build a [`Resolver`] directly.
pub fn resolve(spec: &str) -> Result<Resolution, ResolveError> {
    Resolver::new(Arc::new(Config::default_config())).resolve(spec)
}
