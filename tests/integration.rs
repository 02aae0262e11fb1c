use std::os::unix::fs::{PermissionsExt, symlink};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use specgate::Resolver;
use specgate::config::{Config, MountNaming};
use specgate::error::{DenyReason, ResolveError};
use specgate::launch::Mount;
use specgate::providers::ProviderKind;

/// A curated namespace under a temp dir, with `cfg/` for definitions and
/// `mnt/home/` as the only allowed mount prefix.
struct Namespace {
    tmp: tempfile::TempDir,
}

impl Namespace {
    fn new() -> Self {
        let ns = Self {
            tmp: tempfile::tempdir().unwrap(),
        };
        std::fs::create_dir_all(ns.path("cfg")).unwrap();
        std::fs::create_dir_all(ns.path("mnt/home")).unwrap();
        ns
    }

    fn path(&self, rel: &str) -> PathBuf {
        self.tmp.path().join(rel)
    }

    fn root(&self) -> String {
        self.tmp.path().to_str().unwrap().to_string()
    }

    fn write(&self, rel: &str, contents: &str) {
        let path = self.path(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    fn dir(&self, rel: &str, mode: u32) -> PathBuf {
        let path = self.path(rel);
        std::fs::create_dir_all(&path).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode)).unwrap();
        path
    }

    fn link(&self, rel: &str, target: &Path) {
        symlink(target, self.path(rel)).unwrap();
    }

    fn config(&self, template: &str) -> Config {
        let root = self.root();
        let mut config = Config::default_config();
        config.resolver.config_path = format!("{root}/{template}");
        config.mounts.allowed_prefixes = vec![format!("{root}/mnt/home/")];
        config.local.allowed_paths = vec![format!("{root}/cfg/")];
        config.local.required_marker = String::new();
        config.mounts.user_mount = String::new();
        config
    }

    fn resolver(&self, template: &str) -> Resolver {
        Resolver::new(Arc::new(self.config(template)))
    }
}

// ── Spec validation (default config; nothing on disk is consulted) ──

macro_rules! rejects_spec {
    ($name:ident, $spec:expr) => {
        #[test]
        fn $name() {
            let err = specgate::resolve($spec).unwrap_err();
            assert_eq!(err.kind(), "invalid_spec_characters", "spec: {:?}", $spec);
        }
    };
}

rejects_spec!(rejects_parent_dir, "alice/../../etc");
rejects_spec!(rejects_dot, "alice/.ssh");
rejects_spec!(rejects_space, "alice repo");
rejects_spec!(rejects_tilde, "~alice");
rejects_spec!(rejects_glob, "alice/*");
rejects_spec!(rejects_placeholder, "{0}");
rejects_spec!(rejects_newline, "alice\nbob");
rejects_spec!(rejects_non_ascii, "alicé");

// ── Scenario A: mapping file selected by template ──

#[test]
fn scenario_a_mapping_file() {
    let ns = Namespace::new();
    ns.write("cfg/alice/repo.yaml", "spec: a/b/master\n");
    let res = ns.resolver("cfg/{0}/repo.yaml").resolve("alice/repo").unwrap();
    assert_eq!(res.descriptor.provider_kind, ProviderKind::GitHub);
    assert_eq!(res.descriptor.resolved_spec, "a/b/master");
    assert!(res.descriptor.mounts.is_empty());
    assert!(res.mounts.is_empty());
    assert_eq!(res.anchor.path, ns.path("cfg/alice/repo.yaml"));
}

// ── Scenario B: bare directory with a symlinked mount ──

#[test]
fn scenario_b_bare_directory_mount() {
    let ns = Namespace::new();
    ns.dir("cfg/bob", 0o755);
    let data = ns.dir("mnt/home/bob/data", 0o750);
    ns.link("cfg/bob/data", &data);

    let res = ns.resolver("cfg/{0}").resolve("bob").unwrap();
    assert_eq!(res.descriptor.provider_kind, ProviderKind::LocalDir);
    assert_eq!(
        res.mounts,
        vec![Mount {
            name: "mount1".into(),
            host_path: data,
            mount_path: "/home/jovyan/data".into(),
            read_only: true,
        }]
    );
}

// ── Scenario C: symlink outside the allowed prefixes ──

#[test]
fn scenario_c_mount_outside_prefix() {
    let ns = Namespace::new();
    ns.dir("cfg/bob", 0o755);
    ns.link("cfg/bob/secrets", Path::new("/etc/secrets"));

    let err = ns.resolver("cfg/{0}").resolve("bob").unwrap_err();
    match err {
        ResolveError::PermissionDenied { path, reason } => {
            assert_eq!(path, PathBuf::from("/etc/secrets"));
            assert_eq!(reason, DenyReason::OutsideAllowedPrefix);
        }
        other => panic!("expected PermissionDenied, got {other:?}"),
    }
}

#[test]
fn one_bad_link_rejects_all_mounts() {
    let ns = Namespace::new();
    ns.dir("cfg/bob", 0o755);
    let data = ns.dir("mnt/home/bob/data", 0o755);
    ns.link("cfg/bob/a-data", &data);
    ns.link("cfg/bob/z-secrets", Path::new("/etc"));
    assert!(ns.resolver("cfg/{0}").resolve("bob").is_err());
}

#[test]
fn chained_symlink_is_not_a_directory() {
    let ns = Namespace::new();
    ns.dir("cfg/bob", 0o755);
    let data = ns.dir("mnt/home/bob/data", 0o755);
    let alias = ns.path("mnt/home/bob/alias");
    symlink(&data, &alias).unwrap();
    ns.link("cfg/bob/data", &alias);

    let err = ns.resolver("cfg/{0}").resolve("bob").unwrap_err();
    assert!(matches!(err, ResolveError::NotADirectory { .. }));
}

#[test]
fn parent_dir_mount_in_record_cannot_leave_prefix() {
    let ns = Namespace::new();
    let escape = format!("{}/mnt/home/../../../../../../../../etc", ns.root());
    ns.write("cfg/mallory.yaml", &format!("spec: m/r/main\nmounts:\n  x: {escape}\n"));
    let err = ns.resolver("cfg/{0}").resolve("mallory").unwrap_err();
    match err {
        ResolveError::PermissionDenied { path, reason } => {
            assert_eq!(path, PathBuf::from(escape));
            assert_eq!(reason, DenyReason::NonCanonicalPath);
        }
        other => panic!("expected PermissionDenied, got {other:?}"),
    }
}

#[test]
fn relative_symlink_cannot_climb_out_of_prefix() {
    let ns = Namespace::new();
    ns.dir("mnt/home/bob/public_binder", 0o755);
    ns.link("mnt/home/bob/public_binder/x", Path::new("../../../../../../../../etc"));
    let mut config = ns.config("mnt/home/{0}/public_binder");
    config.local.allowed_paths.push(format!("{}/mnt/home/", ns.root()));
    let err = Resolver::new(Arc::new(config)).resolve("bob").unwrap_err();
    assert!(
        matches!(
            err,
            ResolveError::PermissionDenied {
                reason: DenyReason::NonCanonicalPath,
                ..
            }
        ),
        "{err:?}"
    );
}

#[test]
fn mount_key_cannot_target_outside_home() {
    let ns = Namespace::new();
    let data = ns.dir("mnt/home/bob/data", 0o755);
    ns.write(
        "cfg/bob.yaml",
        &format!("spec: b/r/main\nmounts:\n  ../../usr/bin: {}\n", data.display()),
    );
    let err = ns.resolver("cfg/{0}").resolve("bob").unwrap_err();
    assert_eq!(err.kind(), "invalid_mount_key");
}

// ── Per-directory config and the tenant home ──

#[test]
fn directory_config_file_is_the_record() {
    let ns = Namespace::new();
    ns.dir("cfg/bob", 0o755);
    ns.write("cfg/bob/.public_binder", "spec: bob/site/main\nmem_limit: 2G\n");
    let res = ns.resolver("cfg/{0}").resolve("bob").unwrap();
    assert_eq!(res.descriptor.provider_kind, ProviderKind::GitHub);
    assert_eq!(res.descriptor.resolved_spec, "bob/site/main");
    assert_eq!(res.anchor.path, ns.path("cfg/bob/.public_binder"));
}

#[test]
fn empty_directory_config_is_only_a_marker() {
    let ns = Namespace::new();
    ns.dir("cfg/bob", 0o755);
    ns.write("cfg/bob/.public_binder", "");
    let mut config = ns.config("cfg/{0}");
    config.local.required_marker = ".public_binder".into();
    let res = Resolver::new(Arc::new(config)).resolve("bob").unwrap();
    assert_eq!(res.descriptor.provider_kind, ProviderKind::LocalDir);
}

#[test]
fn tenant_home_mounted_into_every_launch() {
    let ns = Namespace::new();
    let home = ns.dir("mnt/home/alice", 0o750);
    ns.write("cfg/alice.yaml", "nb:\n  spec: a/nb/main\n");
    let mut config = ns.config("cfg/{0}");
    config.mounts.user_mount = "home".into();
    config.mounts.user_home = format!("{}/mnt/home/{{0}}", ns.root());
    let res = Resolver::new(Arc::new(config)).resolve("alice/nb").unwrap();
    assert_eq!(
        res.mounts,
        vec![Mount {
            name: "mount1".into(),
            host_path: home,
            mount_path: "/home/jovyan/home".into(),
            read_only: true,
        }]
    );
}

// ── Leaf records ──

#[test]
fn repo_without_branch_defaults_to_master() {
    let ns = Namespace::new();
    ns.write("cfg/carol.yaml", "proj:\n  repo: org/name\n");
    let res = ns.resolver("cfg/{0}").resolve("carol/proj").unwrap();
    assert_eq!(res.descriptor.resolved_spec, "org/name/master");
    assert_eq!(res.provider.repo_url(), "https://github.com/org/name");
}

#[test]
fn record_without_spec_or_repo() {
    let ns = Namespace::new();
    ns.write("cfg/carol.yaml", "proj:\n  branch: main\n");
    let err = ns.resolver("cfg/{0}").resolve("carol/proj").unwrap_err();
    assert!(matches!(err, ResolveError::MissingSpec { .. }));
}

#[test]
fn scalar_leaf_rejected() {
    let ns = Namespace::new();
    ns.write("cfg/carol.json", r#"{"proj": "org/name/main"}"#);
    let err = ns.resolver("cfg/{0}").resolve("carol/proj").unwrap_err();
    assert!(matches!(err, ResolveError::InvalidLeafType { .. }));
}

#[test]
fn file_named_by_segment_is_not_named_twice() {
    let ns = Namespace::new();
    ns.write("cfg/team/projects.yaml", "spec: t/p/main\n");
    let resolver = ns.resolver("cfg");
    assert!(resolver.resolve("team/projects").is_ok());
    let err = resolver.resolve("team/projects/projects").unwrap_err();
    assert!(matches!(err, ResolveError::PathResolutionFailure { .. }));
}

#[test]
fn missing_key_rejected() {
    let ns = Namespace::new();
    ns.write("cfg/carol.yaml", "proj:\n  spec: a/b/c\n");
    let err = ns.resolver("cfg/{0}").resolve("carol/other").unwrap_err();
    assert!(matches!(err, ResolveError::PathResolutionFailure { .. }));
}

#[test]
fn explicit_mounts_authorized_and_named_by_key() {
    let ns = Namespace::new();
    let shared = ns.dir("mnt/home/team/shared", 0o755);
    ns.write(
        "cfg/team.yaml",
        &format!(
            "nb:\n  spec: team/nb/main\n  cpu_limit: 2\n  mounts:\n    shared: {}\n",
            shared.display()
        ),
    );
    let mut config = ns.config("cfg/{0}");
    config.mounts.naming = MountNaming::Escaped;
    let res = Resolver::new(Arc::new(config)).resolve("team/nb").unwrap();
    assert_eq!(res.mounts.len(), 1);
    assert_eq!(res.mounts[0].name, "mount-shared");
    assert_eq!(res.mounts[0].host_path, shared);
    assert_eq!(
        res.descriptor.options.get("cpu_limit").and_then(|v| v.as_u64()),
        Some(2)
    );
}

// ── Determinism ──

#[test]
fn repeated_resolution_is_identical() {
    let ns = Namespace::new();
    ns.dir("cfg/bob", 0o755);
    let data = ns.dir("mnt/home/bob/data", 0o750);
    let more = ns.dir("mnt/home/bob/more", 0o755);
    ns.link("cfg/bob/data", &data);
    ns.link("cfg/bob/more", &more);

    let resolver = ns.resolver("cfg/{0}");
    let first = resolver.resolve("bob").unwrap();
    for _ in 0..5 {
        let again = resolver.resolve("bob").unwrap();
        assert_eq!(again.descriptor, first.descriptor);
        assert_eq!(again.mounts, first.mounts);
    }
    assert_eq!(first.mounts[0].name, "mount1");
    assert_eq!(first.mounts[1].name, "mount2");
}
