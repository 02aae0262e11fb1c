use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::leaf;
use crate::providers::ProviderKind;

/// Embedded default configuration.
const DEFAULT_CONFIG: &str = include_str!("../config.default.toml");

/// Environment variable naming an overlay file to use instead of the default location.
pub const CONFIG_ENV_VAR: &str = "SPECGATE_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ── Final (merged) config types ──

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub mounts: MountsConfig,
    #[serde(default)]
    pub local: LocalConfig,
    #[serde(default)]
    pub options: OptionsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ResolverConfig {
    /// Starting-path template with `{N}` / `{name}` placeholders.
    #[serde(default)]
    pub config_path: String,
    /// Per-directory mapping file name. Empty disables it.
    #[serde(default)]
    pub dir_config: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ProvidersConfig {
    /// Provider token used when a record names none.
    #[serde(default)]
    pub default: String,
    /// Provider tokens registered for dispatch.
    #[serde(default)]
    pub enabled: Vec<String>,
}

/// How synthetic mount names are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MountNaming {
    /// `mount1`, `mount2`, ... in iteration order.
    #[default]
    Positional,
    /// Reversible escape of the mount key; stable when mounts are added or removed.
    Escaped,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct MountsConfig {
    /// Byte-wise prefixes a mount host path must start with.
    #[serde(default)]
    pub allowed_prefixes: Vec<String>,
    /// Where relative mount keys are placed inside the container.
    #[serde(default)]
    pub home_mount_point: String,
    #[serde(default)]
    pub naming: MountNaming,
    /// Key under which the tenant's home is mounted into every launch.
    /// Empty disables the home mount.
    #[serde(default)]
    pub user_mount: String,
    /// Host path template of the tenant's home, filled like `config_path`.
    #[serde(default)]
    pub user_home: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct LocalConfig {
    /// Byte-wise prefixes a bare-directory repository must start with.
    #[serde(default)]
    pub allowed_paths: Vec<String>,
    /// File that must exist inside a bare-directory repository. Empty disables the check.
    #[serde(default)]
    pub required_marker: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct OptionsConfig {
    /// Leaf-record keys passed through as launch options.
    #[serde(default)]
    pub allowed: Vec<String>,
}

// ── Overlay types (user config that merges with defaults) ──

#[derive(Debug, Deserialize, Default)]
struct ConfigOverlay {
    #[serde(default)]
    settings: SettingsOverlay,
    #[serde(default)]
    resolver: ResolverOverlay,
    #[serde(default)]
    providers: ProvidersOverlay,
    #[serde(default)]
    mounts: MountsOverlay,
    #[serde(default)]
    local: LocalOverlay,
    #[serde(default)]
    options: OptionsOverlay,
}

#[derive(Debug, Deserialize, Default)]
struct SettingsOverlay {
    log_level: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct ResolverOverlay {
    config_path: Option<String>,
    dir_config: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct ProvidersOverlay {
    #[serde(default)]
    replace: bool,
    default: Option<String>,
    #[serde(default)]
    enabled: Vec<String>,
    #[serde(default)]
    remove_enabled: Vec<String>,
}

#[derive(Debug, Deserialize, Default)]
struct MountsOverlay {
    #[serde(default)]
    replace: bool,
    #[serde(default)]
    allowed_prefixes: Vec<String>,
    #[serde(default)]
    remove_allowed_prefixes: Vec<String>,
    home_mount_point: Option<String>,
    naming: Option<MountNaming>,
    user_mount: Option<String>,
    user_home: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct LocalOverlay {
    #[serde(default)]
    replace: bool,
    #[serde(default)]
    allowed_paths: Vec<String>,
    #[serde(default)]
    remove_allowed_paths: Vec<String>,
    required_marker: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct OptionsOverlay {
    #[serde(default)]
    replace: bool,
    #[serde(default)]
    allowed: Vec<String>,
    #[serde(default)]
    remove_allowed: Vec<String>,
}

// ── Merge logic ──

/// Merge a user list into a default list.
/// In replace mode: user list replaces default entirely.
/// In merge mode: remove items first, then extend with additions (deduped).
fn merge_list(base: &mut Vec<String>, add: Vec<String>, remove: &[String], replace: bool) {
    if replace {
        *base = add;
    } else {
        base.retain(|item| !remove.contains(item));
        for item in add {
            if !base.contains(&item) {
                base.push(item);
            }
        }
    }
}

impl Config {
    /// Load the default embedded configuration.
    pub fn default_config() -> Self {
        toml::from_str(DEFAULT_CONFIG).expect("embedded default config must parse")
    }

    /// Load configuration with resolution order:
    /// 1. Start with embedded defaults
    /// 2. Merge the overlay from `$SPECGATE_CONFIG`, or
    ///    ~/.config/specgate/config.toml when that variable is unset
    ///
    /// A missing overlay file is not an error; an unreadable or malformed one is.
    /// The merged result is validated before it is returned.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::default_config();
        if let Some(path) = Self::overlay_path()
            && path.exists()
        {
            config.apply_overlay(Self::read_overlay(&path)?);
        }
        config.validate()?;
        Ok(config)
    }

    /// Load defaults merged with an explicit overlay file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::default_config();
        config.apply_overlay(Self::read_overlay(path)?);
        config.validate()?;
        Ok(config)
    }

    fn overlay_path() -> Option<PathBuf> {
        if let Some(raw) = std::env::var_os(CONFIG_ENV_VAR) {
            let raw = raw.to_string_lossy().into_owned();
            let expanded = match shellexpand::full(&raw) {
                Ok(s) => s.into_owned(),
                Err(_) => raw.clone(),
            };
            return Some(PathBuf::from(expanded));
        }
        let home = std::env::var_os("HOME")?;
        Some(Path::new(&home).join(".config/specgate/config.toml"))
    }

    fn read_overlay(path: &Path) -> Result<ConfigOverlay, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply an overlay on top of this config (merge semantics).
    fn apply_overlay(&mut self, overlay: ConfigOverlay) {
        if let Some(v) = overlay.settings.log_level {
            self.settings.log_level = v;
        }

        if let Some(v) = overlay.resolver.config_path {
            self.resolver.config_path = v;
        }
        if let Some(v) = overlay.resolver.dir_config {
            self.resolver.dir_config = v;
        }

        let p = overlay.providers;
        merge_list(
            &mut self.providers.enabled,
            p.enabled,
            &p.remove_enabled,
            p.replace,
        );
        if let Some(v) = p.default {
            self.providers.default = v;
        }

        let m = overlay.mounts;
        merge_list(
            &mut self.mounts.allowed_prefixes,
            m.allowed_prefixes,
            &m.remove_allowed_prefixes,
            m.replace,
        );
        if let Some(v) = m.home_mount_point {
            self.mounts.home_mount_point = v;
        }
        if let Some(v) = m.naming {
            self.mounts.naming = v;
        }
        if let Some(v) = m.user_mount {
            self.mounts.user_mount = v;
        }
        if let Some(v) = m.user_home {
            self.mounts.user_home = v;
        }

        let l = overlay.local;
        merge_list(
            &mut self.local.allowed_paths,
            l.allowed_paths,
            &l.remove_allowed_paths,
            l.replace,
        );
        if let Some(v) = l.required_marker {
            self.local.required_marker = v;
        }

        let o = overlay.options;
        merge_list(&mut self.options.allowed, o.allowed, &o.remove_allowed, o.replace);
    }

    /// Reject configurations no resolution could run under.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.resolver.config_path.is_empty() {
            return Err(ConfigError::Invalid("resolver.config_path is empty".into()));
        }
        if let Some(bad) = self
            .providers
            .enabled
            .iter()
            .find(|t| ProviderKind::from_token(t).is_err())
        {
            return Err(ConfigError::Invalid(format!(
                "unknown provider {bad:?} in providers.enabled"
            )));
        }
        if !self.providers.enabled.contains(&self.providers.default) {
            return Err(ConfigError::Invalid(format!(
                "default provider {:?} is not in providers.enabled",
                self.providers.default
            )));
        }
        if !self.mounts.home_mount_point.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "mounts.home_mount_point {:?} is not absolute",
                self.mounts.home_mount_point
            )));
        }
        if !self.mounts.user_mount.is_empty() {
            if !leaf::is_mount_key(&self.mounts.user_mount) {
                return Err(ConfigError::Invalid(format!(
                    "mounts.user_mount {:?} is not a usable mount key",
                    self.mounts.user_mount
                )));
            }
            if self.mounts.user_home.is_empty() {
                return Err(ConfigError::Invalid(
                    "mounts.user_mount is set but mounts.user_home is empty".into(),
                ));
            }
        }
        Ok(())
    }

    /// Apply an overlay from a TOML string. Used for testing.
    #[cfg(test)]
    pub(crate) fn apply_overlay_str(&mut self, toml_str: &str) {
        let overlay: ConfigOverlay = toml::from_str(toml_str).unwrap();
        self.apply_overlay(overlay);
    }
}
