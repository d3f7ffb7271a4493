//! Configuration management for Lumen.
//!
//! Two layers of configuration exist:
//!
//! - [`Settings`]: the global `settings.yaml` consumed by the server. It names
//!   the listener and maps host keys (`example.com`, `example.com/blog`,
//!   `default`) to document roots.
//! - [`SiteSettings`]: the per-host `site.yaml` found at each document root.
//!   It carries the document layout overrides plus a free-form tree exposed to
//!   templates through typed accessors.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! Host document roots support `${VAR}`, `${VAR:-default}` and a leading `~`.
//! Relative roots are resolved against the directory holding `settings.yaml`.

mod expand;
mod site;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

pub use site::{DocumentLayout, SITE_SETTINGS_FILENAME, SiteSettings};

/// Default name of the global settings file.
pub const SETTINGS_FILENAME: &str = "settings.yaml";

/// Host key used when no other key matches a request.
pub const DEFAULT_HOST: &str = "default";

/// The only server type this build can run.
const STANDALONE: &str = "standalone";

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override listen address.
    pub bind: Option<String>,
    /// Override listen port.
    pub port: Option<u16>,
    /// Override file watch backend.
    pub watch_backend: Option<WatchBackend>,
    /// Override hot reload.
    pub watch_enabled: Option<bool>,
}

/// Global server settings.
#[derive(Debug, Deserialize)]
pub struct Settings {
    /// Listener configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Hot reload configuration.
    #[serde(default)]
    pub watch: WatchConfig,
    /// Host key to document root, as written in the file.
    hosts: Option<BTreeMap<String, String>>,

    /// Host key to absolute document root (set after loading).
    #[serde(skip)]
    pub hosts_resolved: BTreeMap<String, PathBuf>,
    /// Path to the settings file (set after loading).
    #[serde(skip)]
    pub config_path: PathBuf,
}

/// Listener configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server type. Only `standalone` is supported.
    #[serde(rename = "type")]
    pub kind: String,
    /// Listen address.
    pub bind: String,
    /// Listen port.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            kind: STANDALONE.to_owned(),
            bind: "127.0.0.1".to_owned(),
            port: 9000,
        }
    }
}

/// File change notification backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchBackend {
    /// Native filesystem notifications.
    #[default]
    Notify,
    /// Modification time polling.
    Poll,
}

/// Hot reload configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Whether settings and templates are reloaded on change.
    pub enabled: bool,
    /// Backend used to observe file changes.
    pub backend: WatchBackend,
    /// Poll interval, or debounce window for the notify backend.
    pub interval_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: WatchBackend::Notify,
            interval_ms: 500,
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Settings file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// YAML parsing error.
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Settings field path (e.g., "`hosts.default`").
        field: String,
        /// Error message (e.g., "${`SITES`} not set").
        message: String,
    },
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

impl Settings {
    /// Load settings from `path` with optional CLI settings.
    ///
    /// CLI settings are applied after loading and path resolution, allowing CLI
    /// arguments to take precedence over settings file values.
    ///
    /// # Errors
    ///
    /// Returns error if the file doesn't exist, is a directory, fails to parse
    /// or fails validation.
    pub fn load(path: &Path, cli_settings: Option<&CliSettings>) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        if path.is_dir() {
            return Err(ConfigError::Validation(format!(
                "{} is a directory",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path)?;
        let config_dir = path.parent().unwrap_or(Path::new("."));
        let mut settings = Self::from_yaml(&content, config_dir)?;
        settings.config_path = path.to_path_buf();

        if let Some(cli) = cli_settings {
            settings.apply_cli_settings(cli);
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Parse settings from YAML text, resolving relative roots against `base`.
    fn from_yaml(content: &str, base: &Path) -> Result<Self, ConfigError> {
        let mut settings: Self = serde_yaml::from_str(content)?;
        settings.resolve_hosts(base)?;
        Ok(settings)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(bind) = &settings.bind {
            self.server.bind.clone_from(bind);
        }
        if let Some(port) = settings.port {
            self.server.port = port;
        }
        if let Some(backend) = settings.watch_backend {
            self.watch.backend = backend;
        }
        if let Some(enabled) = settings.watch_enabled {
            self.watch.enabled = enabled;
        }
    }

    /// Expand and resolve host document roots.
    fn resolve_hosts(&mut self, base: &Path) -> Result<(), ConfigError> {
        let hosts = self
            .hosts
            .as_ref()
            .ok_or_else(|| ConfigError::Validation("missing \"hosts\" entry".to_owned()))?;

        let mut resolved = BTreeMap::new();
        for (name, root) in hosts {
            let field = format!("hosts.{name}");
            require_non_empty(name, "hosts key")?;
            require_non_empty(root, &field)?;
            let expanded = expand::expand_path(root, &field)?;
            resolved.insert(name.clone(), base.join(expanded));
        }
        self.hosts_resolved = resolved;
        Ok(())
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.kind != STANDALONE {
            return Err(ConfigError::Validation(format!(
                "unsupported server.type \"{}\" (expected \"{STANDALONE}\")",
                self.server.kind
            )));
        }
        require_non_empty(&self.server.bind, "server.bind")?;
        if self.server.port == 0 {
            return Err(ConfigError::Validation(
                "server.port cannot be 0".to_owned(),
            ));
        }
        if self.watch.interval_ms == 0 {
            return Err(ConfigError::Validation(
                "watch.interval_ms must be greater than 0".to_owned(),
            ));
        }
        if self.hosts_resolved.is_empty() {
            return Err(ConfigError::Validation(
                "hosts must name at least one host".to_owned(),
            ));
        }
        Ok(())
    }

    /// Whether a `default` host is configured.
    #[must_use]
    pub fn has_default_host(&self) -> bool {
        self.hosts_resolved.contains_key(DEFAULT_HOST)
    }
}
