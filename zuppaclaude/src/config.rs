//! Configuration management for zuppaclaude.
//!
//! Defaults are detected from the host (home directory, hostname, login name),
//! then layered with an optional TOML file and `ZUPPACLAUDE__SECTION__KEY`
//! environment overrides. The resulting [`Config`] is immutable and handed to
//! every component at construction time.

use crate::{Result, ZuppaError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name of the optional configuration file inside the config directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// File name of the settings document, both live and inside backups.
pub const SETTINGS_FILE_NAME: &str = "zc-settings.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub paths: PathsConfig,
    pub identity: IdentityConfig,
    pub cloud: CloudConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Claude Code data directory (`~/.claude`)
    pub claude_dir: PathBuf,

    /// zuppaclaude configuration directory (`~/.config/zuppaclaude`)
    pub config_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Sanitized host name used to namespace backups
    pub hostname: String,

    /// Sanitized login name used to namespace backups
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudConfig {
    /// Top-level folder on the remote
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Nest backups under `{hostname}/{username}` locally and remotely
    #[serde(default = "default_host_scoped")]
    pub host_scoped: bool,

    /// rclone executable name or path
    #[serde(default = "default_rclone_binary")]
    pub rclone_binary: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default values
fn default_namespace() -> String {
    "zuppaclaude-backups".to_string()
}

fn default_host_scoped() -> bool {
    true
}

fn default_rclone_binary() -> String {
    "rclone".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Build a configuration for explicit directories and identity.
    pub fn new(
        claude_dir: impl Into<PathBuf>,
        config_dir: impl Into<PathBuf>,
        hostname: &str,
        username: &str,
    ) -> Self {
        Config {
            paths: PathsConfig {
                claude_dir: claude_dir.into(),
                config_dir: config_dir.into(),
            },
            identity: IdentityConfig {
                hostname: sanitize_identity(hostname, "unknown-host"),
                username: sanitize_identity(username, "unknown-user"),
            },
            cloud: CloudConfig {
                namespace: default_namespace(),
                host_scoped: default_host_scoped(),
                rclone_binary: default_rclone_binary(),
            },
            log: LogConfig {
                level: default_log_level(),
            },
        }
    }

    /// Detect defaults from the current host.
    pub fn detect() -> Result<Self> {
        let home = directories::BaseDirs::new()
            .map(|dirs| dirs.home_dir().to_path_buf())
            .ok_or_else(|| ZuppaError::Config("cannot determine home directory".to_string()))?;

        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_default();
        let username = detect_username().unwrap_or_default();

        Ok(Config::new(
            home.join(".claude"),
            home.join(".config").join("zuppaclaude"),
            &hostname,
            &username,
        ))
    }

    /// Load configuration: detected defaults, then the TOML file, then environment.
    ///
    /// An explicit `path` must exist; the default `config.toml` is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let defaults = Config::detect()?;
        let (file, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (defaults.paths.config_dir.join(CONFIG_FILE_NAME), false),
        };

        let layered = config::Config::builder()
            .add_source(config::Config::try_from(&defaults)?)
            .add_source(
                config::File::from(file.as_path())
                    .format(config::FileFormat::Toml)
                    .required(required),
            )
            .add_source(
                config::Environment::with_prefix("ZUPPACLAUDE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut config: Config = layered.try_deserialize()?;
        config.identity.hostname = sanitize_identity(&config.identity.hostname, "unknown-host");
        config.identity.username = sanitize_identity(&config.identity.username, "unknown-user");
        Ok(config)
    }

    /// Directory holding one sub-directory per project
    pub fn projects_dir(&self) -> PathBuf {
        self.paths.claude_dir.join("projects")
    }

    /// Process-wide command history log
    pub fn history_file(&self) -> PathBuf {
        self.paths.claude_dir.join("history.jsonl")
    }

    /// Live settings document
    pub fn settings_file(&self) -> PathBuf {
        self.paths.config_dir.join(SETTINGS_FILE_NAME)
    }

    /// Root of the local backup tree: `backups/[{host}/{user}]`
    pub fn backup_root(&self) -> PathBuf {
        let root = self.paths.config_dir.join("backups");
        if self.cloud.host_scoped {
            root.join(&self.identity.hostname).join(&self.identity.username)
        } else {
            root
        }
    }

    /// Remote folder all archives live under: `{namespace}[/{host}/{user}]`
    pub fn cloud_base(&self) -> String {
        let namespace = self.cloud.namespace.trim_matches('/');
        if self.cloud.host_scoped {
            format!("{}/{}/{}", namespace, self.identity.hostname, self.identity.username)
        } else {
            namespace.to_string()
        }
    }
}

/// Lowercase, keep `[a-z0-9-]`, collapse dashes, drop a macOS `.local` suffix.
pub fn sanitize_identity(raw: &str, fallback: &str) -> String {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_suffix(".local").unwrap_or(trimmed);

    let mut out = String::with_capacity(trimmed.len());
    for c in trimmed.to_lowercase().chars() {
        let c = if c.is_ascii_lowercase() || c.is_ascii_digit() { c } else { '-' };
        if c == '-' && out.ends_with('-') {
            continue;
        }
        out.push(c);
    }

    let out = out.trim_matches('-');
    if out.is_empty() {
        fallback.to_string()
    } else {
        out.to_string()
    }
}

#[cfg(unix)]
fn detect_username() -> Option<String> {
    nix::unistd::User::from_uid(nix::unistd::getuid())
        .ok()
        .flatten()
        .map(|user| user.name)
        .or_else(|| std::env::var("USER").ok())
}

#[cfg(not(unix))]
fn detect_username() -> Option<String> {
    std::env::var("USERNAME").ok()
}
