//! The zuppaclaude settings document (`zc-settings.json`).
//!
//! Holds per-component install state and user preferences. Full backups carry
//! a snapshot of it; `settings export`/`import` move it between machines.

use crate::config::{Config, SETTINGS_FILE_NAME};
use crate::fs::copy::atomic_write;
use crate::prompt::Prompter;
use crate::{Result, ZuppaError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

pub const SETTINGS_VERSION: &str = "1.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsDocument {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
    /// Component name to install state, e.g. `{"rclone": {"installed": true}}`
    #[serde(default)]
    pub components: Map<String, Value>,
    #[serde(default)]
    pub preferences: Preferences,
    /// Present only in exported copies
    #[serde(rename = "_export", default, skip_serializing_if = "Option::is_none")]
    pub export: Option<ExportInfo>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default = "default_true")]
    pub auto_update_check: bool,
    #[serde(default = "default_true")]
    pub backup_configs: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportInfo {
    pub exported_at: DateTime<Utc>,
    pub hostname: String,
    pub source_path: PathBuf,
}

fn default_version() -> String {
    SETTINGS_VERSION.to_string()
}

fn default_true() -> bool {
    true
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            auto_update_check: true,
            backup_configs: true,
            extra: Map::new(),
        }
    }
}

impl Default for SettingsDocument {
    fn default() -> Self {
        Self {
            version: default_version(),
            created: None,
            updated: None,
            components: Map::new(),
            preferences: Preferences::default(),
            export: None,
            extra: Map::new(),
        }
    }
}

impl SettingsDocument {
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| ZuppaError::InvalidSettings(e.to_string()))
    }

    pub fn read_from(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(ZuppaError::SettingsNotFound(path.to_path_buf()));
        }
        Self::from_json(&fs::read_to_string(path)?)
    }

    fn component_flag(&self, name: &str, key: &str) -> bool {
        self.components
            .get(name)
            .and_then(|c| c.get(key))
            .map(|v| v.as_bool().unwrap_or(!v.is_null()))
            .unwrap_or(false)
    }
}

pub struct SettingsStore {
    config: Arc<Config>,
}

impl SettingsStore {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    pub fn path(&self) -> PathBuf {
        self.config.settings_file()
    }

    pub fn exists(&self) -> bool {
        self.path().is_file()
    }

    /// The current document, or `None` when absent or unreadable
    pub fn load(&self) -> Option<SettingsDocument> {
        let path = self.path();
        if !path.is_file() {
            return None;
        }
        match SettingsDocument::read_from(&path) {
            Ok(doc) => Some(doc),
            Err(e) => {
                warn!("Could not parse settings file: {}", e);
                None
            }
        }
    }

    /// Write `doc` as the current settings.
    ///
    /// Keeps the existing `created` stamp and refreshes `updated`.
    pub fn save(&self, mut doc: SettingsDocument) -> Result<SettingsDocument> {
        let now = Utc::now();
        doc.version = default_version();
        doc.created = self.load().and_then(|existing| existing.created).or(Some(now));
        doc.updated = Some(now);
        doc.export = None;

        self.write(&doc)?;
        info!("Settings saved to {}", self.path().display());
        Ok(doc)
    }

    fn write(&self, doc: &SettingsDocument) -> Result<()> {
        let path = self.path();
        atomic_write(&path, &serde_json::to_vec_pretty(doc)?)?;
        restrict_permissions(&path)?;
        Ok(())
    }

    /// Copy the current document into a backup folder. Returns whether there
    /// was anything to copy.
    pub fn write_snapshot(&self, dir: &Path) -> Result<bool> {
        let Some(doc) = self.load() else {
            return Ok(false);
        };
        fs::create_dir_all(dir)?;
        atomic_write(&dir.join(SETTINGS_FILE_NAME), &serde_json::to_vec_pretty(&doc)?)?;
        Ok(true)
    }

    /// Make a backed-up snapshot the current settings
    pub fn restore_snapshot(&self, snapshot: &Path) -> Result<SettingsDocument> {
        let doc = SettingsDocument::read_from(snapshot)?;
        self.save(doc)
    }

    /// Write the current document plus export metadata to `dest`
    pub fn export(&self, dest: &Path) -> Result<PathBuf> {
        let path = self.path();
        if !self.exists() {
            return Err(ZuppaError::SettingsNotFound(path));
        }
        let mut doc = SettingsDocument::read_from(&path)?;
        doc.export = Some(ExportInfo {
            exported_at: Utc::now(),
            hostname: self.config.identity.hostname.clone(),
            source_path: path,
        });

        let dest = expand_home(dest);
        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&dest, serde_json::to_vec_pretty(&doc)?)?;
        info!("Settings exported to: {}", dest.display());
        Ok(dest)
    }

    /// Replace the current document with the one at `src`.
    ///
    /// The existing file is kept as `<file>.backup.<timestamp>`, whose path is
    /// returned.
    pub fn import(&self, src: &Path) -> Result<Option<PathBuf>> {
        let src = expand_home(src);
        let mut doc = SettingsDocument::read_from(&src)?;

        let path = self.path();
        let previous = if self.exists() {
            let stamp = Utc::now().format("%Y-%m-%dT%H-%M-%S-%3fZ");
            let backup = PathBuf::from(format!("{}.backup.{}", path.display(), stamp));
            fs::copy(&path, &backup)?;
            info!("Existing settings backed up to: {}", backup.display());
            Some(backup)
        } else {
            None
        };

        doc.export = None;
        doc.updated = Some(Utc::now());
        self.write(&doc)?;

        info!("Settings imported from: {}", src.display());
        Ok(previous)
    }

    /// Delete the settings file after confirmation. Returns whether no
    /// settings remain.
    pub fn reset(&self, prompter: &dyn Prompter) -> Result<bool> {
        if !self.exists() {
            warn!("No settings file found");
            return Ok(true);
        }

        if !prompter.confirm("Are you sure you want to reset all settings?", false)? {
            info!("Reset cancelled");
            return Ok(false);
        }

        fs::remove_file(self.path())?;
        info!("Settings reset");
        Ok(true)
    }

    /// Print the current document
    pub fn show(&self) -> Result<()> {
        let path = self.path();
        if !self.exists() {
            warn!("No settings file found at: {}", path.display());
            return Ok(());
        }
        let doc = SettingsDocument::read_from(&path)?;
        let stamp = |t: Option<DateTime<Utc>>| t.map(|t| t.to_rfc3339()).unwrap_or_else(|| "-".to_string());
        let yes_no = |b: bool| if b { "Yes" } else { "No" };

        println!();
        println!("Settings file: {}", path.display());
        println!();
        println!("Version: {}", doc.version);
        println!("Created: {}", stamp(doc.created));
        println!("Updated: {}", stamp(doc.updated));
        println!();
        println!("Components:");
        if doc.components.is_empty() {
            println!("  (none)");
        }
        for (name, component) in &doc.components {
            println!("  {}: {}", name, yes_no(doc.component_flag(name, "installed")));
            if doc.component_flag(name, "api_key_encoded") {
                println!("    API Key: [configured]");
            }
            if let Some(remote) = component.get("remote").and_then(Value::as_str) {
                println!("    Remote: {}", remote);
            }
        }
        println!();
        println!("Preferences:");
        println!("  Auto-update check: {}", yes_no(doc.preferences.auto_update_check));
        println!("  Backup configs: {}", yes_no(doc.preferences.backup_configs));
        println!();
        Ok(())
    }
}

/// Replace a leading `~` with the home directory
fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match directories::BaseDirs::new() {
        Some(dirs) => dirs.home_dir().join(rest),
        None => path.to_path_buf(),
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
