//! Backup manifest, serialized as `manifest.json` in each backup directory.
//!
//! The manifest is the last file the archiver writes. A backup directory
//! without a readable manifest is incomplete: the catalog lists it with zero
//! counts and the restore engine refuses it.

use crate::backup::id::BackupId;
use crate::fs::copy::atomic_write;
use crate::session::SessionKind;
use crate::{Result, ZuppaError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(rename = "timestamp")]
    pub id: BackupId,
    #[serde(rename = "timestampISO")]
    pub created_at: DateTime<Utc>,
    /// zuppaclaude version that wrote the backup
    pub version: String,
    pub hostname: String,
    pub username: String,
    #[serde(default)]
    pub projects: Vec<ProjectEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<HistoryEntry>,
    /// Whether a settings snapshot was stored alongside
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<bool>,
    #[serde(rename = "backupType", default, skip_serializing_if = "Option::is_none")]
    pub backup_type: Option<BackupType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupType {
    Sessions,
    Full,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectEntry {
    pub id: String,
    pub path: String,
    #[serde(default)]
    pub sessions: Vec<SessionEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEntry {
    pub id: String,
    pub file: String,
    pub size: u64,
    pub modified: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: SessionKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub size: u64,
    pub modified: DateTime<Utc>,
}

impl Manifest {
    pub fn new(id: BackupId, hostname: &str, username: &str) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            hostname: hostname.to_string(),
            username: username.to_string(),
            projects: Vec::new(),
            history: None,
            settings: None,
            backup_type: Some(BackupType::Sessions),
        }
    }

    pub fn session_count(&self) -> usize {
        self.projects.iter().map(|p| p.sessions.len()).sum()
    }

    pub fn total_bytes(&self) -> u64 {
        let sessions: u64 = self
            .projects
            .iter()
            .flat_map(|p| p.sessions.iter())
            .map(|s| s.size)
            .sum();
        sessions + self.history.as_ref().map(|h| h.size).unwrap_or(0)
    }

    /// Read `manifest.json` from a backup directory
    pub fn read_from(backup_dir: &Path) -> Result<Self> {
        let path = backup_dir.join(MANIFEST_FILE);
        let raw = std::fs::read_to_string(&path)?;
        serde_json::from_str(&raw).map_err(|e| ZuppaError::InvalidBackup {
            id: backup_dir
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            reason: format!("unreadable {}: {}", MANIFEST_FILE, e),
        })
    }

    /// Atomically write `manifest.json` into a backup directory
    pub fn write_to(&self, backup_dir: &Path) -> Result<()> {
        let body = serde_json::to_vec_pretty(self)?;
        atomic_write(&backup_dir.join(MANIFEST_FILE), &body)?;
        Ok(())
    }
}
