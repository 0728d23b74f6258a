//! On-disk layout of the local backup tree.
//!
//! ```text
//! <backup-root>/
//!   sessions/<backup-id>/<project-id>/<session>.jsonl
//!   sessions/<backup-id>/history.jsonl
//!   sessions/<backup-id>/manifest.json
//!   settings/<backup-id>/zc-settings.json
//!   .temp/
//! ```

use crate::backup::id::BackupId;
use crate::config::{Config, SETTINGS_FILE_NAME};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct BackupLayout {
    root: PathBuf,
}

impl BackupLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.backup_root())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn sessions_root(&self) -> PathBuf {
        self.root.join("sessions")
    }

    pub fn settings_root(&self) -> PathBuf {
        self.root.join("settings")
    }

    /// Scratch space for archives in flight
    pub fn scratch_root(&self) -> PathBuf {
        self.root.join(".temp")
    }

    pub fn session_backup(&self, id: &BackupId) -> PathBuf {
        self.sessions_root().join(id.as_str())
    }

    pub fn settings_backup(&self, id: &BackupId) -> PathBuf {
        self.settings_root().join(id.as_str())
    }

    /// Settings snapshot location for a backup.
    ///
    /// Backups written before the sessions/settings split keep the snapshot
    /// inside the sessions folder; that location is used as a fallback.
    pub fn settings_snapshot(&self, id: &BackupId) -> PathBuf {
        let current = self.settings_backup(id).join(SETTINGS_FILE_NAME);
        let legacy = self.session_backup(id).join(SETTINGS_FILE_NAME);
        if !current.exists() && legacy.exists() {
            legacy
        } else {
            current
        }
    }

    /// Either half of the backup is present locally
    pub fn exists(&self, id: &BackupId) -> bool {
        self.session_backup(id).is_dir() || self.settings_backup(id).is_dir()
    }

    /// Ids of every directory under `sessions/`, unordered
    pub fn local_ids(&self) -> Vec<BackupId> {
        let Ok(entries) = std::fs::read_dir(self.sessions_root()) else {
            return Vec::new();
        };

        entries
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .filter_map(|e| BackupId::parse(&e.file_name().to_string_lossy()).ok())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_paths() {
        let layout = BackupLayout::new("/b");
        let id = BackupId::parse("2026-01-05-13.56").unwrap();

        assert_eq!(layout.session_backup(&id), PathBuf::from("/b/sessions/2026-01-05-13.56"));
        assert_eq!(layout.settings_backup(&id), PathBuf::from("/b/settings/2026-01-05-13.56"));
        assert_eq!(
            layout.settings_snapshot(&id),
            PathBuf::from("/b/settings/2026-01-05-13.56/zc-settings.json")
        );
    }

    #[test]
    fn test_legacy_settings_snapshot_location() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;
        let layout = BackupLayout::new(temp_dir.path());
        let id = BackupId::parse("Jan-05-2026-13.56").unwrap();
        fs::create_dir_all(layout.session_backup(&id))?;
        fs::write(layout.session_backup(&id).join(SETTINGS_FILE_NAME), b"{}")?;

        assert_eq!(
            layout.settings_snapshot(&id),
            layout.session_backup(&id).join(SETTINGS_FILE_NAME)
        );
        Ok(())
    }

    #[test]
    fn test_local_ids_skip_files_and_hidden() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;
        let layout = BackupLayout::new(temp_dir.path());
        fs::create_dir_all(layout.sessions_root().join("2026-01-01-00.00"))?;
        fs::create_dir_all(layout.sessions_root().join(".partial"))?;
        fs::write(layout.sessions_root().join("stray.zip"), b"")?;

        let ids = layout.local_ids();
        assert_eq!(ids.len(), 1);
        assert_eq!(ids[0].as_str(), "2026-01-01-00.00");
        Ok(())
    }
}
