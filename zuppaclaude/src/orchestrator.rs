//! Full backups and restores: sessions, settings and the optional cloud copy.

use crate::backup::{
    BackupCatalog, BackupId, BackupLayout, BackupResult, BackupType, Manifest, RestoreEngine,
    RestoreReport, SessionArchiver,
};
use crate::cloud::{setup_instructions, CloudBridge};
use crate::config::Config;
use crate::settings::SettingsStore;
use crate::{Result, ZuppaError};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Default)]
pub struct BackupOptions {
    /// Remote to upload the new backup to
    pub cloud: Option<String>,
}

/// Which halves of a backup to restore
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RestoreScope {
    #[default]
    All,
    SessionsOnly,
    SettingsOnly,
}

impl RestoreScope {
    fn sessions(self) -> bool {
        self != RestoreScope::SettingsOnly
    }

    fn settings(self) -> bool {
        self != RestoreScope::SessionsOnly
    }
}

#[derive(Debug, Clone, Default)]
pub struct RestoreOptions {
    /// Remote to fetch the backup from first
    pub cloud: Option<String>,
    pub scope: RestoreScope,
}

#[derive(Debug, Clone)]
pub struct FullBackupReport {
    pub backup: BackupResult,
    /// A settings snapshot was stored
    pub settings: bool,
    /// Upload outcome, `None` when no remote was given
    pub cloud: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Restored,
    Skipped,
    Failed,
}

#[derive(Debug, Clone)]
pub struct RestoreSummary {
    pub sessions: Outcome,
    pub settings: Outcome,
    /// Details of the session pass, when it ran
    pub report: Option<RestoreReport>,
}

pub struct BackupOrchestrator {
    layout: BackupLayout,
    archiver: SessionArchiver,
    restorer: RestoreEngine,
    settings: SettingsStore,
    catalog: BackupCatalog,
    cloud: CloudBridge,
}

impl BackupOrchestrator {
    pub fn new(config: Arc<Config>) -> Self {
        let cloud = CloudBridge::new(config.clone());
        Self::with_bridge(config, cloud)
    }

    pub fn with_bridge(config: Arc<Config>, cloud: CloudBridge) -> Self {
        Self {
            layout: BackupLayout::from_config(&config),
            archiver: SessionArchiver::new(config.clone()),
            restorer: RestoreEngine::new(config.clone()),
            settings: SettingsStore::new(config.clone()),
            catalog: BackupCatalog::new(&config),
            cloud,
        }
    }

    /// Back up sessions and settings, then upload if asked.
    ///
    /// Returns `Ok(None)` when there were no sessions to back up. A failed
    /// upload is reported in the result, not as an error.
    pub async fn backup(&self, options: BackupOptions) -> Result<Option<FullBackupReport>> {
        info!("Step 1/3: Backing up Claude Code sessions...");
        let Some(backup) = self.archiver.backup()? else {
            return Ok(None);
        };

        info!("Step 2/3: Backing up zuppaclaude settings...");
        let settings = match self.settings.write_snapshot(&self.layout.settings_backup(&backup.id)) {
            Ok(true) => {
                info!("Settings backed up");
                true
            }
            Ok(false) => {
                info!("No settings to backup");
                false
            }
            Err(e) => {
                warn!("Failed to backup settings: {}", e);
                false
            }
        };

        if let Err(e) = mark_full(&backup.path, settings) {
            warn!(backup_id = %backup.id, error = %e, "Could not update manifest");
        }

        let cloud = match &options.cloud {
            Some(remote) => {
                info!("Step 3/3: Uploading to cloud...");
                Some(self.upload(remote, &backup.id).await)
            }
            None => {
                info!("Step 3/3: Cloud upload skipped (use --cloud <remote>)");
                None
            }
        };

        Ok(Some(FullBackupReport {
            backup,
            settings,
            cloud,
        }))
    }

    async fn upload(&self, remote: &str, id: &BackupId) -> bool {
        match self.cloud.upload(remote, id).await {
            Ok(true) => true,
            Ok(false) => {
                warn!("Nothing was uploaded to {}", remote);
                false
            }
            Err(ZuppaError::SyncToolMissing) => {
                warn!("rclone not installed, skipping cloud upload");
                info!("{}", setup_instructions());
                false
            }
            Err(e) => {
                warn!("Cloud upload skipped: {}", e);
                false
            }
        }
    }

    /// Restore a backup, fetching it from the cloud first if asked.
    pub async fn restore(&self, id: &BackupId, options: RestoreOptions) -> Result<RestoreSummary> {
        match &options.cloud {
            Some(remote) => {
                info!("Step 1/3: Downloading from cloud...");
                match self.cloud.download(remote, id).await {
                    Ok(true) => {}
                    Ok(false) => warn!("Backup {} was not found on {}", id, remote),
                    Err(e @ (ZuppaError::SyncToolMissing | ZuppaError::RemoteNotFound(_))) => {
                        return Err(e)
                    }
                    Err(e) => warn!("Download failed: {}", e),
                }
            }
            None => info!("Step 1/3: Using local backup"),
        }

        let Some(local) = self.catalog.find(id) else {
            return Err(ZuppaError::BackupNotFound(id.to_string()));
        };
        if options.scope.sessions() && !local.complete {
            return Err(ZuppaError::InvalidBackup {
                id: id.to_string(),
                reason: "manifest is missing or unreadable".to_string(),
            });
        }

        let mut report = None;
        let sessions = if options.scope.sessions() {
            info!("Step 2/3: Restoring sessions...");
            match self.restorer.restore(id) {
                Ok(r) => {
                    report = Some(r);
                    Outcome::Restored
                }
                Err(e) => {
                    warn!("Sessions not restored: {}", e);
                    Outcome::Failed
                }
            }
        } else {
            info!("Step 2/3: Sessions restore skipped");
            Outcome::Skipped
        };

        let settings = if options.scope.settings() {
            info!("Step 3/3: Restoring settings...");
            let snapshot = self.layout.settings_snapshot(id);
            if !snapshot.is_file() {
                info!("No settings in backup");
                Outcome::Skipped
            } else {
                match self.settings.restore_snapshot(&snapshot) {
                    Ok(_) => {
                        info!("Settings restored");
                        Outcome::Restored
                    }
                    Err(e) => {
                        warn!("Failed to restore settings: {}", e);
                        Outcome::Failed
                    }
                }
            }
        } else {
            info!("Step 3/3: Settings restore skipped");
            Outcome::Skipped
        };

        Ok(RestoreSummary {
            sessions,
            settings,
            report,
        })
    }

    /// Print local backups, and the cloud listing when a remote is given
    pub async fn list(&self, cloud: Option<&str>) -> Result<()> {
        self.catalog.print_list();
        if let Some(remote) = cloud {
            self.cloud.print_cloud_backups(remote).await?;
        }
        Ok(())
    }
}

/// Record the settings snapshot in the manifest of a finished backup
fn mark_full(backup_dir: &Path, settings: bool) -> Result<()> {
    let mut manifest = Manifest::read_from(backup_dir)?;
    manifest.settings = Some(settings);
    manifest.backup_type = Some(BackupType::Full);
    manifest.write_to(backup_dir)
}
