//! Cloud copies of local backups.
//!
//! Each half of a backup travels as one zip: `<base>/sessions/<id>.zip` and
//! `<base>/settings/<id>.zip`, where `<base>` is [`Config::cloud_base`]. Every
//! archive holds a single top-level folder named after the backup id.

pub mod archive;
pub mod sync;

use crate::backup::id::BackupId;
use crate::backup::layout::BackupLayout;
use crate::backup::manifest::MANIFEST_FILE;
use crate::config::Config;
use crate::fs::copy::move_dir_contents;
use crate::fs::walker::has_files;
use crate::prompt::Prompter;
use crate::{Result, ZuppaError};
use archive::{ArchiveTool, ZipArchiver};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use sync::{Rclone, SyncTool};
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// The two halves of a backup, named as on the remote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Part {
    Sessions,
    Settings,
}

impl Part {
    const ALL: [Part; 2] = [Part::Sessions, Part::Settings];

    fn as_str(self) -> &'static str {
        match self {
            Part::Sessions => "sessions",
            Part::Settings => "settings",
        }
    }
}

/// Aggregate outcome of a bulk upload or download
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferSummary {
    pub succeeded: usize,
    pub failed: usize,
}

pub struct CloudBridge {
    config: Arc<Config>,
    layout: BackupLayout,
    sync: Arc<dyn SyncTool>,
    archiver: Arc<dyn ArchiveTool>,
}

impl CloudBridge {
    /// Bridge backed by rclone and zip files
    pub fn new(config: Arc<Config>) -> Self {
        let sync = Arc::new(Rclone::new(config.cloud.rclone_binary.clone()));
        Self::with_tools(config, sync, Arc::new(ZipArchiver))
    }

    pub fn with_tools(config: Arc<Config>, sync: Arc<dyn SyncTool>, archiver: Arc<dyn ArchiveTool>) -> Self {
        Self {
            layout: BackupLayout::from_config(&config),
            config,
            sync,
            archiver,
        }
    }

    /// The sync tool is installed and `remote` is configured
    pub async fn ensure_ready(&self, remote: &str) -> Result<()> {
        if !self.sync.is_installed().await {
            return Err(ZuppaError::SyncToolMissing);
        }
        if !self.sync.remote_exists(remote).await? {
            return Err(ZuppaError::RemoteNotFound(remote.to_string()));
        }
        Ok(())
    }

    /// Names of the configured remotes
    pub async fn list_remotes(&self) -> Result<Vec<String>> {
        if !self.sync.is_installed().await {
            return Err(ZuppaError::SyncToolMissing);
        }
        self.sync.list_remotes().await
    }

    fn remote_dir(&self, part: Part) -> String {
        format!("{}/{}", self.config.cloud_base(), part.as_str())
    }

    fn remote_path(&self, part: Part, id: &BackupId) -> String {
        format!("{}/{}", self.remote_dir(part), id.zip_name())
    }

    fn local_dir(&self, part: Part, id: &BackupId) -> PathBuf {
        match part {
            Part::Sessions => self.layout.session_backup(id),
            Part::Settings => self.layout.settings_backup(id),
        }
    }

    /// Scratch folder under the backup root, removed when dropped
    fn scratch(&self, prefix: &str) -> Result<TempDir> {
        let root = self.layout.scratch_root();
        fs::create_dir_all(&root)?;
        Ok(tempfile::Builder::new().prefix(prefix).tempdir_in(root)?)
    }

    async fn compress(&self, src: PathBuf, dest: PathBuf) -> Result<()> {
        let archiver = self.archiver.clone();
        tokio::task::spawn_blocking(move || archiver.compress_dir(&src, &dest))
            .await
            .map_err(|e| ZuppaError::Archive(e.to_string()))?
    }

    async fn extract(&self, archive: PathBuf, dest: PathBuf) -> Result<()> {
        let archiver = self.archiver.clone();
        tokio::task::spawn_blocking(move || archiver.extract(&archive, &dest))
            .await
            .map_err(|e| ZuppaError::Archive(e.to_string()))?
    }

    /// Upload one local backup. Returns whether anything was transferred.
    pub async fn upload(&self, remote: &str, id: &BackupId) -> Result<bool> {
        self.ensure_ready(remote).await?;
        self.upload_backup(remote, id).await
    }

    /// Upload every local backup, continuing past failures
    pub async fn upload_all(&self, remote: &str) -> Result<TransferSummary> {
        self.ensure_ready(remote).await?;

        let mut ids = self.layout.local_ids();
        ids.sort();
        if ids.is_empty() {
            warn!("No local backups to upload");
        }

        let mut summary = TransferSummary::default();
        for id in &ids {
            match self.upload_backup(remote, id).await {
                Ok(true) => summary.succeeded += 1,
                Ok(false) => summary.failed += 1,
                Err(e) => {
                    warn!(backup_id = %id, error = %e, "Upload failed");
                    summary.failed += 1;
                }
            }
        }

        info!(
            "Uploaded {} backups to {} ({} failed)",
            summary.succeeded, remote, summary.failed
        );
        Ok(summary)
    }

    async fn upload_backup(&self, remote: &str, id: &BackupId) -> Result<bool> {
        let sessions_dir = self.layout.session_backup(id);
        if !sessions_dir.is_dir() {
            return Err(ZuppaError::BackupNotFound(id.to_string()));
        }
        if !sessions_dir.join(MANIFEST_FILE).is_file() {
            return Err(ZuppaError::InvalidBackup {
                id: id.to_string(),
                reason: format!("{} is missing", MANIFEST_FILE),
            });
        }

        info!(backup_id = %id, remote, "Uploading backup");
        let scratch = self.scratch("upload-")?;
        let mut transferred = 0usize;

        for part in Part::ALL {
            let src = self.local_dir(part, id);
            if part == Part::Settings && !has_files(&src) {
                debug!(backup_id = %id, "No settings snapshot, skipping settings archive");
                continue;
            }

            let archive = scratch.path().join(format!("{}-{}", part.as_str(), id.zip_name()));
            if let Err(e) = self.compress(src, archive.clone()).await {
                warn!(backup_id = %id, part = part.as_str(), error = %e, "Cannot create archive");
                continue;
            }

            let remote_path = self.remote_path(part, id);
            match self.sync.copy_to_remote(&archive, remote, &remote_path).await {
                Ok(()) => {
                    info!("Uploaded {}:{}", sync::remote_name(remote), remote_path);
                    transferred += 1;
                }
                Err(e) => warn!(backup_id = %id, part = part.as_str(), error = %e, "Upload failed"),
            }
        }

        Ok(transferred > 0)
    }

    /// Download one backup, replacing the local copy. Returns whether
    /// anything was downloaded.
    pub async fn download(&self, remote: &str, id: &BackupId) -> Result<bool> {
        self.ensure_ready(remote).await?;
        self.download_backup(remote, id).await
    }

    /// Download every backup found on the remote, continuing past failures
    pub async fn download_all(&self, remote: &str) -> Result<TransferSummary> {
        self.ensure_ready(remote).await?;

        let ids = self.remote_ids(remote).await?;
        if ids.is_empty() {
            warn!("No cloud backups found on {}", remote);
        }

        let mut summary = TransferSummary::default();
        for id in &ids {
            match self.download_backup(remote, id).await {
                Ok(true) => summary.succeeded += 1,
                Ok(false) => summary.failed += 1,
                Err(e) => {
                    warn!(backup_id = %id, error = %e, "Download failed");
                    summary.failed += 1;
                }
            }
        }

        info!(
            "Downloaded {} backups from {} ({} failed)",
            summary.succeeded, remote, summary.failed
        );
        Ok(summary)
    }

    async fn download_backup(&self, remote: &str, id: &BackupId) -> Result<bool> {
        info!(backup_id = %id, remote, "Downloading backup");
        let scratch = self.scratch("download-")?;
        let mut downloaded = 0usize;

        for part in Part::ALL {
            let archive = scratch.path().join(format!("{}-{}", part.as_str(), id.zip_name()));
            let remote_path = self.remote_path(part, id);

            match self.sync.copy_from_remote(remote, &remote_path, &archive).await {
                Ok(()) => {}
                Err(ZuppaError::RemotePathNotFound(_)) => {
                    match part {
                        Part::Sessions => warn!(backup_id = %id, "No sessions archive on the remote"),
                        Part::Settings => debug!(backup_id = %id, "No settings archive on the remote"),
                    }
                    continue;
                }
                Err(e) => {
                    warn!(backup_id = %id, part = part.as_str(), error = %e, "Download failed");
                    continue;
                }
            }

            let unpacked = scratch.path().join(part.as_str());
            if let Err(e) = self.extract(archive, unpacked.clone()).await {
                warn!(backup_id = %id, part = part.as_str(), error = %e, "Cannot unpack archive");
                continue;
            }

            let target = self.local_dir(part, id);
            match replace_dir(&hoist(&unpacked, id), &target) {
                Ok(()) => {
                    info!("Downloaded {} to {}", remote_path, target.display());
                    downloaded += 1;
                }
                Err(e) => warn!(backup_id = %id, error = %e, "Cannot replace local backup"),
            }
        }

        Ok(downloaded > 0)
    }

    /// Backup ids stored on the remote, newest first
    pub async fn list_cloud_backups(&self, remote: &str) -> Result<Vec<BackupId>> {
        self.ensure_ready(remote).await?;
        self.remote_ids(remote).await
    }

    async fn remote_ids(&self, remote: &str) -> Result<Vec<BackupId>> {
        let files = match self.sync.list_files(remote, &self.remote_dir(Part::Sessions)).await {
            Ok(files) => files,
            Err(ZuppaError::RemotePathNotFound(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut ids: Vec<BackupId> = files
            .iter()
            .filter_map(|name| name.strip_suffix(".zip"))
            .filter_map(|stem| BackupId::parse(stem).ok())
            .collect();
        ids.sort_by(|a, b| b.cmp(a));
        Ok(ids)
    }

    /// Remove both archives of a backup. Returns whether anything was removed.
    pub async fn delete_cloud_backup(&self, remote: &str, id: &BackupId) -> Result<bool> {
        self.ensure_ready(remote).await?;
        Ok(self.delete_backup(remote, id).await)
    }

    async fn delete_backup(&self, remote: &str, id: &BackupId) -> bool {
        let mut removed = 0usize;
        for part in Part::ALL {
            let remote_path = self.remote_path(part, id);
            match self.sync.delete_file(remote, &remote_path).await {
                Ok(()) => {
                    debug!("Deleted {}", remote_path);
                    removed += 1;
                }
                Err(ZuppaError::RemotePathNotFound(_)) => {
                    debug!(backup_id = %id, part = part.as_str(), "Nothing to delete")
                }
                Err(e) => warn!(backup_id = %id, part = part.as_str(), error = %e, "Delete failed"),
            }
        }

        if removed > 0 {
            info!("Deleted cloud backup {}", id);
        } else {
            warn!("Cloud backup {} not found on {}", id, remote);
        }
        removed > 0
    }

    /// Let the user pick a cloud backup and delete it after confirmation.
    ///
    /// Returns `Ok(false)` when nothing was picked; a confirmed deletion that
    /// removes nothing is an error.
    pub async fn delete_interactive(&self, remote: &str, prompter: &dyn Prompter) -> Result<bool> {
        self.ensure_ready(remote).await?;

        let ids = self.remote_ids(remote).await?;
        if ids.is_empty() {
            warn!("No cloud backups found on {}", remote);
            return Ok(false);
        }

        let mut items: Vec<String> = ids
            .iter()
            .enumerate()
            .map(|(n, id)| format!("{}. {}", n + 1, id))
            .collect();
        items.push("Cancel".to_string());

        let choice = prompter.select("Select a cloud backup to delete", &items)?;
        let Some(id) = ids.get(choice) else {
            info!("Cancelled");
            return Ok(false);
        };

        let prompt = format!("Delete cloud backup {} from {}?", id, remote);
        if !prompter.confirm(&prompt, false)? {
            info!("Cancelled");
            return Ok(false);
        }

        if !self.delete_backup(remote, id).await {
            return Err(ZuppaError::Transfer(format!("cloud backup {} could not be deleted", id)));
        }
        Ok(true)
    }

    /// Print the cloud listing to stdout
    pub async fn print_cloud_backups(&self, remote: &str) -> Result<Vec<BackupId>> {
        let ids = self.list_cloud_backups(remote).await?;
        if ids.is_empty() {
            warn!("No cloud backups found on {}", remote);
            return Ok(ids);
        }

        println!();
        println!("Cloud Backups ({}:{})", sync::remote_name(remote), self.config.cloud_base());
        println!();
        for id in &ids {
            println!("  {}", id);
        }
        println!();
        println!("Total: {} backups", ids.len());
        println!();
        Ok(ids)
    }
}

/// How to get rclone working
pub fn setup_instructions() -> &'static str {
    "Cloud backups use rclone (https://rclone.org).

  1. Install rclone
       macOS:   brew install rclone
       Linux:   curl https://rclone.org/install.sh | sudo bash
       Windows: winget install Rclone.Rclone
  2. Configure a remote
       rclone config
  3. Check it is listed
       zuppaclaude cloud remotes
  4. Back up with
       zuppaclaude backup --cloud <remote>"
}

/// The folder holding an unpacked archive's content.
///
/// Archives are rooted at a folder named after the backup id; archives without
/// that folder are used as-is.
fn hoist(unpacked: &Path, id: &BackupId) -> PathBuf {
    let nested = unpacked.join(id.as_str());
    let only_child = fs::read_dir(unpacked)
        .map(|entries| entries.filter_map(|e| e.ok()).count() == 1)
        .unwrap_or(false);
    if nested.is_dir() && only_child {
        nested
    } else {
        unpacked.to_path_buf()
    }
}

/// Swap `target` for the content of `src`
fn replace_dir(src: &Path, target: &Path) -> std::io::Result<()> {
    if target.exists() {
        fs::remove_dir_all(target)?;
    }
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    if fs::rename(src, target).is_err() {
        move_dir_contents(src, target)?;
    }
    Ok(())
}
