//! Copies a local backup back into the live session store.
//!
//! Existing files are never replaced: a session that is already present is
//! written next to it as `<stem>.restored.jsonl` (then `.restored-2`, ...).

use crate::backup::id::BackupId;
use crate::backup::layout::BackupLayout;
use crate::backup::manifest::{HistoryEntry, Manifest, MANIFEST_FILE};
use crate::config::Config;
use crate::fs::copy::copy_no_clobber;
use crate::fs::metadata::FileMetadata;
use crate::{Result, ZuppaError};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What a restore pass did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    /// Session files written
    pub restored: usize,
    /// Of those, written to a `.restored` sibling
    pub renamed: usize,
    /// Listed in the manifest but missing from the backup
    pub skipped: usize,
    /// Present in the backup but could not be written
    pub failed: usize,
    /// Where the command history was written, if it was
    pub history: Option<PathBuf>,
}

pub struct RestoreEngine {
    config: Arc<Config>,
    layout: BackupLayout,
}

impl RestoreEngine {
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            layout: BackupLayout::from_config(&config),
            config,
        }
    }

    /// Restore sessions and history from backup `id`.
    ///
    /// Fails only when the backup itself is unusable; individual files that
    /// cannot be restored are logged and counted.
    pub fn restore(&self, id: &BackupId) -> Result<RestoreReport> {
        let backup_dir = self.layout.session_backup(id);
        if !backup_dir.is_dir() {
            return Err(ZuppaError::BackupNotFound(id.to_string()));
        }
        if !backup_dir.join(MANIFEST_FILE).is_file() {
            return Err(ZuppaError::InvalidBackup {
                id: id.to_string(),
                reason: format!("{} is missing", MANIFEST_FILE),
            });
        }
        let manifest = Manifest::read_from(&backup_dir)?;

        info!(backup_id = %id, "Restoring sessions");
        let mut report = RestoreReport::default();
        let projects_dir = self.config.projects_dir();

        for project in &manifest.projects {
            if !is_plain_name(&project.id) {
                warn!(project = %project.id, "Skipping project with unsafe name");
                report.skipped += project.sessions.len();
                continue;
            }

            let dest_dir = projects_dir.join(&project.id);
            if let Err(e) = fs::create_dir_all(&dest_dir) {
                warn!(project = %project.id, error = %e, "Failed to create project folder");
                report.failed += project.sessions.len();
                continue;
            }

            for session in &project.sessions {
                let src = backup_dir.join(&project.id).join(&session.file);
                if !is_plain_name(&session.file) || !src.is_file() {
                    warn!("Session file missing from backup: {}", session.file);
                    report.skipped += 1;
                    continue;
                }

                let dest = dest_dir.join(&session.file);
                match copy_no_clobber(&src, &dest) {
                    Ok(written) => {
                        let metadata = FileMetadata {
                            size: session.size,
                            modified: session.modified,
                        };
                        if let Err(e) = metadata.apply_to_path(&written) {
                            debug!(file = %written.display(), error = %e, "Could not restore mtime");
                        }
                        if written != dest {
                            info!("Session {} exists, restored as {}", session.id, file_name(&written));
                            report.renamed += 1;
                        }
                        report.restored += 1;
                    }
                    Err(e) => {
                        warn!("Failed to restore {}: {}", session.id, e);
                        report.failed += 1;
                    }
                }
            }
        }

        let history_src = backup_dir.join("history.jsonl");
        match &manifest.history {
            Some(history) if history_src.is_file() => {
                report.history = self.restore_history(&history_src, history);
            }
            Some(_) => warn!("Command history missing from backup"),
            None => {}
        }

        info!(
            "Restore complete: {} sessions restored ({} renamed), {} skipped, {} failed",
            report.restored, report.renamed, report.skipped, report.failed
        );
        Ok(report)
    }

    fn restore_history(&self, src: &Path, history: &HistoryEntry) -> Option<PathBuf> {
        let dest = self.config.history_file();
        if let Some(parent) = dest.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                warn!("Failed to restore history: {}", e);
                return None;
            }
        }

        match copy_no_clobber(src, &dest) {
            Ok(written) => {
                let metadata = FileMetadata {
                    size: history.size,
                    modified: history.modified,
                };
                let _ = metadata.apply_to_path(&written);
                info!("Command history restored to {}", written.display());
                Some(written)
            }
            Err(e) => {
                warn!("Failed to restore history: {}", e);
                None
            }
        }
    }
}

/// A single path component that cannot escape its parent
fn is_plain_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}
