//! Session archiver - copies the live session store into a new local backup.

use crate::backup::id::BackupId;
use crate::backup::layout::BackupLayout;
use crate::backup::manifest::{HistoryEntry, Manifest, ProjectEntry, SessionEntry};
use crate::config::Config;
use crate::fs::metadata::FileMetadata;
use crate::session::{Project, SessionStore};
use crate::utils::format::format_bytes;
use crate::Result;
use chrono::{DateTime, Local, TimeZone};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Outcome of a local session backup
#[derive(Debug, Clone)]
pub struct BackupResult {
    pub id: BackupId,
    pub path: PathBuf,
    pub projects: usize,
    /// Sessions copied, equal to the manifest's session count
    pub sessions: usize,
    /// Sessions that could not be copied
    pub failed: usize,
    /// Bytes copied, history included
    pub bytes: u64,
    pub history: bool,
}

pub struct SessionArchiver {
    config: Arc<Config>,
    store: SessionStore,
    layout: BackupLayout,
}

impl SessionArchiver {
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            store: SessionStore::new(config.clone()),
            layout: BackupLayout::from_config(&config),
            config,
        }
    }

    pub fn layout(&self) -> &BackupLayout {
        &self.layout
    }

    /// Back up every session into a new timestamped folder.
    ///
    /// Returns `Ok(None)` without touching the disk when there is nothing to
    /// back up.
    pub fn backup(&self) -> Result<Option<BackupResult>> {
        self.backup_at(&Local::now())
    }

    /// [`Self::backup`] with an explicit clock
    pub fn backup_at<Tz: TimeZone>(&self, time: &DateTime<Tz>) -> Result<Option<BackupResult>>
    where
        Tz::Offset: fmt::Display,
    {
        let projects = self.store.projects()?;
        if projects.is_empty() {
            warn!("No sessions to backup");
            return Ok(None);
        }

        let id = BackupId::mint(time, |candidate| self.layout.exists(candidate))?;
        let backup_dir = self.layout.session_backup(&id);
        fs::create_dir_all(&backup_dir)?;

        info!(backup_id = %id, "Backing up Claude Code sessions");

        match self.write_backup(&id, &backup_dir, &projects) {
            Ok(result) => Ok(Some(result)),
            Err(e) => {
                error!(backup_id = %id, error = %e, "Backup aborted, removing partial folder");
                let _ = fs::remove_dir_all(&backup_dir);
                Err(e)
            }
        }
    }

    fn write_backup(&self, id: &BackupId, backup_dir: &Path, projects: &[Project]) -> Result<BackupResult> {
        let mut manifest = Manifest::new(
            id.clone(),
            &self.config.identity.hostname,
            &self.config.identity.username,
        );
        let mut copied = 0usize;
        let mut failed = 0usize;
        let mut bytes = 0u64;

        for project in projects {
            let project_dir = backup_dir.join(&project.id);
            if let Err(e) = fs::create_dir_all(&project_dir) {
                warn!(project = %project.id, error = %e, "Failed to create project folder, skipping");
                failed += project.sessions.len();
                continue;
            }

            let mut entry = ProjectEntry {
                id: project.id.clone(),
                path: project.path.clone(),
                sessions: Vec::with_capacity(project.sessions.len()),
            };

            for session in &project.sessions {
                let dest = project_dir.join(&session.file);
                match fs::copy(&session.path, &dest) {
                    Ok(size) => {
                        debug!(session = %session.id, size, "Session copied");
                        entry.sessions.push(SessionEntry {
                            id: session.id.clone(),
                            file: session.file.clone(),
                            size,
                            modified: session.modified,
                            kind: session.kind,
                        });
                        copied += 1;
                        bytes += size;
                    }
                    Err(e) => {
                        warn!("Failed to backup {}: {}", session.id, e);
                        discard_partial(&dest);
                        failed += 1;
                    }
                }
            }

            manifest.projects.push(entry);
        }

        let history = self.store.history_file();
        if history.is_file() {
            let dest = backup_dir.join("history.jsonl");
            match copy_with_metadata(&history, &dest) {
                Ok(metadata) => {
                    bytes += metadata.size;
                    manifest.history = Some(HistoryEntry {
                        size: metadata.size,
                        modified: metadata.modified,
                    });
                    info!("Command history backed up");
                }
                Err(e) => {
                    warn!("Failed to backup history: {}", e);
                    discard_partial(&dest);
                }
            }
        }

        // Completion marker, must stay the last write.
        manifest.write_to(backup_dir)?;

        info!(
            "Backup complete: {} sessions, {}",
            copied,
            format_bytes(bytes)
        );
        info!("Location: {}", backup_dir.display());

        Ok(BackupResult {
            id: id.clone(),
            path: backup_dir.to_path_buf(),
            projects: manifest.projects.len(),
            sessions: copied,
            failed,
            bytes,
            history: manifest.history.is_some(),
        })
    }
}

/// Files not recorded in the manifest must not stay in the backup
fn discard_partial(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(file = %path.display(), error = %e, "Could not remove partial copy");
        }
    }
}

fn copy_with_metadata(src: &Path, dest: &Path) -> std::io::Result<FileMetadata> {
    let metadata = FileMetadata::from_path(src)?;
    let size = fs::copy(src, dest)?;
    Ok(FileMetadata { size, ..metadata })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::manifest::MANIFEST_FILE;
    use crate::fs::walker::{walk_directory, WalkOptions};
    use crate::session::tests::store_fixture;
    use chrono::Utc;
    use tempfile::TempDir;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 5, 13, 56, 0).unwrap()
    }

    #[test]
    fn test_no_sessions_creates_nothing() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config = store_fixture(temp_dir.path(), &[]);
        let archiver = SessionArchiver::new(config);

        let result = archiver.backup_at(&fixed_time())?;

        assert!(result.is_none());
        assert!(!archiver.layout().root().exists());
        Ok(())
    }

    #[test]
    fn test_manifest_count_matches_copied_files() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config = store_fixture(
            temp_dir.path(),
            &[
                ("-Users-dev-app", "s1.jsonl", b"{\"a\":1}\n"),
                ("-Users-dev-app", "agent-s2.jsonl", b"{\"b\":2}\n"),
                ("-Users-dev-lib", "s3.jsonl", b"{\"c\":3}\n"),
            ],
        );
        fs::write(config.history_file(), b"{\"display\":\"ls\"}\n")?;
        let archiver = SessionArchiver::new(config);

        let result = archiver.backup_at(&fixed_time())?.expect("backup produced");

        assert_eq!(result.id.as_str(), "2026-01-05-13.56");
        assert_eq!(result.sessions, 3);
        assert_eq!(result.projects, 2);
        assert!(result.history);

        let manifest = Manifest::read_from(&result.path)?;
        assert_eq!(manifest.session_count(), result.sessions);
        assert_eq!(manifest.total_bytes(), result.bytes);

        let session_files = walk_directory(&result.path, WalkOptions::default())?
            .into_iter()
            .filter(|f| f.depth == 2)
            .count();
        assert_eq!(session_files, manifest.session_count());
        assert!(result.path.join("history.jsonl").is_file());
        assert!(result.path.join(MANIFEST_FILE).is_file());
        assert_eq!(
            fs::read(result.path.join("-Users-dev-app/s1.jsonl"))?,
            b"{\"a\":1}\n"
        );
        Ok(())
    }

    #[test]
    fn test_same_minute_backups_get_distinct_ids() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config = store_fixture(temp_dir.path(), &[("-p", "s.jsonl", b"x")]);
        let archiver = SessionArchiver::new(config);

        let first = archiver.backup_at(&fixed_time())?.expect("first");
        let second = archiver.backup_at(&fixed_time())?.expect("second");

        assert_ne!(first.id, second.id);
        assert!(second.id > first.id);
        assert!(first.path.join(MANIFEST_FILE).is_file());
        assert!(second.path.join(MANIFEST_FILE).is_file());
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_session_is_skipped() -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new()?;
        let config = store_fixture(
            temp_dir.path(),
            &[("-p", "ok.jsonl", b"ok"), ("-p", "locked.jsonl", b"secret")],
        );
        let locked = config.projects_dir().join("-p/locked.jsonl");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000))?;
        if fs::File::open(&locked).is_ok() {
            // Running as root: permissions are not enforced.
            return Ok(());
        }
        let archiver = SessionArchiver::new(config);

        let result = archiver.backup_at(&fixed_time())?.expect("backup produced");

        assert_eq!(result.sessions, 1);
        assert_eq!(result.failed, 1);
        let manifest = Manifest::read_from(&result.path)?;
        assert_eq!(manifest.session_count(), 1);
        assert_eq!(manifest.projects[0].sessions[0].file, "ok.jsonl");
        Ok(())
    }

    #[test]
    fn test_vanished_session_leaves_no_file() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config = store_fixture(
            temp_dir.path(),
            &[("-p", "kept.jsonl", b"kept"), ("-p", "gone.jsonl", b"gone")],
        );
        let archiver = SessionArchiver::new(config.clone());
        let projects = archiver.store.projects()?;
        fs::remove_file(config.projects_dir().join("-p/gone.jsonl"))?;

        let id = BackupId::parse("2026-01-05-13.56")?;
        let backup_dir = archiver.layout().session_backup(&id);
        fs::create_dir_all(backup_dir.join("-p"))?;
        fs::write(backup_dir.join("-p/gone.jsonl"), b"stale")?;

        let result = archiver.write_backup(&id, &backup_dir, &projects)?;

        assert_eq!(result.sessions, 1);
        assert_eq!(result.failed, 1);
        assert!(!backup_dir.join("-p/gone.jsonl").exists());
        let on_disk = walk_directory(&backup_dir, WalkOptions::default())?
            .into_iter()
            .filter(|f| f.depth == 2)
            .count();
        assert_eq!(on_disk, Manifest::read_from(&backup_dir)?.session_count());
        Ok(())
    }
}
