//! Enumerates local backups.

use crate::backup::id::BackupId;
use crate::backup::layout::BackupLayout;
use crate::backup::manifest::{Manifest, MANIFEST_FILE};
use crate::config::Config;
use crate::utils::format::format_bytes;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use tracing::{debug, warn};

/// One local backup as seen by the catalog
#[derive(Debug, Clone)]
pub struct BackupSummary {
    pub id: BackupId,
    pub path: PathBuf,
    pub projects: usize,
    pub sessions: usize,
    pub bytes: u64,
    pub created: Option<DateTime<Utc>>,
    /// A readable manifest is present
    pub complete: bool,
    /// A settings snapshot is stored alongside
    pub settings: bool,
}

pub struct BackupCatalog {
    layout: BackupLayout,
}

impl BackupCatalog {
    pub fn new(config: &Config) -> Self {
        Self {
            layout: BackupLayout::from_config(config),
        }
    }

    pub fn with_layout(layout: BackupLayout) -> Self {
        Self { layout }
    }

    /// Every local backup, newest first.
    ///
    /// Backups without a readable manifest are listed as incomplete with zero
    /// counts. An unreadable backup root yields an empty list.
    pub fn list(&self) -> Vec<BackupSummary> {
        let mut summaries: Vec<BackupSummary> = self
            .layout
            .local_ids()
            .into_iter()
            .map(|id| self.summarize(id))
            .collect();

        summaries.sort_by(|a, b| b.id.cmp(&a.id));
        summaries
    }

    pub fn find(&self, id: &BackupId) -> Option<BackupSummary> {
        self.layout
            .session_backup(id)
            .is_dir()
            .then(|| self.summarize(id.clone()))
    }

    fn summarize(&self, id: BackupId) -> BackupSummary {
        let path = self.layout.session_backup(&id);
        let settings = self.layout.settings_snapshot(&id).is_file();

        let manifest = if path.join(MANIFEST_FILE).is_file() {
            Manifest::read_from(&path)
                .map_err(|e| warn!(backup_id = %id, error = %e, "Ignoring unreadable manifest"))
                .ok()
        } else {
            debug!(backup_id = %id, "Backup has no manifest");
            None
        };

        match manifest {
            Some(manifest) => BackupSummary {
                projects: manifest.projects.len(),
                sessions: manifest.session_count(),
                bytes: manifest.total_bytes(),
                created: Some(manifest.created_at),
                complete: true,
                settings: settings || manifest.settings.unwrap_or(false),
                id,
                path,
            },
            None => BackupSummary {
                id,
                path,
                projects: 0,
                sessions: 0,
                bytes: 0,
                created: None,
                complete: false,
                settings,
            },
        }
    }

    /// Print the catalog to stdout
    pub fn print_list(&self) -> Vec<BackupSummary> {
        let backups = self.list();
        if backups.is_empty() {
            warn!("No local backups found");
            return backups;
        }

        println!();
        println!("Local Backups ({})", self.layout.root().display());
        println!();
        for backup in &backups {
            let mut notes = Vec::new();
            if backup.settings {
                notes.push("settings");
            }
            if !backup.complete {
                notes.push("incomplete");
            }
            let notes = if notes.is_empty() {
                String::new()
            } else {
                format!("  [{}]", notes.join(", "))
            };

            println!(
                "  {}  {} projects, {} sessions, {}{}",
                backup.id,
                backup.projects,
                backup.sessions,
                format_bytes(backup.bytes),
                notes
            );
        }
        println!();
        println!("Total: {} backups", backups.len());
        println!();

        backups
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::manifest::{ProjectEntry, SessionEntry};
    use crate::session::SessionKind;
    use std::fs;
    use tempfile::TempDir;

    fn write_backup(layout: &BackupLayout, id: &str, sessions: usize) -> std::io::Result<()> {
        let id = BackupId::parse(id).unwrap();
        let dir = layout.session_backup(&id);
        fs::create_dir_all(&dir)?;

        let mut manifest = Manifest::new(id, "box", "dev");
        manifest.projects.push(ProjectEntry {
            id: "-p".to_string(),
            path: "p".to_string(),
            sessions: (0..sessions)
                .map(|n| SessionEntry {
                    id: format!("s{}", n),
                    file: format!("s{}.jsonl", n),
                    size: 10,
                    modified: Utc::now(),
                    kind: SessionKind::Main,
                })
                .collect(),
        });
        manifest.write_to(&dir).unwrap();
        Ok(())
    }

    #[test]
    fn test_lists_newest_first_across_id_formats() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;
        let layout = BackupLayout::new(temp_dir.path());
        write_backup(&layout, "Jan-01-2026-10.00", 1)?;
        write_backup(&layout, "Feb-01-2026-00.00", 2)?;
        write_backup(&layout, "Jan-02-2026-09.00", 3)?;

        let catalog = BackupCatalog::with_layout(layout);
        let ids: Vec<String> = catalog.list().iter().map(|b| b.id.to_string()).collect();

        assert_eq!(ids, vec!["Feb-01-2026-00.00", "Jan-02-2026-09.00", "Jan-01-2026-10.00"]);
        Ok(())
    }

    #[test]
    fn test_incomplete_backups_are_listed() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;
        let layout = BackupLayout::new(temp_dir.path());
        write_backup(&layout, "2026-01-02-00.00", 2)?;
        fs::create_dir_all(layout.sessions_root().join("2026-01-03-00.00"))?;
        let broken = layout.sessions_root().join("2026-01-01-00.00");
        fs::create_dir_all(&broken)?;
        fs::write(broken.join(MANIFEST_FILE), "not json")?;

        let backups = BackupCatalog::with_layout(layout).list();

        assert_eq!(backups.len(), 3);
        assert_eq!(backups[0].id.as_str(), "2026-01-03-00.00");
        assert!(!backups[0].complete);
        assert_eq!(backups[0].sessions, 0);
        assert!(backups[1].complete);
        assert_eq!(backups[1].sessions, 2);
        assert_eq!(backups[1].bytes, 20);
        assert!(!backups[2].complete);
        Ok(())
    }

    #[test]
    fn test_missing_root_is_empty() {
        let catalog = BackupCatalog::with_layout(BackupLayout::new("/nonexistent/zuppaclaude/backups"));
        assert!(catalog.list().is_empty());
    }

    #[test]
    fn test_find() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;
        let layout = BackupLayout::new(temp_dir.path());
        write_backup(&layout, "2026-01-02-00.00", 1)?;
        let catalog = BackupCatalog::with_layout(layout);

        let found = catalog.find(&BackupId::parse("2026-01-02-00.00").unwrap());
        assert_eq!(found.map(|b| b.sessions), Some(1));
        assert!(catalog.find(&BackupId::parse("2026-01-03-00.00").unwrap()).is_none());
        Ok(())
    }
}
