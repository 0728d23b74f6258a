//! Read access to Claude Code's live session store.
//!
//! Layout: `<claude>/projects/<project-id>/<session-id>.jsonl`, with
//! agent-originated logs prefixed `agent-`, plus a single `<claude>/history.jsonl`.
//! This module never writes into the store; restores go through
//! [`crate::backup::restore`].

use crate::config::Config;
use crate::fs::metadata::FileMetadata;
use crate::fs::walker::{walk_directory, WalkOptions};
use crate::utils::format::{format_age, format_bytes, truncate_start};
use crate::{Result, ZuppaError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Whether a log belongs to a main conversation or a sub-agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    Main,
    Agent,
}

impl SessionKind {
    pub fn from_file_name(file_name: &str) -> Self {
        if file_name.starts_with("agent-") {
            SessionKind::Agent
        } else {
            SessionKind::Main
        }
    }
}

/// One conversation log
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub file: String,
    pub path: PathBuf,
    pub size: u64,
    pub modified: DateTime<Utc>,
    pub kind: SessionKind,
}

/// Sessions grouped by the working directory they originated from
#[derive(Debug, Clone)]
pub struct Project {
    /// Sanitized directory name, e.g. `-Users-dev-app`
    pub id: String,
    /// Best-effort original path, e.g. `Users/dev/app`
    pub path: String,
    /// Newest first
    pub sessions: Vec<Session>,
}

impl Project {
    pub fn total_size(&self) -> u64 {
        self.sessions.iter().map(|s| s.size).sum()
    }
}

/// Turn a project directory name back into the path it was derived from
pub fn project_path_from_id(id: &str) -> String {
    let path = id.replace('-', "/");
    path.trim_start_matches('/').to_string()
}

pub struct SessionStore {
    config: Arc<Config>,
}

impl SessionStore {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    pub fn projects_dir(&self) -> PathBuf {
        self.config.projects_dir()
    }

    pub fn history_file(&self) -> PathBuf {
        self.config.history_file()
    }

    /// All projects with at least one session, ordered by id.
    ///
    /// Unreadable project directories are logged and skipped.
    pub fn projects(&self) -> Result<Vec<Project>> {
        let projects_dir = self.projects_dir();
        if !projects_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut dirs: Vec<_> = fs::read_dir(&projects_dir)?
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .collect();
        dirs.sort_by_key(|e| e.file_name());

        let mut projects = Vec::new();
        for entry in dirs {
            let id = entry.file_name().to_string_lossy().to_string();
            let dir = entry.path();

            let sessions = match project_sessions(&dir) {
                Ok(sessions) => sessions,
                Err(e) => {
                    warn!(project = %id, error = %e, "Failed to read project sessions");
                    continue;
                }
            };
            if sessions.is_empty() {
                continue;
            }

            projects.push(Project {
                path: project_path_from_id(&id),
                id,
                sessions,
            });
        }

        Ok(projects)
    }

    /// Find a live session by exact id, falling back to the first id with that prefix
    pub fn find_session(&self, id_or_prefix: &str) -> Result<Option<(Project, Session)>> {
        let projects = self.projects()?;

        let exact = projects.iter().find_map(|p| {
            p.sessions
                .iter()
                .find(|s| s.id == id_or_prefix)
                .map(|s| (p.clone(), s.clone()))
        });
        if exact.is_some() {
            return Ok(exact);
        }

        Ok(projects.iter().find_map(|p| {
            p.sessions
                .iter()
                .find(|s| s.id.starts_with(id_or_prefix))
                .map(|s| (p.clone(), s.clone()))
        }))
    }

    /// Copy one live session out of the store.
    ///
    /// Defaults to `<session-id>.jsonl` in the current directory.
    pub fn export(&self, id_or_prefix: &str, output: Option<&Path>) -> Result<PathBuf> {
        let (_, session) = self
            .find_session(id_or_prefix)?
            .ok_or_else(|| ZuppaError::SessionNotFound(id_or_prefix.to_string()))?;

        let dest = output
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(format!("{}.jsonl", session.id)));
        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        fs::copy(&session.path, &dest)?;
        info!(
            "Session {} exported to {} ({})",
            session.id,
            dest.display(),
            format_bytes(session.size)
        );
        Ok(dest)
    }

    /// Print every project and its sessions
    pub fn print_list(&self) -> Result<Vec<Project>> {
        let projects = self.projects()?;
        if projects.is_empty() {
            warn!("No sessions found");
            return Ok(projects);
        }

        let now = Utc::now();
        let mut total_sessions = 0usize;
        let mut total_size = 0u64;

        println!();
        println!("Claude Code Sessions");
        println!();
        for project in &projects {
            println!("  {}", truncate_start(&project.path, 50));
            for session in &project.sessions {
                let marker = match session.kind {
                    SessionKind::Agent => "agent",
                    SessionKind::Main => "main ",
                };
                let short_id: String = if session.id.chars().count() > 20 {
                    format!("{}...", session.id.chars().take(20).collect::<String>())
                } else {
                    session.id.clone()
                };
                println!(
                    "    [{}] {}  {}  {}",
                    marker,
                    short_id,
                    format_bytes(session.size),
                    format_age(session.modified, now)
                );
            }
            total_sessions += project.sessions.len();
            total_size += project.total_size();
            println!();
        }
        println!("Total: {} sessions, {}", total_sessions, format_bytes(total_size));
        println!();

        Ok(projects)
    }
}

/// Session logs directly inside a project directory, newest first
fn project_sessions(dir: &Path) -> std::io::Result<Vec<Session>> {
    let mut sessions = Vec::new();

    for file in walk_directory(dir, WalkOptions::session_logs())? {
        let file_name = file.relative_path.to_string_lossy().to_string();
        let metadata = FileMetadata::from_path(&file.path)?;
        sessions.push(Session {
            id: file_name.trim_end_matches(".jsonl").to_string(),
            kind: SessionKind::from_file_name(&file_name),
            file: file_name,
            path: file.path,
            size: metadata.size,
            modified: metadata.modified,
        });
    }

    sessions.sort_by(|a, b| b.modified.cmp(&a.modified));
    Ok(sessions)
}
