//! Directory traversal for session discovery and archiving.

use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Files never worth carrying into a backup
const JUNK_FILES: &[&str] = &[".DS_Store", "Thumbs.db"];

/// What to collect while walking
#[derive(Debug, Clone, Default)]
pub struct WalkOptions {
    /// Only look this many levels below the root
    pub max_depth: Option<usize>,

    /// Only keep files with this extension (without the dot)
    pub extension: Option<&'static str>,
}

impl WalkOptions {
    /// `*.jsonl` files directly inside a project directory
    pub fn session_logs() -> Self {
        Self {
            max_depth: Some(1),
            extension: Some("jsonl"),
        }
    }

    fn keeps(&self, entry: &DirEntry) -> bool {
        let name = entry.file_name().to_string_lossy();
        if JUNK_FILES.contains(&name.as_ref()) {
            return false;
        }
        match self.extension {
            Some(wanted) => entry.path().extension().is_some_and(|ext| ext == wanted),
            None => true,
        }
    }
}

/// A regular file found below the walk root
#[derive(Debug, Clone)]
pub struct FileInfo {
    pub path: PathBuf,

    /// Path below the root, e.g. `-Users-dev-app/abc.jsonl`
    pub relative_path: PathBuf,

    /// 1 for files directly inside the root
    pub depth: usize,
}

/// Regular files below `root`, in file-name order within each directory.
///
/// Symlinks are not followed. A missing root yields an empty list.
pub fn walk_directory(root: &Path, options: WalkOptions) -> std::io::Result<Vec<FileInfo>> {
    if !root.exists() {
        return Ok(Vec::new());
    }

    let mut walker = WalkDir::new(root).sort_by_file_name();
    if let Some(depth) = options.max_depth {
        walker = walker.max_depth(depth);
    }

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() || !options.keeps(&entry) {
            continue;
        }

        let relative_path = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .to_path_buf();
        files.push(FileInfo {
            depth: entry.depth(),
            path: entry.into_path(),
            relative_path,
        });
    }

    Ok(files)
}

/// Whether anything worth archiving lives below `root`
pub fn has_files(root: &Path) -> bool {
    walk_directory(root, WalkOptions::default())
        .map(|files| !files.is_empty())
        .unwrap_or(false)
}
