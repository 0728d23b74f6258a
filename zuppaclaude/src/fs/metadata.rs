//! File metadata captured into manifests and re-applied on restore.

use chrono::{DateTime, Utc};
use std::fs;
use std::path::Path;

/// Size and modification time of a backed-up file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    /// File size in bytes
    pub size: u64,

    /// Last modified time
    pub modified: DateTime<Utc>,
}

impl FileMetadata {
    /// Extract metadata from a file path
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let metadata = fs::metadata(path)?;
        let modified = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        Ok(Self {
            size: metadata.len(),
            modified,
        })
    }

    /// Set the file's modification time back to the captured value
    pub fn apply_to_path(&self, path: &Path) -> std::io::Result<()> {
        let file = fs::OpenOptions::new().write(true).open(path)?;
        file.set_modified(self.modified.into())
    }
}
