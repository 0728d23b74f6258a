//! The external sync tool that moves archives to and from a remote.

use crate::{Result, ZuppaError};
use async_trait::async_trait;
use std::path::Path;
use std::process::Output;
use tokio::process::Command;
use tracing::debug;

/// rclone exits with these when a directory or file does not exist
const EXIT_DIR_NOT_FOUND: i32 = 3;
const EXIT_FILE_NOT_FOUND: i32 = 4;

/// Remote storage reachable through a command-line sync tool.
///
/// `remote` is a configured remote name (with or without the trailing `:`);
/// paths on the remote are `/`-separated and relative to its root.
#[async_trait]
pub trait SyncTool: Send + Sync {
    async fn is_installed(&self) -> bool;

    /// Configured remote names, without the trailing `:`
    async fn list_remotes(&self) -> Result<Vec<String>>;

    async fn remote_exists(&self, remote: &str) -> Result<bool> {
        let wanted = remote_name(remote);
        Ok(self.list_remotes().await?.iter().any(|r| r == wanted))
    }

    async fn copy_to_remote(&self, local: &Path, remote: &str, remote_path: &str) -> Result<()>;

    async fn copy_from_remote(&self, remote: &str, remote_path: &str, local: &Path) -> Result<()>;

    /// File names directly inside `remote_dir`
    async fn list_files(&self, remote: &str, remote_dir: &str) -> Result<Vec<String>>;

    async fn delete_file(&self, remote: &str, remote_path: &str) -> Result<()>;
}

/// `gdrive:` and `gdrive` name the same remote
pub fn remote_name(remote: &str) -> &str {
    remote.trim().trim_end_matches(':')
}

/// rclone driven through its command line
#[derive(Debug, Clone)]
pub struct Rclone {
    binary: String,
}

impl Rclone {
    pub fn new(binary: impl Into<String>) -> Self {
        Self { binary: binary.into() }
    }

    fn target(remote: &str, path: &str) -> String {
        format!("{}:{}", remote_name(remote), path.trim_start_matches('/'))
    }

    /// Run rclone, mapping a non-zero exit to an error about `target`
    async fn run(&self, args: &[&str], target: &str) -> Result<Output> {
        debug!(binary = %self.binary, ?args, "Running sync tool");
        let output = Command::new(&self.binary)
            .args(args)
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => ZuppaError::SyncToolMissing,
                _ => ZuppaError::Transfer(e.to_string()),
            })?;

        if output.status.success() {
            return Ok(output);
        }

        match output.status.code() {
            Some(EXIT_DIR_NOT_FOUND) | Some(EXIT_FILE_NOT_FOUND) => {
                Err(ZuppaError::RemotePathNotFound(target.to_string()))
            }
            _ => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Err(ZuppaError::Transfer(format!(
                    "rclone {} {}: {}",
                    args.first().copied().unwrap_or_default(),
                    target,
                    stderr.trim()
                )))
            }
        }
    }
}

#[async_trait]
impl SyncTool for Rclone {
    async fn is_installed(&self) -> bool {
        which::which(&self.binary).is_ok()
    }

    async fn list_remotes(&self) -> Result<Vec<String>> {
        let output = self.run(&["listremotes"], "remotes").await?;
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(remote_name)
            .filter(|r| !r.is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn copy_to_remote(&self, local: &Path, remote: &str, remote_path: &str) -> Result<()> {
        let target = Self::target(remote, remote_path);
        let source = local.to_string_lossy();
        self.run(&["copyto", source.as_ref(), target.as_str()], &target).await?;
        Ok(())
    }

    async fn copy_from_remote(&self, remote: &str, remote_path: &str, local: &Path) -> Result<()> {
        let source = Self::target(remote, remote_path);
        let dest = local.to_string_lossy();
        self.run(&["copyto", source.as_str(), dest.as_ref()], &source).await?;
        Ok(())
    }

    async fn list_files(&self, remote: &str, remote_dir: &str) -> Result<Vec<String>> {
        let target = Self::target(remote, remote_dir);
        let output = self.run(&["lsf", "--files-only", target.as_str()], &target).await?;
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn delete_file(&self, remote: &str, remote_path: &str) -> Result<()> {
        let target = Self::target(remote, remote_path);
        self.run(&["deletefile", target.as_str()], &target).await?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod fake {
    //! A sync tool whose remotes are folders on the local disk.

    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicBool, Ordering};

    pub(crate) struct LocalSync {
        root: PathBuf,
        remotes: Vec<String>,
        installed: AtomicBool,
    }

    impl LocalSync {
        pub(crate) fn new(root: impl Into<PathBuf>, remotes: &[&str]) -> Self {
            Self {
                root: root.into(),
                remotes: remotes.iter().map(|r| r.to_string()).collect(),
                installed: AtomicBool::new(true),
            }
        }

        pub(crate) fn uninstall(&self) {
            self.installed.store(false, Ordering::SeqCst);
        }

        /// Where `remote:path` lives on disk
        pub(crate) fn path(&self, remote: &str, remote_path: &str) -> PathBuf {
            let mut path = self.root.join(remote_name(remote));
            for part in remote_path.split('/').filter(|p| !p.is_empty()) {
                path.push(part);
            }
            path
        }
    }

    #[async_trait]
    impl SyncTool for LocalSync {
        async fn is_installed(&self) -> bool {
            self.installed.load(Ordering::SeqCst)
        }

        async fn list_remotes(&self) -> Result<Vec<String>> {
            Ok(self.remotes.clone())
        }

        async fn copy_to_remote(&self, local: &Path, remote: &str, remote_path: &str) -> Result<()> {
            let dest = self.path(remote, remote_path);
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(local, dest)?;
            Ok(())
        }

        async fn copy_from_remote(&self, remote: &str, remote_path: &str, local: &Path) -> Result<()> {
            let src = self.path(remote, remote_path);
            if !src.is_file() {
                return Err(ZuppaError::RemotePathNotFound(remote_path.to_string()));
            }
            fs::copy(src, local)?;
            Ok(())
        }

        async fn list_files(&self, remote: &str, remote_dir: &str) -> Result<Vec<String>> {
            let dir = self.path(remote, remote_dir);
            if !dir.is_dir() {
                return Err(ZuppaError::RemotePathNotFound(remote_dir.to_string()));
            }
            let mut names: Vec<String> = fs::read_dir(dir)?
                .filter_map(|e| e.ok())
                .filter(|e| e.path().is_file())
                .map(|e| e.file_name().to_string_lossy().to_string())
                .collect();
            names.sort();
            Ok(names)
        }

        async fn delete_file(&self, remote: &str, remote_path: &str) -> Result<()> {
            let path = self.path(remote, remote_path);
            if !path.is_file() {
                return Err(ZuppaError::RemotePathNotFound(remote_path.to_string()));
            }
            fs::remove_file(path)?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_name() {
        assert_eq!(remote_name("gdrive:"), "gdrive");
        assert_eq!(remote_name(" s3 "), "s3");
    }

    #[test]
    fn test_target() {
        assert_eq!(
            Rclone::target("gdrive:", "/zuppaclaude-backups/sessions/a.zip"),
            "gdrive:zuppaclaude-backups/sessions/a.zip"
        );
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let rclone = Rclone::new("zuppaclaude-no-such-sync-tool");

        assert!(!rclone.is_installed().await);
        assert!(matches!(
            rclone.list_remotes().await,
            Err(ZuppaError::SyncToolMissing)
        ));
    }

    #[tokio::test]
    async fn test_remote_exists_accepts_colon() -> Result<()> {
        let temp_dir = tempfile::TempDir::new()?;
        let sync = fake::LocalSync::new(temp_dir.path(), &["gdrive"]);

        assert!(sync.remote_exists("gdrive:").await?);
        assert!(!sync.remote_exists("dropbox").await?);
        Ok(())
    }
}
