//! Command-line surface.

use crate::backup::{BackupCatalog, BackupId, RestoreEngine, SessionArchiver};
use crate::cloud::{setup_instructions, CloudBridge, TransferSummary};
use crate::config::Config;
use crate::orchestrator::{
    BackupOptions, BackupOrchestrator, FullBackupReport, Outcome, RestoreOptions, RestoreScope,
    RestoreSummary,
};
use crate::prompt::DialoguerPrompter;
use crate::session::SessionStore;
use crate::settings::SettingsStore;
use crate::utils::format::format_bytes;
use crate::{Result, ZuppaError};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "zuppaclaude", author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Back up sessions and settings
    Backup {
        /// Also upload the backup to this rclone remote
        #[arg(long, value_name = "REMOTE")]
        cloud: Option<String>,
    },

    /// Restore a backup
    Restore {
        /// Backup id, as shown by `backups`
        id: String,

        /// Download the backup from this rclone remote first
        #[arg(long, value_name = "REMOTE")]
        cloud: Option<String>,

        /// Restore only sessions
        #[arg(long, conflicts_with = "settings_only")]
        sessions_only: bool,

        /// Restore only settings
        #[arg(long)]
        settings_only: bool,
    },

    /// List backups
    Backups {
        /// Also list backups on this rclone remote
        #[arg(long, value_name = "REMOTE")]
        cloud: Option<String>,
    },

    /// Claude Code sessions
    #[command(subcommand)]
    Session(SessionCommand),

    /// Cloud copies of backups
    #[command(subcommand)]
    Cloud(CloudCommand),

    /// zuppaclaude settings
    #[command(subcommand)]
    Settings(SettingsCommand),
}

#[derive(Subcommand, Debug)]
pub enum SessionCommand {
    /// List sessions by project
    List,
    /// Back up sessions only
    Backup,
    /// List local backups
    Backups,
    /// Restore sessions from a backup
    Restore { id: String },
    /// Copy one session to a file
    Export {
        /// Session id or a unique prefix of it
        id: String,
        /// Output file (default: `<id>.jsonl`)
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
pub enum CloudCommand {
    /// How to install and configure rclone
    Setup,
    /// List configured rclone remotes
    Remotes,
    /// Upload one backup, or all of them
    Upload { remote: String, id: Option<String> },
    /// Download one backup, or all of them
    Download { remote: String, id: Option<String> },
    /// List backups on a remote
    Backups { remote: String },
    /// Delete a backup from a remote (interactive without an id)
    Delete { remote: String, id: Option<String> },
}

#[derive(Subcommand, Debug)]
pub enum SettingsCommand {
    /// Show current settings
    Show,
    /// Print the settings file location
    Path,
    /// Export settings to a file
    Export { file: PathBuf },
    /// Import settings from a file
    Import { file: PathBuf },
    /// Delete the settings file
    Reset,
}

/// Run a parsed command
pub async fn dispatch(command: Command, config: Arc<Config>) -> Result<()> {
    match command {
        Command::Backup { cloud } => {
            let orchestrator = BackupOrchestrator::new(config);
            let has_cloud = cloud.is_some();
            match orchestrator.backup(BackupOptions { cloud }).await? {
                Some(report) => print_backup_summary(&report),
                None if has_cloud => warn!("No sessions to backup, nothing uploaded"),
                None => {}
            }
        }

        Command::Restore {
            id,
            cloud,
            sessions_only,
            settings_only,
        } => {
            let scope = match (sessions_only, settings_only) {
                (true, _) => RestoreScope::SessionsOnly,
                (_, true) => RestoreScope::SettingsOnly,
                _ => RestoreScope::All,
            };
            run_restore(&BackupOrchestrator::new(config), &id, RestoreOptions { cloud, scope }).await?;
        }

        Command::Backups { cloud } => {
            BackupOrchestrator::new(config).list(cloud.as_deref()).await?;
        }

        Command::Session(command) => run_session(command, config)?,
        Command::Cloud(command) => run_cloud(command, &CloudBridge::new(config)).await?,
        Command::Settings(command) => run_settings(command, config)?,
    }

    Ok(())
}

fn run_session(command: SessionCommand, config: Arc<Config>) -> Result<()> {
    match command {
        SessionCommand::List => {
            SessionStore::new(config).print_list()?;
        }
        SessionCommand::Backup => {
            SessionArchiver::new(config).backup()?;
        }
        SessionCommand::Backups => {
            BackupCatalog::new(&config).print_list();
        }
        SessionCommand::Restore { id } => {
            let id = BackupId::parse(&id)?;
            RestoreEngine::new(config).restore(&id)?;
            info!("Restart Claude Code to see restored sessions");
        }
        SessionCommand::Export { id, output } => {
            SessionStore::new(config).export(&id, output.as_deref())?;
        }
    }
    Ok(())
}

async fn run_restore(orchestrator: &BackupOrchestrator, id: &str, options: RestoreOptions) -> Result<RestoreSummary> {
    let id = BackupId::parse(id)?;
    let summary = orchestrator.restore(&id, options).await?;
    let failed = summary.sessions == Outcome::Failed || summary.settings == Outcome::Failed;

    let label = |outcome: Outcome| match outcome {
        Outcome::Restored => "Restored",
        Outcome::Skipped => "Skipped",
        Outcome::Failed => "Failed",
    };
    println!();
    println!("{}", if failed { "Restore Incomplete" } else { "Restore Complete" });
    println!();
    println!("  Sessions: {}", label(summary.sessions));
    println!("  Settings: {}", label(summary.settings));
    println!();

    if failed {
        return Err(ZuppaError::RestoreFailed(id.to_string()));
    }
    println!("  Restart Claude Code to see restored sessions");
    println!();
    Ok(summary)
}

async fn run_cloud(command: CloudCommand, bridge: &CloudBridge) -> Result<()> {
    match command {
        CloudCommand::Setup => println!("{}", setup_instructions()),

        CloudCommand::Remotes => {
            let remotes = bridge.list_remotes().await?;
            if remotes.is_empty() {
                warn!("No rclone remotes configured");
                println!("{}", setup_instructions());
            } else {
                println!();
                println!("Configured remotes:");
                for remote in remotes {
                    println!("  {}", remote);
                }
                println!();
            }
        }

        CloudCommand::Upload { remote, id: Some(id) } => {
            let id = BackupId::parse(&id)?;
            if !bridge.upload(&remote, &id).await? {
                return Err(ZuppaError::Transfer(format!("nothing of backup {} was uploaded", id)));
            }
        }
        CloudCommand::Upload { remote, id: None } => {
            ensure_transferred(bridge.upload_all(&remote).await?, "upload")?;
        }

        CloudCommand::Download { remote, id: Some(id) } => {
            let id = BackupId::parse(&id)?;
            if !bridge.download(&remote, &id).await? {
                return Err(ZuppaError::BackupNotFound(id.to_string()));
            }
        }
        CloudCommand::Download { remote, id: None } => {
            ensure_transferred(bridge.download_all(&remote).await?, "download")?;
        }

        CloudCommand::Backups { remote } => {
            bridge.print_cloud_backups(&remote).await?;
        }

        CloudCommand::Delete { remote, id: Some(id) } => {
            let id = BackupId::parse(&id)?;
            if !bridge.delete_cloud_backup(&remote, &id).await? {
                return Err(ZuppaError::BackupNotFound(id.to_string()));
            }
        }
        CloudCommand::Delete { remote, id: None } => {
            bridge.delete_interactive(&remote, &DialoguerPrompter::new()).await?;
        }
    }

    Ok(())
}

/// A bulk transfer where every backup failed is an error
fn ensure_transferred(summary: TransferSummary, action: &str) -> Result<()> {
    if summary.failed > 0 && summary.succeeded == 0 {
        return Err(ZuppaError::Transfer(format!(
            "every {} failed ({} backups)",
            action, summary.failed
        )));
    }
    Ok(())
}

fn run_settings(command: SettingsCommand, config: Arc<Config>) -> Result<()> {
    let store = SettingsStore::new(config);

    match command {
        SettingsCommand::Show => store.show()?,
        SettingsCommand::Path => println!("{}", store.path().display()),
        SettingsCommand::Export { file } => {
            store.export(&file)?;
        }
        SettingsCommand::Import { file } => {
            store.import(&file)?;
        }
        SettingsCommand::Reset => {
            store.reset(&DialoguerPrompter::new())?;
        }
    }
    Ok(())
}

fn print_backup_summary(report: &FullBackupReport) {
    let backup = &report.backup;
    println!();
    println!("Backup Complete");
    println!();
    println!("  Backup ID: {}", backup.id);
    println!("  Sessions:  {}", backup.sessions);
    println!("  Size:      {}", format_bytes(backup.bytes));
    println!("  Settings:  {}", if report.settings { "included" } else { "none" });
    println!("  Location:  {}", backup.path.display());
    match report.cloud {
        Some(true) => println!("  Cloud:     uploaded"),
        Some(false) => println!("  Cloud:     upload failed"),
        None => {}
    }
    println!();
    println!("  Restore with:");
    println!("  zuppaclaude restore {}", backup.id);
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::BackupLayout;
    use crate::cloud::archive::{ArchiveTool, ZipArchiver};
    use crate::cloud::sync::fake::LocalSync;
    use crate::session::tests::store_fixture;
    use crate::settings::SettingsDocument;
    use clap::CommandFactory;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    struct BrokenArchiver;

    impl ArchiveTool for BrokenArchiver {
        fn compress_dir(&self, _src: &Path, _archive: &Path) -> Result<()> {
            Err(ZuppaError::Archive("disk full".to_string()))
        }

        fn extract(&self, _archive: &Path, _dest: &Path) -> Result<()> {
            Err(ZuppaError::Archive("disk full".to_string()))
        }
    }

    fn bridge(temp_dir: &TempDir, config: &Arc<Config>, archiver: Arc<dyn ArchiveTool>) -> CloudBridge {
        let sync = Arc::new(LocalSync::new(temp_dir.path().join("remote"), &["gdrive"]));
        CloudBridge::with_tools(config.clone(), sync, archiver)
    }

    fn cloud(command: &[&str]) -> CloudCommand {
        let args: Vec<&str> = ["zuppaclaude", "cloud"].into_iter().chain(command.iter().copied()).collect();
        match Cli::try_parse_from(args).unwrap().command {
            Command::Cloud(command) => command,
            other => panic!("not a cloud command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_restore_flags_conflict() {
        let parsed = Cli::try_parse_from([
            "zuppaclaude",
            "restore",
            "2026-01-05-13.56",
            "--sessions-only",
            "--settings-only",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_cloud_delete_without_id() {
        let cli = Cli::try_parse_from(["zuppaclaude", "cloud", "delete", "gdrive"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Cloud(CloudCommand::Delete { ref remote, id: None }) if remote == "gdrive"
        ));
    }

    #[test]
    fn test_global_options_after_subcommand() {
        let cli = Cli::try_parse_from(["zuppaclaude", "backups", "--cloud", "gdrive", "-l", "debug"]).unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert!(matches!(cli.command, Command::Backups { cloud: Some(_) }));
    }

    #[tokio::test]
    async fn test_cloud_unknown_backup_is_an_error() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config = store_fixture(temp_dir.path(), &[]);
        let bridge = bridge(&temp_dir, &config, Arc::new(ZipArchiver));

        let deleted = run_cloud(cloud(&["delete", "gdrive", "2020-01-01-00.00"]), &bridge).await;
        assert!(matches!(deleted, Err(ZuppaError::BackupNotFound(_))));

        let downloaded = run_cloud(cloud(&["download", "gdrive", "2020-01-01-00.00"]), &bridge).await;
        assert!(matches!(downloaded, Err(ZuppaError::BackupNotFound(_))));
        Ok(())
    }

    #[tokio::test]
    async fn test_cloud_upload_outcomes() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config = store_fixture(temp_dir.path(), &[("-p", "s.jsonl", b"x")]);
        let id = SessionArchiver::new(config.clone()).backup()?.expect("backup").id;

        let broken = bridge(&temp_dir, &config, Arc::new(BrokenArchiver));
        let one = run_cloud(cloud(&["upload", "gdrive", id.as_str()]), &broken).await;
        assert!(matches!(one, Err(ZuppaError::Transfer(_))));
        let all = run_cloud(cloud(&["upload", "gdrive"]), &broken).await;
        assert!(matches!(all, Err(ZuppaError::Transfer(_))));

        let working = bridge(&temp_dir, &config, Arc::new(ZipArchiver));
        run_cloud(cloud(&["upload", "gdrive", id.as_str()]), &working).await?;
        run_cloud(cloud(&["delete", "gdrive", id.as_str()]), &working).await?;
        Ok(())
    }

    #[test]
    fn test_bulk_transfer_with_some_success_is_ok() {
        assert!(ensure_transferred(TransferSummary { succeeded: 1, failed: 3 }, "upload").is_ok());
        assert!(ensure_transferred(TransferSummary::default(), "upload").is_ok());
        assert!(ensure_transferred(TransferSummary { succeeded: 0, failed: 1 }, "upload").is_err());
    }

    #[tokio::test]
    async fn test_restore_with_failed_part_is_an_error() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config = store_fixture(temp_dir.path(), &[("-p", "s.jsonl", b"x")]);
        SettingsStore::new(config.clone()).save(SettingsDocument::from_json("{}")?)?;
        let orchestrator =
            BackupOrchestrator::with_bridge(config.clone(), bridge(&temp_dir, &config, Arc::new(ZipArchiver)));
        let id = orchestrator.backup(BackupOptions::default()).await?.expect("backup").backup.id;

        let summary = run_restore(&orchestrator, id.as_str(), RestoreOptions::default()).await?;
        assert_eq!(summary.settings, Outcome::Restored);

        fs::write(BackupLayout::from_config(&config).settings_snapshot(&id), b"{ broken")?;
        let result = run_restore(&orchestrator, id.as_str(), RestoreOptions::default()).await;
        assert!(matches!(result, Err(ZuppaError::RestoreFailed(_))));

        let unknown = run_restore(&orchestrator, "2020-01-01-00.00", RestoreOptions::default()).await;
        assert!(matches!(unknown, Err(ZuppaError::BackupNotFound(_))));
        Ok(())
    }
}
