//! Custom error types for zuppaclaude.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ZuppaError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("rclone is not installed")]
    SyncToolMissing,

    #[error("Remote not found: {0}")]
    RemoteNotFound(String),

    #[error("Remote path not found: {0}")]
    RemotePathNotFound(String),

    #[error("Transfer failed: {0}")]
    Transfer(String),

    #[error("Backup not found: {0}")]
    BackupNotFound(String),

    #[error("Invalid backup {id}: {reason}")]
    InvalidBackup { id: String, reason: String },

    #[error("Restore of {0} did not complete")]
    RestoreFailed(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Settings file not found: {}", .0.display())]
    SettingsNotFound(PathBuf),

    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    #[error("Prompt error: {0}")]
    Prompt(#[from] dialoguer::Error),
}

impl From<zip::result::ZipError> for ZuppaError {
    fn from(e: zip::result::ZipError) -> Self {
        ZuppaError::Archive(e.to_string())
    }
}

impl From<config::ConfigError> for ZuppaError {
    fn from(e: config::ConfigError) -> Self {
        ZuppaError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ZuppaError>;
