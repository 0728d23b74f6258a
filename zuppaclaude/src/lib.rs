//! zuppaclaude
//!
//! Backup, restore and cloud sync of Claude Code sessions and zuppaclaude
//! settings.

pub mod backup;
pub mod cli;
pub mod cloud;
pub mod config;
pub mod fs;
pub mod orchestrator;
pub mod prompt;
pub mod session;
pub mod settings;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use utils::errors::ZuppaError;
pub type Result<T> = std::result::Result<T, ZuppaError>;
