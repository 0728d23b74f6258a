//! Utility modules for zuppaclaude.

pub mod errors;
pub mod format;
pub mod logger;

pub use errors::{Result, ZuppaError};
