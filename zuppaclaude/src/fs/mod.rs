//! File system helpers.

pub mod copy;
pub mod metadata;
pub mod walker;
