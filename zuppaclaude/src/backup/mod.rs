//! Local backups of the session store.
//!
//! [`archiver`] writes new backups, [`catalog`] lists them and [`restore`]
//! copies one back into the live store without overwriting anything.

pub mod archiver;
pub mod catalog;
pub mod id;
pub mod layout;
pub mod manifest;
pub mod restore;

pub use archiver::{BackupResult, SessionArchiver};
pub use catalog::{BackupCatalog, BackupSummary};
pub use id::BackupId;
pub use layout::BackupLayout;
pub use manifest::{BackupType, Manifest};
pub use restore::{RestoreEngine, RestoreReport};
