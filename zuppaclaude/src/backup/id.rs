//! Backup identifiers.
//!
//! New ids are minted as `YYYY-MM-DD-HH.MM`, so plain string order is
//! chronological order. Ids written by older releases (`Jan-05-2026-13.56`,
//! `2026-01-05T13-56-00`) are still recognised when ordering.

use crate::{Result, ZuppaError};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Format of freshly minted ids
pub const ID_FORMAT: &str = "%Y-%m-%d-%H.%M";

const LEGACY_FORMATS: &[&str] = &["%b-%d-%Y-%H.%M", "%Y-%m-%dT%H-%M-%S"];

/// Upper bound for the same-minute disambiguation suffix
const MAX_SUFFIX: u32 = 99;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackupId(String);

impl BackupId {
    /// Accept an id given by the user or found on disk / on a remote.
    ///
    /// Anything usable as a single path component is accepted.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let invalid = raw.is_empty()
            || raw.starts_with('.')
            || raw.contains(['/', '\\'])
            || raw.chars().any(char::is_control);
        if invalid {
            return Err(ZuppaError::InvalidBackup {
                id: raw.to_string(),
                reason: "not a valid backup id".to_string(),
            });
        }
        Ok(Self(raw.to_string()))
    }

    /// Id for a point in time, without collision handling
    pub fn at<Tz: TimeZone>(time: &DateTime<Tz>) -> Self
    where
        Tz::Offset: fmt::Display,
    {
        Self(time.format(ID_FORMAT).to_string())
    }

    /// Mint an id for `time`, appending `-02`, `-03`, ... while `taken` says
    /// the plain id is already in use.
    pub fn mint<Tz: TimeZone>(time: &DateTime<Tz>, taken: impl Fn(&BackupId) -> bool) -> Result<Self>
    where
        Tz::Offset: fmt::Display,
    {
        let base = Self::at(time);
        if !taken(&base) {
            return Ok(base);
        }
        for n in 2..=MAX_SUFFIX {
            let candidate = Self(format!("{}-{:02}", base.0, n));
            if !taken(&candidate) {
                return Ok(candidate);
            }
        }
        Err(ZuppaError::InvalidBackup {
            id: base.0,
            reason: "too many backups within one minute".to_string(),
        })
    }

    /// Mint an id for the current local time
    pub fn now(taken: impl Fn(&BackupId) -> bool) -> Result<Self> {
        Self::mint(&Local::now(), taken)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name of the remote archive for this id
    pub fn zip_name(&self) -> String {
        format!("{}.zip", self.0)
    }

    /// The moment encoded in the id, if it is in a known format
    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        parse_timestamp(&self.0).or_else(|| {
            let (head, tail) = self.0.rsplit_once('-')?;
            let is_suffix = tail.len() == 2 && tail.chars().all(|c| c.is_ascii_digit());
            if is_suffix {
                parse_timestamp(head)
            } else {
                None
            }
        })
    }
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    std::iter::once(ID_FORMAT)
        .chain(LEGACY_FORMATS.iter().copied())
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

/// Chronological where the id encodes a time, undated ids first, then by string.
impl Ord for BackupId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.timestamp()
            .cmp(&other.timestamp())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for BackupId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for BackupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for BackupId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn id(raw: &str) -> BackupId {
        BackupId::parse(raw).unwrap()
    }

    #[test]
    fn test_minted_ids_sort_lexically() {
        let earlier = Utc.with_ymd_and_hms(2026, 1, 9, 23, 59, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2026, 1, 10, 0, 1, 0).unwrap();

        let a = BackupId::at(&earlier);
        let b = BackupId::at(&later);

        assert_eq!(a.as_str(), "2026-01-09-23.59");
        assert_eq!(b.as_str(), "2026-01-10-00.01");
        assert!(a.as_str() < b.as_str());
        assert!(a < b);
    }

    #[test]
    fn test_mint_disambiguates_same_minute() {
        let time = Utc.with_ymd_and_hms(2026, 3, 1, 12, 30, 45).unwrap();
        let taken = ["2026-03-01-12.30", "2026-03-01-12.30-02"];

        let minted = BackupId::mint(&time, |c| taken.contains(&c.as_str())).unwrap();

        assert_eq!(minted.as_str(), "2026-03-01-12.30-03");
        assert!(minted > id("2026-03-01-12.30-02"));
        assert!(minted < id("2026-03-01-12.31"));
    }

    #[test]
    fn test_legacy_ids_order_chronologically() {
        let mut ids = vec![id("Jan-01-2026-10.00"), id("Feb-01-2026-00.00"), id("Jan-02-2026-09.00")];
        ids.sort_by(|a, b| b.cmp(a));

        let order: Vec<&str> = ids.iter().map(BackupId::as_str).collect();
        assert_eq!(order, vec!["Feb-01-2026-00.00", "Jan-02-2026-09.00", "Jan-01-2026-10.00"]);
    }

    #[test]
    fn test_mixed_formats_and_undated() {
        let new = id("2026-02-01-08.00");
        let legacy = id("Jan-31-2026-08.00");
        let iso = id("2026-01-30T08-00-00");
        let odd = id("manual-copy");

        assert!(new > legacy);
        assert!(legacy > iso);
        assert!(iso > odd);
        assert!(odd.timestamp().is_none());
    }

    #[test]
    fn test_parse_rejects_path_tricks() {
        assert!(BackupId::parse("").is_err());
        assert!(BackupId::parse("..").is_err());
        assert!(BackupId::parse(".temp").is_err());
        assert!(BackupId::parse("a/b").is_err());
        assert!(BackupId::parse("a\\b").is_err());
        assert_eq!(id("  2026-01-01-00.00 ").as_str(), "2026-01-01-00.00");
    }

    #[test]
    fn test_zip_name() {
        assert_eq!(id("2026-01-01-00.00").zip_name(), "2026-01-01-00.00.zip");
    }
}
