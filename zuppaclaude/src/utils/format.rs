//! Human-readable formatting for sizes and session ages.

use chrono::{DateTime, Utc};

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

/// Format how long ago `when` was, relative to `now`.
///
/// Anything older than a week is shown as a plain date.
pub fn format_age(when: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = now.signed_duration_since(when).num_seconds().max(0);

    if seconds < 60 {
        "just now".to_string()
    } else if seconds < 3600 {
        format!("{}m ago", seconds / 60)
    } else if seconds < 86_400 {
        format!("{}h ago", seconds / 3600)
    } else if seconds < 604_800 {
        format!("{}d ago", seconds / 86_400)
    } else {
        when.format("%Y-%m-%d").to_string()
    }
}

/// Shorten `text` to at most `max` characters, keeping the tail.
pub fn truncate_start(text: &str, max: usize) -> String {
    let count = text.chars().count();
    if count <= max || max <= 3 {
        return text.to_string();
    }
    let tail: String = text.chars().skip(count - (max - 3)).collect();
    format!("...{}", tail)
}
