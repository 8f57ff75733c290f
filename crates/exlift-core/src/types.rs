//! Shared entry types and size formatting

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A directory-listing entry as exposed to callers.
///
/// The first cluster stays internal to the filesystem layer; callers only
/// see name, size, kind and modification time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    /// File or directory name
    pub name: String,

    /// Size in bytes (0 for directories)
    pub size: u64,

    /// True if this is a directory
    pub is_dir: bool,

    /// Last-modified time, `None` when the on-disk timestamp is null or
    /// malformed. Decoded as local civil time without a zone.
    pub mtime: Option<NaiveDateTime>,
}

impl fmt::Display for FileEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_dir { "d" } else { "f" };
        write!(
            f,
            "{} {:>12} {}",
            kind,
            if self.is_dir {
                "<DIR>".to_string()
            } else {
                format_size(self.size)
            },
            self.name
        )
    }
}

/// Format a byte count in human-readable form.
///
/// Sizes under 1 KiB print as plain bytes, everything above with two
/// decimals in the largest fitting unit.
pub fn format_size(size: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut value = size as f64;
    let mut unit = 0;

    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{} {}", size, UNITS[unit])
    } else {
        format!("{:.2} {}", value, UNITS[unit])
    }
}
