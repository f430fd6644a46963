//! Disk usage of build directories
//!
//! Counts files and bytes under a module's workspace and object directory
//! so `weld clean` can report what it freed.

use std::path::Path;
use walkdir::WalkDir;

/// Disk usage statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Stats {
    /// Number of regular files
    pub files: usize,
    /// Total size in bytes
    pub total_size: u64,
}

impl Stats {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            files: 0,
            total_size: 0,
        }
    }

    /// Sum of two sets of statistics
    #[must_use]
    pub const fn combine(self, other: Self) -> Self {
        Self {
            files: self.files + other.files,
            total_size: self.total_size + other.total_size,
        }
    }
}

/// Collect statistics for a directory tree
///
/// A missing directory yields empty stats rather than an error. Symlinks
/// are not followed and unreadable entries are skipped.
#[must_use]
pub fn collect_stats<P: AsRef<Path>>(dir: P) -> Stats {
    let dir = dir.as_ref();
    let mut stats = Stats::new();

    if !dir.exists() {
        return stats;
    }

    for entry in WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
    {
        if entry.file_type().is_file() {
            stats.files += 1;
            if let Ok(metadata) = entry.metadata() {
                stats.total_size += metadata.len();
            }
        }
    }

    stats
}

/// Convert bytes to human-readable format using binary units (1 KiB = 1024 bytes).
/// Examples: 512 -> "512 B", 1024 -> "1.0 KiB", 1048576 -> "1.0 MiB"
#[must_use]
pub fn human_bytes(size: u64) -> String {
    const UNIT: u64 = 1024;
    const UNITS: &[char] = &['K', 'M', 'G', 'T', 'P', 'E'];

    if size < UNIT {
        return format!("{size} B");
    }

    let mut div = UNIT;
    let mut exp = 0;

    while size / div >= UNIT && exp < UNITS.len() - 1 {
        div *= UNIT;
        exp += 1;
    }

    let unit = UNITS.get(exp).copied().unwrap_or('?');
    format!("{:.1} {unit}iB", size as f64 / div as f64)
}
