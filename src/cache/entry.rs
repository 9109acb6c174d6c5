use std::fs::Metadata;
use std::path::Path;

/// Sentinel mtime recorded for paths confirmed not to exist.
pub const MISSING_MTIME: u64 = 0;

/// Cached answer to "does this path exist?".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExistenceEntry {
    pub exists: bool,
    /// Nanoseconds since the epoch; [`MISSING_MTIME`] when the path does not exist.
    pub mtime: u64,
}

/// Cached `stat` result for an existing path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatEntry {
    pub mtime: u64,
    pub len: u64,
    pub is_directory: bool,
    pub is_file: bool,
}

impl StatEntry {
    fn from_metadata(metadata: &Metadata) -> Self {
        let mtime = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
            .unwrap_or(MISSING_MTIME)
            // An mtime of exactly the epoch would collide with the sentinel.
            .max(1);
        Self {
            mtime,
            len: metadata.len(),
            is_directory: metadata.is_dir(),
            is_file: metadata.is_file(),
        }
    }
}

/// One `stat` call. `None` when the path does not exist or cannot be stat'ed.
pub fn stat_path(path: &Path) -> Option<StatEntry> {
    std::fs::metadata(path)
        .ok()
        .map(|metadata| StatEntry::from_metadata(&metadata))
}

/// Existence entry derived from a stat result.
pub fn existence_from(stat: Option<&StatEntry>) -> ExistenceEntry {
    match stat {
        Some(stat) => ExistenceEntry {
            exists: true,
            mtime: stat.mtime,
        },
        None => ExistenceEntry {
            exists: false,
            mtime: MISSING_MTIME,
        },
    }
}
