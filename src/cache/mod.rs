//! Trust-on-read cache of file existence and `stat` results.
//!
//! A cached answer is returned without touching the filesystem again. Entries only
//! go away through [`FsCache::invalidate`] (fed by change events),
//! [`FsCache::validate_and_refresh`] (safety net after an unexpected I/O failure) and
//! [`FsCache::clear_all`] (mass change). Everything runs on one thread, so interior
//! mutability through `RefCell` lets readers populate the cache through `&self`.

pub mod entry;

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::paths::normalize_path;

pub use entry::{ExistenceEntry, MISSING_MTIME, StatEntry};

/// Hit/miss counters, for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheCounters {
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug)]
pub struct FsCache {
    enabled: bool,
    existence: RefCell<HashMap<PathBuf, ExistenceEntry>>,
    stats: RefCell<HashMap<PathBuf, Option<StatEntry>>>,
    counters: Cell<CacheCounters>,
}

impl FsCache {
    /// Create a cache. With `enabled == false` every call goes straight to the filesystem.
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            existence: RefCell::new(HashMap::new()),
            stats: RefCell::new(HashMap::new()),
            counters: Cell::new(CacheCounters::default()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Does `path` exist? Cache hits are trusted without revalidation.
    pub fn exists(&self, path: &Path) -> bool {
        let key = normalize_path(path);
        if !self.enabled {
            return entry::stat_path(&key).is_some();
        }
        if let Some(hit) = self.existence.borrow().get(&key) {
            self.record(true);
            return hit.exists;
        }
        self.record(false);
        self.populate(key).is_some()
    }

    /// Cached `stat` of `path`, `None` if it does not exist.
    pub fn stat(&self, path: &Path) -> Option<StatEntry> {
        let key = normalize_path(path);
        if !self.enabled {
            return entry::stat_path(&key);
        }
        if let Some(hit) = self.stats.borrow().get(&key) {
            self.record(true);
            return *hit;
        }
        self.record(false);
        self.populate(key)
    }

    pub fn is_directory(&self, path: &Path) -> bool {
        self.stat(path).map(|s| s.is_directory).unwrap_or(false)
    }

    pub fn is_file(&self, path: &Path) -> bool {
        self.stat(path).map(|s| s.is_file).unwrap_or(false)
    }

    /// Cached mtime, [`MISSING_MTIME`] when the path does not exist.
    pub fn mtime(&self, path: &Path) -> u64 {
        self.stat(path).map(|s| s.mtime).unwrap_or(MISSING_MTIME)
    }

    /// Drop both cached entries for `path`.
    pub fn invalidate(&self, path: &Path) {
        let key = normalize_path(path);
        self.existence.borrow_mut().remove(&key);
        self.stats.borrow_mut().remove(&key);
    }

    /// Invalidate and immediately re-stat `path`. Returns whether it exists now.
    ///
    /// Used when an operation that relied on a cached "exists" answer failed anyway.
    pub fn validate_and_refresh(&self, path: &Path) -> bool {
        self.invalidate(path);
        let exists = self.exists(path);
        tracing::debug!(
            "revalidated {}: {}",
            path.display(),
            if exists { "exists" } else { "missing" }
        );
        exists
    }

    /// Drop every entry.
    pub fn clear_all(&self) {
        let dropped = self.existence.borrow().len();
        self.existence.borrow_mut().clear();
        self.stats.borrow_mut().clear();
        tracing::debug!("filesystem cache cleared ({dropped} entries)");
    }

    /// Number of paths with a cached existence answer.
    pub fn len(&self) -> usize {
        self.existence.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn counters(&self) -> CacheCounters {
        self.counters.get()
    }

    /// One `stat`, stored in both maps.
    fn populate(&self, key: PathBuf) -> Option<StatEntry> {
        let stat = entry::stat_path(&key);
        self.existence
            .borrow_mut()
            .insert(key.clone(), entry::existence_from(stat.as_ref()));
        self.stats.borrow_mut().insert(key, stat);
        stat
    }

    fn record(&self, hit: bool) {
        let mut counters = self.counters.get();
        if hit {
            counters.hits += 1;
        } else {
            counters.misses += 1;
        }
        self.counters.set(counters);
    }
}

impl Default for FsCache {
    fn default() -> Self {
        Self::new(true)
    }
}
