//! Advisory stat cache used to skip re-hashing unchanged files.
//!
//! Maps workspace-relative path to the (size, mtime) observed at the last
//! scan and the blob hash computed then. A lookup hits only when both size
//! and mtime match exactly; anything else falls back to hashing. The cache
//! is strictly a performance hint: a missing or stale file never produces an
//! incorrect manifest, only a slower scan, so load failures degrade to an
//! empty cache instead of erroring.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write as IoWrite;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::warn;

use crate::error::{FstError, Result};
use crate::model::types::ContentHash;

// ---------------------------------------------------------------------------
// Mtime
// ---------------------------------------------------------------------------

/// A file modification time as seconds + nanos since the Unix epoch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mtime {
    /// Whole seconds since the epoch.
    pub secs: u64,
    /// Sub-second nanoseconds.
    pub nanos: u32,
}

impl Mtime {
    /// Convert a [`SystemTime`]; pre-epoch times yield `None` and simply
    /// miss the cache.
    #[must_use]
    pub fn from_system_time(time: SystemTime) -> Option<Self> {
        let d = time.duration_since(UNIX_EPOCH).ok()?;
        Some(Self {
            secs: d.as_secs(),
            nanos: d.subsec_nanos(),
        })
    }
}

// ---------------------------------------------------------------------------
// StatCache
// ---------------------------------------------------------------------------

/// One cached observation of a file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatCacheEntry {
    /// File size in bytes.
    pub size: u64,
    /// Modification time at the last hash.
    pub mtime: Mtime,
    /// Blob hash computed at the last hash.
    pub hash: ContentHash,
}

/// The per-workspace stat cache.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatCache {
    entries: BTreeMap<String, StatCacheEntry>,
}

impl StatCache {
    /// Load the cache at `path`, degrading to empty on any failure.
    #[must_use]
    pub fn load(path: &Path) -> Self {
        match fs::read(path) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "stat cache unreadable, rescanning");
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "stat cache unreadable, rescanning");
                Self::default()
            }
        }
    }

    /// Persist the cache to `path` atomically.
    ///
    /// # Errors
    /// Returns an I/O or serialization error; callers log and continue.
    pub fn save(&self, path: &Path) -> Result<()> {
        let parent = path.parent().ok_or_else(|| {
            FstError::Io(std::io::Error::other("stat cache path has no parent directory"))
        })?;
        fs::create_dir_all(parent)?;
        let bytes = serde_json::to_vec(self)?;
        let mut tmp = NamedTempFile::new_in(parent)?;
        tmp.write_all(&bytes)?;
        tmp.flush()?;
        tmp.persist(path).map_err(|e| FstError::Io(e.error))?;
        Ok(())
    }

    /// The cached hash for `path`, if both size and mtime still match.
    #[must_use]
    pub fn lookup(&self, path: &str, size: u64, mtime: Mtime) -> Option<&ContentHash> {
        let entry = self.entries.get(path)?;
        (entry.size == size && entry.mtime == mtime).then_some(&entry.hash)
    }

    /// Record a fresh observation for `path`.
    pub fn record(&mut self, path: String, size: u64, mtime: Mtime, hash: ContentHash) {
        self.entries.insert(path, StatCacheEntry { size, mtime, hash });
    }

    /// Drop entries for paths not seen by the latest scan.
    pub fn retain_paths(&mut self, seen: &std::collections::BTreeSet<String>) {
        self.entries.retain(|path, _| seen.contains(path));
    }

    /// Number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn mtime(secs: u64) -> Mtime {
        Mtime { secs, nanos: 42 }
    }

    fn hash(byte: u8) -> ContentHash {
        ContentHash::of_bytes(&[byte])
    }

    #[test]
    fn lookup_hits_on_exact_match() {
        let mut cache = StatCache::default();
        cache.record("a.txt".into(), 10, mtime(100), hash(1));
        assert_eq!(cache.lookup("a.txt", 10, mtime(100)), Some(&hash(1)));
    }

    #[test]
    fn lookup_misses_on_any_difference() {
        let mut cache = StatCache::default();
        cache.record("a.txt".into(), 10, mtime(100), hash(1));
        assert!(cache.lookup("a.txt", 11, mtime(100)).is_none());
        assert!(cache.lookup("a.txt", 10, mtime(101)).is_none());
        assert!(cache.lookup("b.txt", 10, mtime(100)).is_none());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".fst/stat_cache");
        let mut cache = StatCache::default();
        cache.record("a".into(), 1, mtime(1), hash(1));
        cache.record("b".into(), 2, mtime(2), hash(2));
        cache.save(&path).unwrap();
        assert_eq!(StatCache::load(&path), cache);
    }

    #[test]
    fn load_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        assert!(StatCache::load(&dir.path().join("absent")).is_empty());
    }

    #[test]
    fn load_corrupt_file_degrades_to_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stat_cache");
        fs::write(&path, b"}{ definitely not json").unwrap();
        assert!(StatCache::load(&path).is_empty());
    }

    #[test]
    fn retain_paths_drops_deleted_files() {
        let mut cache = StatCache::default();
        cache.record("kept".into(), 1, mtime(1), hash(1));
        cache.record("gone".into(), 2, mtime(2), hash(2));
        let seen: std::collections::BTreeSet<String> = ["kept".to_owned()].into();
        cache.retain_paths(&seen);
        assert_eq!(cache.len(), 1);
        assert!(cache.lookup("kept", 1, mtime(1)).is_some());
    }

    #[test]
    fn pre_epoch_mtime_is_none() {
        let before_epoch = UNIX_EPOCH - std::time::Duration::from_secs(1);
        assert!(Mtime::from_system_time(before_epoch).is_none());
    }
}
