//! Manifest documents: the tree shape of one snapshot.
//!
//! A manifest lists every file, directory, and symlink making up a working
//! tree state. Its identity is the SHA-256 of its canonical serialized bytes,
//! so the canonical form must be deterministic: entries sorted by path using
//! bytewise comparison, compact JSON with a stable field order.
//!
//! Two working trees with identical contents and modes therefore always
//! produce identical manifest hashes, which is what makes store-wide
//! deduplication and cheap "did anything change" checks possible.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::types::ContentHash;

/// Current manifest schema version.
pub const MANIFEST_VERSION: &str = "1";

/// Mode recorded as 0 means "use the platform default".
pub const DEFAULT_FILE_MODE: u32 = 0o644;

// ---------------------------------------------------------------------------
// Entry kinds
// ---------------------------------------------------------------------------

/// The kind of a manifest entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// A regular file with content in the blob store.
    File,
    /// A directory (kept so empty directories survive restore).
    Dir,
    /// A symbolic link (target recorded separately).
    Symlink,
}

// ---------------------------------------------------------------------------
// FileEntry / SymlinkEntry
// ---------------------------------------------------------------------------

/// One file or directory entry within a manifest.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Entry kind (`file` or `dir`).
    #[serde(rename = "type")]
    pub kind: EntryKind,

    /// Forward-slash relative path from the workspace root.
    ///
    /// Never absolute, never containing `..`.
    pub path: String,

    /// Blob digest of the file content. `None` for directories.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<ContentHash>,

    /// File size in bytes (0 for directories).
    pub size: u64,

    /// POSIX mode bits; 0 means "use default 0644".
    pub mode: u32,
}

impl FileEntry {
    /// Create a regular file entry.
    #[must_use]
    pub const fn file(path: String, hash: ContentHash, size: u64, mode: u32) -> Self {
        Self {
            kind: EntryKind::File,
            path,
            hash: Some(hash),
            size,
            mode,
        }
    }

    /// Create a directory entry.
    #[must_use]
    pub const fn dir(path: String) -> Self {
        Self {
            kind: EntryKind::Dir,
            path,
            hash: None,
            size: 0,
            mode: 0,
        }
    }

    /// The mode to apply on disk, substituting the default when unset.
    #[must_use]
    pub const fn effective_mode(&self) -> u32 {
        if self.mode == 0 { DEFAULT_FILE_MODE } else { self.mode }
    }
}

/// One symlink entry within a manifest.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymlinkEntry {
    /// Forward-slash relative path from the workspace root.
    pub path: String,

    /// Link target, recorded verbatim.
    pub target: String,

    /// POSIX mode bits; 0 means "leave to the platform".
    pub mode: u32,
}

// ---------------------------------------------------------------------------
// Path validation
// ---------------------------------------------------------------------------

/// Whether `path` is a valid manifest entry path.
///
/// Valid paths are non-empty, relative, forward-slash separated, and contain
/// no `.` or `..` components.
#[must_use]
pub fn is_valid_entry_path(path: &str) -> bool {
    if path.is_empty() || path.starts_with('/') || path.ends_with('/') {
        return false;
    }
    if path.contains('\\') {
        return false;
    }
    path.split('/').all(|seg| !seg.is_empty() && seg != "." && seg != "..")
}

// ---------------------------------------------------------------------------
// Manifest
// ---------------------------------------------------------------------------

/// A manifest document: the complete tree shape of one snapshot.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Schema version.
    pub version: String,

    /// File and directory entries, sorted by path in canonical form.
    pub files: Vec<FileEntry>,

    /// Symlink entries, sorted by path in canonical form.
    pub symlinks: Vec<SymlinkEntry>,
}

impl Manifest {
    /// Create an empty manifest at the current schema version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            version: MANIFEST_VERSION.to_owned(),
            files: Vec::new(),
            symlinks: Vec::new(),
        }
    }

    /// Sort entries into canonical order (bytewise ascending by path).
    pub fn sort(&mut self) {
        self.files.sort_by(|a, b| a.path.as_bytes().cmp(b.path.as_bytes()));
        self.symlinks.sort_by(|a, b| a.path.as_bytes().cmp(b.path.as_bytes()));
    }

    /// Serialize to canonical bytes: sorted entries, compact JSON.
    ///
    /// # Errors
    /// Returns a serialization error if the document cannot be encoded.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut canonical = self.clone();
        canonical.sort();
        serde_json::to_vec(&canonical)
    }

    /// The content hash of the canonical bytes.
    ///
    /// # Errors
    /// Returns a serialization error if the document cannot be encoded.
    pub fn content_hash(&self) -> Result<ContentHash, serde_json::Error> {
        Ok(ContentHash::of_bytes(&self.canonical_bytes()?))
    }

    /// Validate entry shape: paths well-formed, file entries carry hashes.
    ///
    /// # Errors
    /// Returns a description of the first malformed entry.
    pub fn validate(&self) -> Result<(), String> {
        for entry in &self.files {
            if !is_valid_entry_path(&entry.path) {
                return Err(format!("invalid entry path: {:?}", entry.path));
            }
            if entry.kind == EntryKind::File && entry.hash.is_none() {
                return Err(format!("file entry missing hash: {:?}", entry.path));
            }
            if entry.kind == EntryKind::Symlink {
                return Err(format!(
                    "symlink {:?} listed among file entries",
                    entry.path
                ));
            }
        }
        for link in &self.symlinks {
            if !is_valid_entry_path(&link.path) {
                return Err(format!("invalid symlink path: {:?}", link.path));
            }
        }
        Ok(())
    }

    /// Look up a file entry by path.
    #[must_use]
    pub fn file(&self, path: &str) -> Option<&FileEntry> {
        self.files.iter().find(|e| e.path == path)
    }

    /// Index of regular-file entries by path.
    ///
    /// Directories are excluded: merge planning and change reports operate
    /// on file content, not tree shape.
    #[must_use]
    pub fn file_index(&self) -> BTreeMap<&str, &FileEntry> {
        self.files
            .iter()
            .filter(|e| e.kind == EntryKind::File)
            .map(|e| (e.path.as_str(), e))
            .collect()
    }

    /// Number of regular-file entries.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.files.iter().filter(|e| e.kind == EntryKind::File).count()
    }

    /// Total size in bytes of all regular files.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|e| e.size).sum()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_hash(byte: u8) -> ContentHash {
        ContentHash::of_bytes(&[byte])
    }

    fn sample_manifest() -> Manifest {
        let mut m = Manifest::new();
        m.files.push(FileEntry::file("src/main.rs".into(), sample_hash(1), 10, 0o644));
        m.files.push(FileEntry::file("README.md".into(), sample_hash(2), 5, 0));
        m.files.push(FileEntry::dir("src".into()));
        m.symlinks.push(SymlinkEntry {
            path: "link".into(),
            target: "README.md".into(),
            mode: 0,
        });
        m
    }

    // -- canonical form --

    #[test]
    fn canonical_bytes_are_order_independent() {
        let a = sample_manifest();
        let mut b = sample_manifest();
        b.files.reverse();
        b.symlinks.reverse();
        assert_eq!(a.canonical_bytes().unwrap(), b.canonical_bytes().unwrap());
        assert_eq!(a.content_hash().unwrap(), b.content_hash().unwrap());
    }

    #[test]
    fn canonical_bytes_are_compact() {
        let bytes = sample_manifest().canonical_bytes().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(!text.contains('\n'));
        assert!(!text.contains(": "));
    }

    #[test]
    fn content_hash_changes_with_content() {
        let a = sample_manifest();
        let mut b = sample_manifest();
        b.files[0].hash = Some(sample_hash(99));
        assert_ne!(a.content_hash().unwrap(), b.content_hash().unwrap());
    }

    #[test]
    fn content_hash_changes_with_mode() {
        let a = sample_manifest();
        let mut b = sample_manifest();
        b.files[0].mode = 0o755;
        assert_ne!(a.content_hash().unwrap(), b.content_hash().unwrap());
    }

    #[test]
    fn sort_orders_bytewise() {
        let mut m = Manifest::new();
        m.files.push(FileEntry::dir("b".into()));
        m.files.push(FileEntry::dir("a/c".into()));
        m.files.push(FileEntry::dir("a".into()));
        m.sort();
        let paths: Vec<&str> = m.files.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["a", "a/c", "b"]);
    }

    #[test]
    fn round_trips_through_json() {
        let m = sample_manifest();
        let bytes = m.canonical_bytes().unwrap();
        let back: Manifest = serde_json::from_slice(&bytes).unwrap();
        let mut sorted = m;
        sorted.sort();
        assert_eq!(back, sorted);
    }

    // -- path validation --

    #[test]
    fn valid_paths_accepted() {
        for p in ["a", "a/b", "src/main.rs", "deep/ly/nested/file.txt"] {
            assert!(is_valid_entry_path(p), "rejected {p:?}");
        }
    }

    #[test]
    fn invalid_paths_rejected() {
        for p in ["", "/abs", "a/", "a//b", "..", "a/../b", "./a", "a\\b"] {
            assert!(!is_valid_entry_path(p), "accepted {p:?}");
        }
    }

    #[test]
    fn validate_flags_file_without_hash() {
        let mut m = Manifest::new();
        m.files.push(FileEntry {
            kind: EntryKind::File,
            path: "orphan".into(),
            hash: None,
            size: 0,
            mode: 0,
        });
        assert!(m.validate().unwrap_err().contains("missing hash"));
    }

    #[test]
    fn validate_flags_bad_path() {
        let mut m = Manifest::new();
        m.files.push(FileEntry::dir("../escape".into()));
        assert!(m.validate().is_err());
    }

    // -- accessors --

    #[test]
    fn file_index_excludes_directories() {
        let m = sample_manifest();
        let index = m.file_index();
        assert!(index.contains_key("src/main.rs"));
        assert!(index.contains_key("README.md"));
        assert!(!index.contains_key("src"));
    }

    #[test]
    fn counts_and_sizes_cover_files_only() {
        let m = sample_manifest();
        assert_eq!(m.file_count(), 2);
        assert_eq!(m.total_size(), 15);
    }

    #[test]
    fn effective_mode_substitutes_default() {
        let m = sample_manifest();
        assert_eq!(m.file("README.md").unwrap().effective_mode(), DEFAULT_FILE_MODE);
        assert_eq!(m.file("src/main.rs").unwrap().effective_mode(), 0o644);
    }
}
