//! Content-addressed manifest storage.
//!
//! Manifests are stored as their canonical bytes at
//! `manifests/<hash>.json`, so the file name doubles as the integrity
//! check: a load recomputes the digest of the stored bytes and fails if it
//! disagrees.

use std::fs;
use std::io::Write as IoWrite;
use std::path::PathBuf;

use tempfile::NamedTempFile;
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{ArtifactKind, FstError, Result};
use crate::model::manifest::Manifest;
use crate::model::types::ContentHash;

// ---------------------------------------------------------------------------
// ManifestStore
// ---------------------------------------------------------------------------

/// The manifest store shared by all workspaces of a project.
#[derive(Clone, Debug)]
pub struct ManifestStore {
    root: PathBuf,
}

impl ManifestStore {
    /// Open the manifest store rooted at `root` (the `manifests/` directory).
    #[must_use]
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// On-disk path of the manifest with the given hash.
    #[must_use]
    pub fn path_of(&self, hash: &ContentHash) -> PathBuf {
        self.root.join(format!("{hash}.json"))
    }

    /// Whether a manifest with the given hash is stored.
    #[must_use]
    pub fn exists(&self, hash: &ContentHash) -> bool {
        self.path_of(hash).is_file()
    }

    /// Canonicalize, hash, and store `manifest`. Idempotent by hash.
    ///
    /// # Errors
    /// Returns [`FstError::Integrity`] if the manifest shape is invalid, a
    /// serialization error if it cannot be encoded, or an I/O error if the
    /// write fails.
    pub fn write(&self, manifest: &Manifest) -> Result<ContentHash> {
        if let Err(detail) = manifest.validate() {
            return Err(FstError::Integrity {
                kind: ArtifactKind::Manifest,
                id: "(unwritten)".to_owned(),
                detail,
            });
        }
        let bytes = manifest.canonical_bytes()?;
        let hash = ContentHash::of_bytes(&bytes);
        if self.exists(&hash) {
            return Ok(hash);
        }

        fs::create_dir_all(&self.root)?;
        let mut tmp = NamedTempFile::new_in(&self.root)?;
        tmp.write_all(&bytes)?;
        tmp.flush()?;
        tmp.persist(self.path_of(&hash))
            .map_err(|e| FstError::Io(e.error))?;
        debug!(hash = %hash, files = manifest.files.len(), "manifest written");
        Ok(hash)
    }

    /// Load the manifest with the given hash.
    ///
    /// # Errors
    /// Returns [`FstError::NotFound`] if absent, or [`FstError::Integrity`]
    /// if the stored bytes disagree with the hash or do not parse as a
    /// manifest.
    pub fn load(&self, hash: &ContentHash) -> Result<Manifest> {
        let path = self.path_of(hash);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(FstError::NotFound {
                    kind: ArtifactKind::Manifest,
                    id: hash.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };
        let actual = ContentHash::of_bytes(&bytes);
        if actual != *hash {
            return Err(FstError::Integrity {
                kind: ArtifactKind::Manifest,
                id: hash.to_string(),
                detail: format!("stored bytes hash to {actual}"),
            });
        }
        let manifest: Manifest = serde_json::from_slice(&bytes).map_err(|e| FstError::Integrity {
            kind: ArtifactKind::Manifest,
            id: hash.to_string(),
            detail: format!("stored bytes do not parse as a manifest: {e}"),
        })?;
        Ok(manifest)
    }

    /// Lazily enumerate every stored manifest hash. Used by GC.
    pub fn iter_hashes(&self) -> impl Iterator<Item = ContentHash> + '_ {
        WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| {
                let name = e.file_name().to_str()?;
                ContentHash::new(name.strip_suffix(".json")?).ok()
            })
    }

    /// Delete the manifest with the given hash, returning its size in bytes.
    ///
    /// Only garbage collection calls this, under the project-exclusive lock.
    ///
    /// # Errors
    /// Returns [`FstError::NotFound`] if absent, or an I/O error if removal
    /// fails.
    pub fn remove(&self, hash: &ContentHash) -> Result<u64> {
        let path = self.path_of(hash);
        let meta = match fs::metadata(&path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(FstError::NotFound {
                    kind: ArtifactKind::Manifest,
                    id: hash.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };
        fs::remove_file(&path)?;
        Ok(meta.len())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::manifest::FileEntry;
    use tempfile::TempDir;

    fn store() -> (TempDir, ManifestStore) {
        let dir = TempDir::new().unwrap();
        let store = ManifestStore::open(dir.path().join("manifests"));
        (dir, store)
    }

    fn sample() -> Manifest {
        let mut m = Manifest::new();
        m.files.push(FileEntry::file(
            "a.txt".into(),
            ContentHash::of_bytes(b"a"),
            1,
            0o644,
        ));
        m.files.push(FileEntry::dir("src".into()));
        m
    }

    #[test]
    fn write_then_load_round_trips() {
        let (_dir, store) = store();
        let manifest = sample();
        let hash = store.write(&manifest).unwrap();
        assert_eq!(hash, manifest.content_hash().unwrap());
        let loaded = store.load(&hash).unwrap();
        assert_eq!(loaded.content_hash().unwrap(), hash);
    }

    #[test]
    fn write_is_idempotent_by_hash() {
        let (_dir, store) = store();
        let h1 = store.write(&sample()).unwrap();
        let h2 = store.write(&sample()).unwrap();
        assert_eq!(h1, h2);
    }

    #[test]
    fn write_rejects_invalid_shape() {
        let (_dir, store) = store();
        let mut bad = Manifest::new();
        bad.files.push(FileEntry::dir("../escape".into()));
        assert!(matches!(
            store.write(&bad),
            Err(FstError::Integrity { kind: ArtifactKind::Manifest, .. })
        ));
    }

    #[test]
    fn load_missing_is_not_found() {
        let (_dir, store) = store();
        let hash = ContentHash::of_bytes(b"ghost");
        assert!(matches!(
            store.load(&hash),
            Err(FstError::NotFound { kind: ArtifactKind::Manifest, .. })
        ));
    }

    #[test]
    fn load_detects_tampered_bytes() {
        let (_dir, store) = store();
        let hash = store.write(&sample()).unwrap();
        fs::write(store.path_of(&hash), b"{}").unwrap();
        assert!(matches!(store.load(&hash), Err(FstError::Integrity { .. })));
    }

    #[test]
    fn load_detects_unparseable_bytes() {
        let (_dir, store) = store();
        // Valid hash-named file whose content matches its digest but is not
        // a manifest document.
        let bytes = b"not json at all";
        let hash = ContentHash::of_bytes(bytes);
        fs::create_dir_all(store.path_of(&hash).parent().unwrap()).unwrap();
        fs::write(store.path_of(&hash), bytes).unwrap();
        match store.load(&hash) {
            Err(FstError::Integrity { detail, .. }) => {
                assert!(detail.contains("do not parse"));
            }
            other => panic!("expected Integrity, got {other:?}"),
        }
    }

    #[test]
    fn iter_hashes_lists_manifests() {
        let (_dir, store) = store();
        let hash = store.write(&sample()).unwrap();
        let listed: Vec<ContentHash> = store.iter_hashes().collect();
        assert_eq!(listed, vec![hash]);
    }

    #[test]
    fn remove_deletes() {
        let (_dir, store) = store();
        let hash = store.write(&sample()).unwrap();
        store.remove(&hash).unwrap();
        assert!(!store.exists(&hash));
    }
}
