//! Content-addressed blob storage.
//!
//! Blobs are opaque byte sequences keyed by the SHA-256 of their contents,
//! laid out with a two-character prefix fan-out to keep directories small:
//!
//! ```text
//! blobs/ab/abcdef0123...   (full hash as the file name)
//! ```
//!
//! Writes are idempotent and crash-safe: bytes land in a temp file first and
//! the final name appears only via rename, so a reader can never observe a
//! partially written blob. Stored files are made read-only after close.

use std::fs;
use std::io::Write as IoWrite;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{ArtifactKind, FstError, Result};
use crate::model::types::ContentHash;

// ---------------------------------------------------------------------------
// BlobStore
// ---------------------------------------------------------------------------

/// The content-addressed blob store shared by all workspaces of a project.
#[derive(Clone, Debug)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    /// Open the blob store rooted at `root` (the `blobs/` directory).
    #[must_use]
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// On-disk path of the blob with the given hash.
    #[must_use]
    pub fn path_of(&self, hash: &ContentHash) -> PathBuf {
        let (prefix, _) = hash.fanout();
        self.root.join(prefix).join(hash.as_str())
    }

    /// Whether a blob with the given hash is stored.
    #[must_use]
    pub fn exists(&self, hash: &ContentHash) -> bool {
        self.path_of(hash).is_file()
    }

    /// Write `bytes` under `hash`. Idempotent: an existing blob is left
    /// untouched.
    ///
    /// # Errors
    /// Returns [`FstError::Integrity`] if `hash` does not match the digest of
    /// `bytes`, or an I/O error if the write fails.
    pub fn write(&self, hash: &ContentHash, bytes: &[u8]) -> Result<()> {
        let actual = ContentHash::of_bytes(bytes);
        if actual != *hash {
            return Err(FstError::Integrity {
                kind: ArtifactKind::Blob,
                id: hash.to_string(),
                detail: format!("provided bytes hash to {actual}"),
            });
        }
        if self.exists(hash) {
            return Ok(());
        }

        let (prefix, _) = hash.fanout();
        let fanout_dir = self.root.join(prefix);
        fs::create_dir_all(&fanout_dir)?;
        let final_path = fanout_dir.join(hash.as_str());

        let mut tmp = NamedTempFile::new_in(&self.root)?;
        tmp.write_all(bytes)?;
        tmp.flush()?;
        let mut perms = tmp.as_file().metadata()?.permissions();
        perms.set_readonly(true);
        tmp.as_file().set_permissions(perms)?;
        tmp.persist(&final_path).map_err(|e| FstError::Io(e.error))?;
        debug!(hash = %hash, size = bytes.len(), "blob written");
        Ok(())
    }

    /// Hash `bytes` and store them, returning the computed hash.
    ///
    /// # Errors
    /// Returns an I/O error if the write fails.
    pub fn write_bytes(&self, bytes: &[u8]) -> Result<ContentHash> {
        let hash = ContentHash::of_bytes(bytes);
        self.write(&hash, bytes)?;
        Ok(hash)
    }

    /// Read the blob with the given hash.
    ///
    /// # Errors
    /// Returns [`FstError::NotFound`] if the blob is absent, or
    /// [`FstError::Integrity`] if the stored bytes disagree with the hash.
    pub fn read(&self, hash: &ContentHash) -> Result<Vec<u8>> {
        let path = self.path_of(hash);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(FstError::NotFound {
                    kind: ArtifactKind::Blob,
                    id: hash.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };
        let actual = ContentHash::of_bytes(&bytes);
        if actual != *hash {
            return Err(FstError::Integrity {
                kind: ArtifactKind::Blob,
                id: hash.to_string(),
                detail: format!("stored bytes hash to {actual}"),
            });
        }
        Ok(bytes)
    }

    /// Lazily enumerate every stored blob hash.
    ///
    /// Intended for garbage collection, which runs under the project's
    /// exclusive lock. Entries that do not parse as hashes (stray temp
    /// files) are skipped.
    pub fn iter_hashes(&self) -> impl Iterator<Item = ContentHash> + '_ {
        WalkDir::new(&self.root)
            .min_depth(2)
            .max_depth(2)
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| {
                let name = e.file_name().to_str()?;
                ContentHash::new(name).ok()
            })
    }

    /// Delete the blob with the given hash, returning its size in bytes.
    ///
    /// Only garbage collection calls this, under the project-exclusive lock.
    ///
    /// # Errors
    /// Returns [`FstError::NotFound`] if the blob is absent, or an I/O error
    /// if removal fails.
    pub fn remove(&self, hash: &ContentHash) -> Result<u64> {
        let path = self.path_of(hash);
        let meta = match fs::metadata(&path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(FstError::NotFound {
                    kind: ArtifactKind::Blob,
                    id: hash.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };
        // Stored blobs are read-only; lift that before unlinking so removal
        // works on platforms where the readonly bit blocks deletion.
        let mut perms = meta.permissions();
        if perms.readonly() {
            #[allow(clippy::permissions_set_readonly_false)]
            perms.set_readonly(false);
            fs::set_permissions(&path, perms)?;
        }
        fs::remove_file(&path)?;
        Ok(meta.len())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
