//! Advisory file locks for workspace and store coordination.
//!
//! Three lock files exist under `.fst` directories:
//!
//! - the **workspace lock** (one per workspace), held exclusively while a
//!   workspace is open;
//! - the **GC rendezvous lock** (one per project), held shared by open
//!   workspaces and exclusively by garbage collection;
//! - the **backend lock** (one per project), held exclusively by whole-store
//!   operations.
//!
//! All locks are OS advisory locks: they are respected only by cooperating
//! processes and released automatically on process termination. Acquisition
//! ordering is project-shared before workspace-exclusive; a caller that fails
//! the second acquisition must drop the first.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::error::{FstError, Result};

// ---------------------------------------------------------------------------
// LockGuard
// ---------------------------------------------------------------------------

/// An acquired advisory lock, released on drop.
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
    file: File,
}

impl LockGuard {
    /// Acquire the lock at `path` in exclusive mode.
    ///
    /// # Errors
    /// Returns [`FstError::LockContended`] if another holder has the lock
    /// (shared or exclusive), or an I/O error if the lock file cannot be
    /// created.
    pub fn acquire_exclusive(path: &Path) -> Result<Self> {
        let file = open_lock_file(path)?;
        // Fully qualified: std's inherent `File::try_lock` family would
        // otherwise shadow the fs2 trait methods on newer toolchains.
        match fs2::FileExt::try_lock_exclusive(&file) {
            Ok(()) => Ok(Self {
                path: path.to_path_buf(),
                file,
            }),
            Err(e) if is_contention(&e) => Err(FstError::LockContended {
                path: path.to_path_buf(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Acquire the lock at `path` in shared mode.
    ///
    /// Shared holders coexist; an exclusive holder excludes them all.
    ///
    /// # Errors
    /// Returns [`FstError::LockContended`] if an exclusive holder has the
    /// lock, or an I/O error if the lock file cannot be created.
    pub fn acquire_shared(path: &Path) -> Result<Self> {
        let file = open_lock_file(path)?;
        match fs2::FileExt::try_lock_shared(&file) {
            Ok(()) => Ok(Self {
                path: path.to_path_buf(),
                file,
            }),
            Err(e) if is_contention(&e) => Err(FstError::LockContended {
                path: path.to_path_buf(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Try to acquire the lock at `path` in exclusive mode.
    ///
    /// Contention is reported as `None`, not as an error.
    ///
    /// # Errors
    /// Returns an I/O error only if the lock file cannot be created.
    pub fn try_acquire_exclusive(path: &Path) -> Result<Option<Self>> {
        match Self::acquire_exclusive(path) {
            Ok(guard) => Ok(Some(guard)),
            Err(FstError::LockContended { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Acquire the lock at `path` in exclusive mode, blocking until every
    /// current holder (shared or exclusive) has released it.
    ///
    /// Used by garbage collection to wait out open workspaces.
    ///
    /// # Errors
    /// Returns an I/O error if the lock file cannot be created or the wait
    /// fails.
    pub fn acquire_exclusive_blocking(path: &Path) -> Result<Self> {
        let file = open_lock_file(path)?;
        fs2::FileExt::lock_exclusive(&file)?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    /// The lock file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the lock explicitly.
    ///
    /// Dropping the guard has the same effect; this form surfaces unlock
    /// errors instead of swallowing them.
    ///
    /// # Errors
    /// Returns an I/O error if the unlock syscall fails.
    pub fn release(self) -> Result<()> {
        fs2::FileExt::unlock(&self.file)?;
        Ok(())
    }
}

// Dropping `file` closes the descriptor, which releases the advisory lock.

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn open_lock_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    // Never truncate: shared holders may have the file open already.
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .append(true)
        .open(path)?;
    Ok(file)
}

fn is_contention(e: &std::io::Error) -> bool {
    e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
        || e.kind() == std::io::ErrorKind::WouldBlock
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
