//! Error types for fst workspace operations.
//!
//! Defines [`FstError`], the unified error type for the snapshot and
//! workspace engine. Error messages are designed to be self-contained: each
//! variant includes a clear description of what went wrong and actionable
//! guidance on how to proceed.

use std::fmt;
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// ArtifactKind
// ---------------------------------------------------------------------------

/// The kind of stored artifact an error refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArtifactKind {
    /// A content-addressed blob.
    Blob,
    /// A manifest document.
    Manifest,
    /// A snapshot metadata record.
    Snapshot,
    /// A registered workspace.
    Workspace,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blob => write!(f, "blob"),
            Self::Manifest => write!(f, "manifest"),
            Self::Snapshot => write!(f, "snapshot"),
            Self::Workspace => write!(f, "workspace"),
        }
    }
}

// ---------------------------------------------------------------------------
// FstError
// ---------------------------------------------------------------------------

/// Unified error type for fst workspace operations.
#[derive(Debug)]
pub enum FstError {
    /// No workspace config was found walking up from the starting directory.
    NotAWorkspace {
        /// The directory the search started from.
        start: PathBuf,
    },

    /// The target directory is already (or already inside) a workspace.
    AlreadyAWorkspace {
        /// The conflicting workspace root.
        root: PathBuf,
    },

    /// A lock acquisition failed because another holder has the lock.
    LockContended {
        /// Path of the contended lock file.
        path: PathBuf,
    },

    /// Stored content disagrees with its hash, or a snapshot id failed
    /// verification.
    Integrity {
        /// The kind of artifact that failed the check.
        kind: ArtifactKind,
        /// The id or hash of the offending artifact.
        id: String,
        /// Human-readable description of the mismatch.
        detail: String,
    },

    /// A requested artifact does not exist in the store.
    NotFound {
        /// The kind of artifact that was requested.
        kind: ArtifactKind,
        /// The id or hash that was requested.
        id: String,
    },

    /// Two snapshots share no common ancestor.
    NoCommonAncestor {
        /// One snapshot id.
        a: String,
        /// The other snapshot id.
        b: String,
    },

    /// A merge or rollback would clobber uncommitted local changes.
    DirtyOverlap {
        /// The affected paths (possibly truncated).
        paths: Vec<String>,
    },

    /// A restore cannot proceed because needed blobs are gone.
    MissingBlobs {
        /// Paths whose blobs are missing.
        paths: Vec<String>,
    },

    /// A persisted document could not be serialized or deserialized.
    Serialize(serde_json::Error),

    /// An I/O error outside the per-file loops.
    Io(std::io::Error),
}

impl FstError {
    /// Build a [`FstError::DirtyOverlap`] naming at most `limit` paths.
    #[must_use]
    pub fn dirty_overlap(mut paths: Vec<String>, limit: usize) -> Self {
        paths.sort();
        paths.truncate(limit);
        Self::DirtyOverlap { paths }
    }
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

impl fmt::Display for FstError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAWorkspace { start } => {
                write!(
                    f,
                    "no workspace found at or above '{}'.\n  To fix: run from inside a workspace, or initialize one first.",
                    start.display()
                )
            }
            Self::AlreadyAWorkspace { root } => {
                write!(
                    f,
                    "'{}' is already an initialized workspace.\n  To fix: pick a different directory, or open the existing workspace.",
                    root.display()
                )
            }
            Self::LockContended { path } => {
                write!(
                    f,
                    "lock '{}' is held by another process.\n  To fix: wait for the other operation to finish and retry.",
                    path.display()
                )
            }
            Self::Integrity { kind, id, detail } => {
                write!(
                    f,
                    "{kind} '{id}' failed an integrity check: {detail}\n  To fix: the store may be corrupted; restore it from a backup."
                )
            }
            Self::NotFound { kind, id } => {
                write!(f, "{kind} '{id}' not found in the project store.")
            }
            Self::NoCommonAncestor { a, b } => {
                write!(
                    f,
                    "snapshots '{a}' and '{b}' share no common ancestor.\n  To fix: these histories are unrelated and cannot be merged."
                )
            }
            Self::DirtyOverlap { paths } => {
                write!(
                    f,
                    "refusing to overwrite local changes in {} file(s):",
                    paths.len()
                )?;
                for p in paths {
                    write!(f, "\n  - {p}")?;
                }
                write!(
                    f,
                    "\n  To fix: snapshot or revert the local changes, then retry."
                )
            }
            Self::MissingBlobs { paths } => {
                write!(f, "cannot restore {} file(s), their blobs are missing:", paths.len())?;
                for p in paths {
                    write!(f, "\n  - {p}")?;
                }
                write!(
                    f,
                    "\n  To fix: the blobs may have been garbage-collected; restore from a different snapshot."
                )
            }
            Self::Serialize(e) => write!(f, "serialization error: {e}"),
            Self::Io(e) => {
                write!(
                    f,
                    "I/O error: {e}\n  To fix: check file permissions and disk space."
                )
            }
        }
    }
}

// ---------------------------------------------------------------------------
// std::error::Error / From impls
// ---------------------------------------------------------------------------

impl std::error::Error for FstError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Serialize(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for FstError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for FstError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialize(e)
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, FstError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
