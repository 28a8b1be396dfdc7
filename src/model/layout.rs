//! On-disk layout of the `.fst` metadata directories.
//!
//! Two layers share the same directory name:
//!
//! - the **project** `.fst` holds the shared store (`blobs/`, `manifests/`,
//!   `snapshots/`), the workspace registry, and the project-level lock files;
//! - each **workspace** `.fst` (which may be the same directory when the
//!   workspace root is the project root) holds that workspace's config,
//!   lock file, and stat cache.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Metadata directory name, shared by project and workspace roots.
pub const FST_DIR: &str = ".fst";

/// Subdirectory for content-addressed blobs.
pub const BLOBS_DIR: &str = "blobs";

/// Subdirectory for manifest documents.
pub const MANIFESTS_DIR: &str = "manifests";

/// Subdirectory for snapshot metadata records.
pub const SNAPSHOTS_DIR: &str = "snapshots";

/// Workspace registry file name.
pub const REGISTRY_FILE: &str = "registry.json";

/// GC rendezvous lock file name (shared by workspaces, exclusive by GC).
pub const GC_LOCK_FILE: &str = "gc.lock";

/// Backend lock file name (exclusive, for whole-store mutations).
pub const BACKEND_LOCK_FILE: &str = "backend.lock";

/// Per-workspace config file name.
pub const CONFIG_FILE: &str = "config.json";

/// Per-workspace lock file name.
pub const WORKSPACE_LOCK_FILE: &str = "lock";

/// Per-workspace stat cache file name.
pub const STAT_CACHE_FILE: &str = "stat_cache";

// ---------------------------------------------------------------------------
// ProjectLayout
// ---------------------------------------------------------------------------

/// Resolved paths under a project root's `.fst` directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProjectLayout {
    root: PathBuf,
}

impl ProjectLayout {
    /// Create a layout rooted at `root` (the project root, not `.fst` itself).
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The project root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The project `.fst` directory.
    #[must_use]
    pub fn fst_dir(&self) -> PathBuf {
        self.root.join(FST_DIR)
    }

    /// The blob store directory.
    #[must_use]
    pub fn blobs_dir(&self) -> PathBuf {
        self.fst_dir().join(BLOBS_DIR)
    }

    /// The manifest store directory.
    #[must_use]
    pub fn manifests_dir(&self) -> PathBuf {
        self.fst_dir().join(MANIFESTS_DIR)
    }

    /// The snapshot store directory.
    #[must_use]
    pub fn snapshots_dir(&self) -> PathBuf {
        self.fst_dir().join(SNAPSHOTS_DIR)
    }

    /// The workspace registry file.
    #[must_use]
    pub fn registry_file(&self) -> PathBuf {
        self.fst_dir().join(REGISTRY_FILE)
    }

    /// The GC rendezvous lock file.
    #[must_use]
    pub fn gc_lock_file(&self) -> PathBuf {
        self.fst_dir().join(GC_LOCK_FILE)
    }

    /// The backend lock file.
    #[must_use]
    pub fn backend_lock_file(&self) -> PathBuf {
        self.fst_dir().join(BACKEND_LOCK_FILE)
    }

    /// Whether `root` looks like an initialized project root.
    ///
    /// The blob directory is the marker: it is created at init time and is
    /// never removed.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.blobs_dir().is_dir()
    }

    /// Create the store directory skeleton. Idempotent.
    ///
    /// # Errors
    /// Returns an I/O error if a directory cannot be created.
    pub fn ensure_dirs(&self) -> io::Result<()> {
        fs::create_dir_all(self.blobs_dir())?;
        fs::create_dir_all(self.manifests_dir())?;
        fs::create_dir_all(self.snapshots_dir())?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// WorkspaceLayout
// ---------------------------------------------------------------------------

/// Resolved paths under a workspace root's `.fst` directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkspaceLayout {
    root: PathBuf,
}

impl WorkspaceLayout {
    /// Create a layout rooted at `root` (the workspace root).
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The workspace root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The workspace `.fst` directory.
    #[must_use]
    pub fn fst_dir(&self) -> PathBuf {
        self.root.join(FST_DIR)
    }

    /// The workspace config file.
    #[must_use]
    pub fn config_file(&self) -> PathBuf {
        self.fst_dir().join(CONFIG_FILE)
    }

    /// The workspace lock file.
    #[must_use]
    pub fn lock_file(&self) -> PathBuf {
        self.fst_dir().join(WORKSPACE_LOCK_FILE)
    }

    /// The workspace stat cache file.
    #[must_use]
    pub fn stat_cache_file(&self) -> PathBuf {
        self.fst_dir().join(STAT_CACHE_FILE)
    }

    /// Whether `root` holds a workspace config.
    #[must_use]
    pub fn has_config(&self) -> bool {
        self.config_file().is_file()
    }
}

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

/// Walk upward from `start` to the nearest directory holding a workspace
/// config (`.fst/config.json`). Returns `None` if the chain is exhausted.
#[must_use]
pub fn find_workspace_root(start: &Path) -> Option<PathBuf> {
    let mut dir = Some(start);
    while let Some(d) = dir {
        if WorkspaceLayout::new(d).has_config() {
            return Some(d.to_path_buf());
        }
        dir = d.parent();
    }
    None
}

/// Walk upward from `start` (inclusive) to the nearest initialized project
/// root (a directory whose `.fst` contains the blob store).
#[must_use]
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    let mut dir = Some(start);
    while let Some(d) = dir {
        if ProjectLayout::new(d).is_initialized() {
            return Some(d.to_path_buf());
        }
        dir = d.parent();
    }
    None
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
