//! The workspace engine: the coordinator over scan, stores, and locks.
//!
//! A [`Workspace`] is an opened handle to one working directory. Opening
//! acquires the project's shared GC lock and then the workspace's exclusive
//! lock, in that order; closing releases them in reverse. While the handle
//! lives, no second engine can operate on the same workspace directory and
//! garbage collection cannot run against the shared store.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{ArtifactKind, FstError, Result};
use crate::lock::LockGuard;
use crate::model::layout::{WorkspaceLayout, find_project_root, find_workspace_root};
use crate::model::manifest::Manifest;
use crate::model::types::{SnapshotId, WorkspaceName};
use crate::store::{ProjectStore, WorkspaceInfo};

pub mod config;
pub mod create;
pub mod drift;
pub mod merge;
pub mod restore;
pub mod scan;
pub mod snapshot;
pub mod stat_cache;

pub use config::WorkspaceConfig;
pub use create::{fork_workspace, init_project};
pub use drift::{ChangeReport, DriftOptions, DriftResult};
pub use merge::{ConflictMode, ConflictResolver, MergeOptions, MergeResult};
pub use restore::{PathState, RestoreAction, RestoreOptions, RestoreResult, RollbackOptions};
pub use scan::ScanOutcome;
pub use snapshot::{SnapshotOptions, SnapshotResult};

// ---------------------------------------------------------------------------
// Workspace
// ---------------------------------------------------------------------------

/// An opened workspace: config, store handles, and the locks that protect
/// them.
#[derive(Debug)]
pub struct Workspace {
    layout: WorkspaceLayout,
    project_root: PathBuf,
    store: ProjectStore,
    config: WorkspaceConfig,
    // Field order is drop order: the workspace lock releases before the
    // project-shared lock, mirroring explicit `close()`.
    workspace_guard: Option<LockGuard>,
    project_guard: Option<LockGuard>,
}

impl Workspace {
    /// Open the workspace containing `start`.
    ///
    /// Walks upward to find the workspace config and the project store,
    /// acquires project-shared then workspace-exclusive locks, loads the
    /// config, and registers the workspace in the project registry
    /// (best-effort).
    ///
    /// # Errors
    /// Returns [`FstError::NotAWorkspace`] if no config is found up the
    /// chain, or [`FstError::LockContended`] if either lock is held
    /// elsewhere.
    pub fn open(start: &Path) -> Result<Self> {
        let ws_root = find_workspace_root(start).ok_or_else(|| FstError::NotAWorkspace {
            start: start.to_path_buf(),
        })?;
        let project_root =
            find_project_root(&ws_root).ok_or_else(|| FstError::NotAWorkspace {
                start: ws_root.clone(),
            })?;
        let layout = WorkspaceLayout::new(&ws_root);
        let project_layout = crate::model::layout::ProjectLayout::new(&project_root);

        // Lock ordering: project-shared first, workspace-exclusive second.
        // If the workspace lock is contended, the shared lock is dropped
        // before returning so GC is not starved by a failed open.
        let project_guard = LockGuard::acquire_shared(&project_layout.gc_lock_file())?;
        let workspace_guard = match LockGuard::acquire_exclusive(&layout.lock_file()) {
            Ok(guard) => guard,
            Err(e) => {
                drop(project_guard);
                return Err(e);
            }
        };

        let config = WorkspaceConfig::load(&layout.config_file())?;
        let store = ProjectStore::open(&project_root)?;

        let ws = Self {
            layout,
            project_root,
            store,
            config,
            workspace_guard: Some(workspace_guard),
            project_guard: Some(project_guard),
        };
        ws.register_best_effort();
        debug!(workspace = %ws.config.workspace_name, root = %ws.root().display(), "workspace opened");
        Ok(ws)
    }

    /// Close the workspace, releasing locks in reverse order of acquisition.
    ///
    /// # Errors
    /// Returns an I/O error if an unlock syscall fails.
    pub fn close(mut self) -> Result<()> {
        if let Some(guard) = self.workspace_guard.take() {
            guard.release()?;
        }
        if let Some(guard) = self.project_guard.take() {
            guard.release()?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// The workspace root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.layout.root()
    }

    /// The project root directory.
    #[must_use]
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// The workspace's human-facing name.
    #[must_use]
    pub const fn name(&self) -> &WorkspaceName {
        &self.config.workspace_name
    }

    /// The current head snapshot, if any snapshot has been taken.
    #[must_use]
    pub const fn head(&self) -> Option<&SnapshotId> {
        self.config.current_snapshot_id.as_ref()
    }

    /// The workspace configuration.
    #[must_use]
    pub const fn config(&self) -> &WorkspaceConfig {
        &self.config
    }

    /// The shared project store.
    #[must_use]
    pub const fn store(&self) -> &ProjectStore {
        &self.store
    }

    // -----------------------------------------------------------------------
    // Internal plumbing shared by the operation modules
    // -----------------------------------------------------------------------

    pub(crate) const fn layout(&self) -> &WorkspaceLayout {
        &self.layout
    }

    pub(crate) fn config_mut(&mut self) -> &mut WorkspaceConfig {
        &mut self.config
    }

    pub(crate) fn save_config(&self) -> Result<()> {
        self.config.save(&self.layout.config_file())
    }

    /// Scan the working tree. With `write_blobs`, file bytes land in the
    /// blob store (the snapshot path); without, the scan is read-only.
    pub(crate) fn scan_working_tree(&self, write_blobs: bool) -> Result<ScanOutcome> {
        let cache_path = self.layout.stat_cache_file();
        let mut cache = stat_cache::StatCache::load(&cache_path);
        let blobs = write_blobs.then(|| self.store.blobs());
        let outcome = scan::scan_tree(self.root(), blobs, &mut cache)?;
        if let Err(e) = cache.save(&cache_path) {
            warn!(error = %e, "failed to persist stat cache");
        }
        Ok(outcome)
    }

    /// The manifest of the current head, or an empty manifest when no
    /// snapshot exists yet.
    pub(crate) fn head_manifest_or_empty(&self) -> Result<Manifest> {
        match &self.config.current_snapshot_id {
            Some(id) => {
                let hash = self.store.snapshots().manifest_hash_of(id)?;
                self.store.manifests().load(&hash)
            }
            None => Ok(Manifest::new()),
        }
    }

    /// The head snapshot id, or a NotFound error naming this workspace.
    pub(crate) fn require_head(&self) -> Result<SnapshotId> {
        self.config.current_snapshot_id.clone().ok_or_else(|| FstError::NotFound {
            kind: ArtifactKind::Snapshot,
            id: format!("head of workspace '{}'", self.config.workspace_name),
        })
    }

    /// Resolve a sibling workspace by name via the registry and load its
    /// config.
    pub(crate) fn sibling(&self, name: &WorkspaceName) -> Result<(WorkspaceInfo, WorkspaceConfig)> {
        let info = self
            .store
            .registry()
            .find_by_name(name)?
            .ok_or_else(|| FstError::NotFound {
                kind: ArtifactKind::Workspace,
                id: name.to_string(),
            })?;
        let config = WorkspaceConfig::load(&WorkspaceLayout::new(&info.path).config_file())?;
        Ok((info, config))
    }

    pub(crate) fn registry_info(&self) -> WorkspaceInfo {
        WorkspaceInfo {
            project_id: self.config.project_id.clone(),
            workspace_id: self.config.workspace_id.clone(),
            workspace_name: self.config.workspace_name.clone(),
            path: self.layout.root().to_path_buf(),
        }
    }

    /// Registry writes are advisory: failures are logged, never raised.
    fn register_best_effort(&self) {
        if let Err(e) = self.store.registry().register(&self.registry_info()) {
            warn!(error = %e, "failed to update workspace registry");
        }
    }
}

// ---------------------------------------------------------------------------
// Working-tree mutation helpers (merge apply + restore)
// ---------------------------------------------------------------------------

/// Write `bytes` at the workspace-relative `rel`, replacing whatever is
/// there, and apply `mode`.
pub(crate) fn write_tree_file(root: &Path, rel: &str, bytes: &[u8], mode: u32) -> std::io::Result<()> {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    // Clear any existing entry first: a stale symlink or directory at this
    // path would otherwise redirect or reject the write.
    match fs::symlink_metadata(&path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(&path)?,
        Ok(_) => fs::remove_file(&path)?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    fs::write(&path, bytes)?;
    set_mode(&path, mode)?;
    Ok(())
}

/// Recreate a symlink at the workspace-relative `rel`.
#[cfg(unix)]
pub(crate) fn write_tree_symlink(root: &Path, rel: &str, target: &str) -> std::io::Result<()> {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    match fs::symlink_metadata(&path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(&path)?,
        Ok(_) => fs::remove_file(&path)?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    std::os::unix::fs::symlink(target, &path)
}

#[cfg(not(unix))]
pub(crate) fn write_tree_symlink(_root: &Path, rel: &str, _target: &str) -> std::io::Result<()> {
    warn!(path = rel, "symlinks are not recreated on this platform");
    Ok(())
}

/// Delete the file at the workspace-relative `rel`, then prune now-empty
/// parent directories up to (but not including) the workspace root.
pub(crate) fn delete_tree_file(root: &Path, rel: &str) -> std::io::Result<()> {
    let path = root.join(rel);
    match fs::remove_file(&path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    }
    let mut dir = path.parent();
    while let Some(d) = dir {
        if d == root {
            break;
        }
        // Stop at the first non-empty (or undeletable) ancestor.
        if fs::remove_dir(d).is_err() {
            break;
        }
        dir = d.parent();
    }
    Ok(())
}

fn set_mode(path: &Path, mode: u32) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    }
    #[cfg(not(unix))]
    {
        let _ = (path, mode);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
