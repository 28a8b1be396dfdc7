//! Restore and rollback: materialize a snapshot into the working tree.
//!
//! Restore resolves a target snapshot, plans per-path actions by comparing
//! stored hashes against the on-disk tree, and then executes: write files
//! with their stored modes, recreate symlinks, delete orphans and prune the
//! emptied directories. A dry run returns the plan with nothing executed.
//!
//! Rollback is restore guarded by a dirty-tree check: without `force` it
//! refuses to clobber uncommitted changes and names them.

use std::collections::BTreeSet;
use std::fs;

use tracing::{debug, warn};

use crate::error::{ArtifactKind, FstError, Result};
use crate::model::manifest::EntryKind;
use crate::model::types::SnapshotId;

use super::{Workspace, delete_tree_file, write_tree_file, write_tree_symlink};

/// At most this many dirty paths are named in a rollback refusal.
const DIRTY_REPORT_LIMIT: usize = 5;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Options for [`Workspace::restore`].
#[derive(Clone, Debug, Default)]
pub struct RestoreOptions {
    /// Explicit target snapshot. When absent, `to_base` selects the fork
    /// base; otherwise the current head is used.
    pub snapshot_id: Option<SnapshotId>,
    /// Restore to the workspace's fork base instead of the head.
    pub to_base: bool,
    /// Path filters: a path is touched only if it equals a filter or falls
    /// under one (`/`-separated prefix). Empty means the whole tree.
    pub paths: Vec<String>,
    /// Plan only; execute nothing.
    pub dry_run: bool,
}

/// Options for [`Workspace::rollback`].
#[derive(Clone, Debug, Default)]
pub struct RollbackOptions {
    /// Explicit target snapshot; defaults to the current head.
    pub snapshot_id: Option<SnapshotId>,
    /// Proceed even if the working tree has uncommitted changes.
    pub force: bool,
    /// Plan only; execute nothing.
    pub dry_run: bool,
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// How a path's on-disk content compares to the restore target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathState {
    /// The file does not exist in the working tree.
    Missing,
    /// The file exists with different content.
    Modified,
    /// The file already matches the target.
    Unchanged,
}

/// One planned restore step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RestoreAction {
    /// Workspace-relative path.
    pub path: String,
    /// `None` for orphan deletions; otherwise the observed state relative
    /// to the target content.
    pub state: Option<PathState>,
    /// Whether this step deletes the path.
    pub delete: bool,
}

/// The outcome of a restore (or rollback) operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RestoreResult {
    /// The snapshot restored from.
    pub target_snapshot_id: SnapshotId,
    /// Planned per-path actions.
    pub actions: Vec<RestoreAction>,
    /// Files written.
    pub restored: usize,
    /// Orphans deleted.
    pub deleted: usize,
    /// Paths skipped (already matching, or failed per-file writes).
    pub skipped: usize,
    /// Paths whose blobs are missing (populated on dry runs; a live run
    /// fails with [`FstError::MissingBlobs`] instead).
    pub missing_blobs: Vec<String>,
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

impl Workspace {
    /// Restore files from a snapshot into the working tree.
    ///
    /// # Errors
    /// Fails before touching any file if the target cannot be resolved, its
    /// manifest cannot be loaded, or (on a live run) any needed blob is
    /// missing. Per-file filesystem errors during execution are counted as
    /// skipped, never raised.
    pub fn restore(&mut self, opts: &RestoreOptions) -> Result<RestoreResult> {
        let target = self.resolve_restore_target(opts)?;
        let manifest = {
            let hash = self.store().snapshots().manifest_hash_of(&target)?;
            self.store().manifests().load(&hash)?
        };
        let matches = |path: &str| path_matches(&opts.paths, path);

        // Read-only scan of the tree as it stands.
        let tree = self.scan_working_tree(false)?.manifest;
        let tree_index = tree.file_index();

        // Blob availability check comes before any mutation.
        let mut missing_blobs = Vec::new();
        for entry in &manifest.files {
            if entry.kind == EntryKind::File && matches(&entry.path) {
                if let Some(hash) = &entry.hash
                    && !self.store().blobs().exists(hash)
                {
                    missing_blobs.push(entry.path.clone());
                }
            }
        }
        if !missing_blobs.is_empty() && !opts.dry_run {
            return Err(FstError::MissingBlobs { paths: missing_blobs });
        }

        // Plan.
        let mut actions = Vec::new();
        let target_paths: BTreeSet<&str> = manifest.file_index().keys().copied().collect();
        for entry in &manifest.files {
            if entry.kind != EntryKind::File || !matches(&entry.path) {
                continue;
            }
            let state = match tree_index.get(entry.path.as_str()) {
                None => PathState::Missing,
                Some(on_disk) if on_disk.hash == entry.hash => PathState::Unchanged,
                Some(_) => PathState::Modified,
            };
            actions.push(RestoreAction {
                path: entry.path.clone(),
                state: Some(state),
                delete: false,
            });
        }
        for path in tree_index.keys() {
            if matches(path) && !target_paths.contains(path) {
                actions.push(RestoreAction {
                    path: (*path).to_owned(),
                    state: None,
                    delete: true,
                });
            }
        }
        // Symlinks present on disk but not in the target are orphans too.
        let target_links: BTreeSet<&str> =
            manifest.symlinks.iter().map(|l| l.path.as_str()).collect();
        for link in &tree.symlinks {
            if matches(&link.path) && !target_links.contains(link.path.as_str()) {
                actions.push(RestoreAction {
                    path: link.path.clone(),
                    state: None,
                    delete: true,
                });
            }
        }

        if opts.dry_run {
            return Ok(RestoreResult {
                target_snapshot_id: target,
                actions,
                restored: 0,
                deleted: 0,
                skipped: 0,
                missing_blobs,
            });
        }

        // Execute. Directories first so empty ones survive, then files,
        // symlinks, and finally orphan deletions with parent pruning.
        let mut restored = 0usize;
        let mut deleted = 0usize;
        let mut skipped = 0usize;

        for entry in &manifest.files {
            if entry.kind == EntryKind::Dir && matches(&entry.path) {
                if let Err(e) = fs::create_dir_all(self.root().join(&entry.path)) {
                    warn!(path = %entry.path, error = %e, "restore could not create directory");
                }
            }
        }

        for action in &actions {
            if action.delete {
                match delete_tree_file(self.root(), &action.path) {
                    Ok(()) => deleted += 1,
                    Err(e) => {
                        warn!(path = %action.path, error = %e, "restore could not delete orphan");
                        skipped += 1;
                    }
                }
                continue;
            }
            if action.state == Some(PathState::Unchanged) {
                skipped += 1;
                continue;
            }
            match self.restore_file(&manifest, &action.path) {
                Ok(()) => restored += 1,
                Err(e) => {
                    warn!(path = %action.path, error = %e, "restore could not write file");
                    skipped += 1;
                }
            }
        }

        for link in &manifest.symlinks {
            if !matches(&link.path) {
                continue;
            }
            let existing = fs::read_link(self.root().join(&link.path)).ok();
            if existing.as_deref().and_then(std::path::Path::to_str) == Some(link.target.as_str()) {
                skipped += 1;
                continue;
            }
            match write_tree_symlink(self.root(), &link.path, &link.target) {
                Ok(()) => restored += 1,
                Err(e) => {
                    warn!(path = %link.path, error = %e, "restore could not recreate symlink");
                    skipped += 1;
                }
            }
        }

        debug!(workspace = %self.name(), target = %target, restored, deleted, skipped, "restore executed");
        Ok(RestoreResult {
            target_snapshot_id: target,
            actions,
            restored,
            deleted,
            skipped,
            missing_blobs,
        })
    }

    /// Restore guarded against clobbering uncommitted work.
    ///
    /// # Errors
    /// Without `force`, fails with [`FstError::DirtyOverlap`] naming dirty
    /// paths when the tree differs from the current head. Otherwise as
    /// [`Self::restore`].
    pub fn rollback(&mut self, opts: &RollbackOptions) -> Result<RestoreResult> {
        if !opts.force {
            let dirty = self.dirty_paths()?;
            if !dirty.is_empty() {
                return Err(FstError::dirty_overlap(dirty, DIRTY_REPORT_LIMIT));
            }
        }
        let target = match &opts.snapshot_id {
            Some(id) => id.clone(),
            None => self.require_head()?,
        };
        self.restore(&RestoreOptions {
            snapshot_id: Some(target),
            to_base: false,
            paths: Vec::new(),
            dry_run: opts.dry_run,
        })
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn resolve_restore_target(&self, opts: &RestoreOptions) -> Result<SnapshotId> {
        match &opts.snapshot_id {
            Some(id) => Ok(id.clone()),
            None if opts.to_base => {
                self.config().base_snapshot_id.clone().ok_or_else(|| FstError::NotFound {
                    kind: ArtifactKind::Snapshot,
                    id: format!("fork base of workspace '{}'", self.name()),
                })
            }
            None => self.require_head(),
        }
    }

    fn restore_file(&self, manifest: &crate::model::manifest::Manifest, path: &str) -> Result<()> {
        let entry = manifest.file(path).ok_or_else(|| FstError::NotFound {
            kind: ArtifactKind::Blob,
            id: path.to_owned(),
        })?;
        let hash = entry.hash.as_ref().ok_or_else(|| FstError::NotFound {
            kind: ArtifactKind::Blob,
            id: path.to_owned(),
        })?;
        let bytes = self.store().blobs().read(hash)?;
        write_tree_file(self.root(), path, &bytes, entry.effective_mode())?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

/// Whether `path` equals any filter or falls under one as a directory
/// prefix. An empty filter list matches everything.
fn path_matches(filters: &[String], path: &str) -> bool {
    if filters.is_empty() {
        return true;
    }
    filters.iter().any(|f| {
        path == f.as_str() || (path.len() > f.len() && path.starts_with(f.as_str()) && path.as_bytes()[f.len()] == b'/')
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
