//! Merge operations: plan against a sibling, apply a plan, abort.
//!
//! Applying is the only phase that mutates the working tree, and it is
//! bracketed for crash safety: `pending_merge_parents` is persisted to the
//! workspace config **before** the first file is touched, so an interrupted
//! apply still yields a merge commit on the next snapshot. Per-file
//! filesystem failures are tallied into the result, never raised; everything
//! before the per-file loop is fatal.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::error::{FstError, Result};
use crate::merge::markers::render_conflict;
use crate::merge::plan::{MergeAction, MergePlan};
use crate::model::manifest::{DEFAULT_FILE_MODE, Manifest};
use crate::model::types::{ContentHash, SnapshotId, WorkspaceName};

use super::{Workspace, delete_tree_file, write_tree_file};

/// At most this many dirty paths are named in a refusal.
const DIRTY_OVERLAP_REPORT_LIMIT: usize = 5;

// ---------------------------------------------------------------------------
// Options / result
// ---------------------------------------------------------------------------

/// How conflicts are handled when no resolver answers for a path.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConflictMode {
    /// Write both sides framed by inline conflict markers; the path is
    /// reported as a conflict for later resolution.
    #[default]
    Manual,
    /// Take the source side.
    Theirs,
    /// Keep the current side untouched.
    Ours,
}

/// A caller-supplied conflict resolver.
///
/// Receives `(path, current, source, base)` contents (`None` where a side
/// does not have the file) and returns the resolved bytes, or an error
/// message to fall back to the configured [`ConflictMode`].
pub type ConflictResolver =
    dyn Fn(&str, Option<&[u8]>, Option<&[u8]>, Option<&[u8]>) -> std::result::Result<Vec<u8>, String>;

/// Options for [`Workspace::apply_merge`].
#[derive(Clone, Copy, Default)]
pub struct MergeOptions<'a> {
    /// Fallback conflict handling.
    pub mode: ConflictMode,
    /// Optional resolver consulted before the fallback mode.
    pub resolver: Option<&'a ConflictResolver>,
}

impl std::fmt::Debug for MergeOptions<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MergeOptions")
            .field("mode", &self.mode)
            .field("resolver", &self.resolver.map(|_| "<fn>"))
            .finish()
    }
}

/// The outcome of applying a merge plan.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MergeResult {
    /// Paths materialized from source or resolved in place.
    pub applied: Vec<String>,
    /// Paths left with inline conflict markers.
    pub conflicts: Vec<String>,
    /// Paths whose filesystem writes failed.
    pub failed: Vec<String>,
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

impl Workspace {
    /// Plan a merge that pulls `source_head` into this workspace.
    ///
    /// # Errors
    /// Fails if this workspace has no snapshots, the two heads share no
    /// ancestor, or a manifest cannot be loaded.
    pub fn plan_merge(&self, source_head: &SnapshotId) -> Result<MergePlan> {
        let current_id = self.require_head()?;
        let base_id = self.store().snapshots().merge_base(&current_id, source_head)?;
        let base = self.load_snapshot_manifest(&base_id)?;
        let current = self.load_snapshot_manifest(&current_id)?;
        let source = self.load_snapshot_manifest(source_head)?;
        Ok(MergePlan::build(
            base_id, current_id, source_head.clone(), &base, &current, &source,
        ))
    }

    /// Plan a merge from a sibling workspace resolved by name.
    ///
    /// # Errors
    /// Fails if the sibling is not registered or has no snapshots, plus all
    /// [`Self::plan_merge`] failure modes.
    pub fn plan_merge_from(&self, source: &WorkspaceName) -> Result<MergePlan> {
        let (_, sibling_config) = self.sibling(source)?;
        let source_head = sibling_config.current_snapshot_id.ok_or_else(|| {
            FstError::NotFound {
                kind: crate::error::ArtifactKind::Snapshot,
                id: format!("head of workspace '{source}'"),
            }
        })?;
        self.plan_merge(&source_head)
    }

    /// Apply a precomputed merge plan to the working tree.
    ///
    /// Refuses up front if any path the plan touches carries uncommitted
    /// local changes. Records `pending_merge_parents` before mutating, so
    /// the next snapshot is a merge commit even after a crash mid-apply.
    ///
    /// # Errors
    /// Returns [`FstError::DirtyOverlap`] on uncommitted overlap; store and
    /// config failures before the per-file loop are fatal. Per-file write
    /// failures are counted in the result instead.
    pub fn apply_merge(&mut self, plan: &MergePlan, opts: &MergeOptions<'_>) -> Result<MergeResult> {
        // 1. Dirty-overlap gate, computed against the committed head.
        let dirty = self.dirty_paths()?;
        let touched: BTreeSet<&str> = plan.touched_paths().into_iter().collect();
        let overlap: Vec<String> = dirty
            .iter()
            .filter(|p| touched.contains(p.as_str()))
            .cloned()
            .collect();
        if !overlap.is_empty() {
            return Err(FstError::dirty_overlap(overlap, DIRTY_OVERLAP_REPORT_LIMIT));
        }

        // 2. Persist merge parents before the first mutation.
        self.config_mut().pending_merge_parents =
            Some([plan.current_id.clone(), plan.source_id.clone()]);
        self.save_config()?;

        let mut result = MergeResult::default();

        // 3. Non-conflicting updates.
        for action in &plan.to_apply {
            match self.materialize_action(action) {
                Ok(()) => result.applied.push(action.path.clone()),
                Err(e) => {
                    warn!(path = %action.path, error = %e, "merge apply failed for path");
                    result.failed.push(action.path.clone());
                }
            }
        }

        // 4. Conflicts, in plan order.
        for action in &plan.conflicts {
            match self.resolve_conflict(action, opts) {
                Ok(ConflictOutcome::Applied) => result.applied.push(action.path.clone()),
                Ok(ConflictOutcome::Marked) => result.conflicts.push(action.path.clone()),
                Err(e) => {
                    warn!(path = %action.path, error = %e, "conflict handling failed for path");
                    result.failed.push(action.path.clone());
                }
            }
        }

        // 5. If nothing landed, the merge did not happen; drop the pending
        // parents rather than promising a merge commit.
        if result.applied.is_empty() && result.conflicts.is_empty() {
            self.config_mut().pending_merge_parents = None;
            self.save_config()?;
        }

        debug!(
            workspace = %self.name(),
            applied = result.applied.len(),
            conflicts = result.conflicts.len(),
            failed = result.failed.len(),
            "merge plan applied"
        );
        Ok(result)
    }

    /// Abort an in-progress merge: clear `pending_merge_parents` without
    /// touching the working tree.
    ///
    /// # Errors
    /// Returns a config persistence failure.
    pub fn merge_abort(&mut self) -> Result<()> {
        self.config_mut().pending_merge_parents = None;
        self.save_config()
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn load_snapshot_manifest(&self, id: &SnapshotId) -> Result<Manifest> {
        let hash = self.store().snapshots().manifest_hash_of(id)?;
        self.store().manifests().load(&hash)
    }

    /// Paths whose working-tree state differs from the committed head.
    pub(crate) fn dirty_paths(&self) -> Result<Vec<String>> {
        let head = self.head_manifest_or_empty()?;
        let tree = self.scan_working_tree(false)?.manifest;
        let head_index = head.file_index();
        let tree_index = tree.file_index();

        let mut dirty = Vec::new();
        for (path, entry) in &tree_index {
            match head_index.get(path) {
                Some(head_entry) if head_entry.hash == entry.hash => {}
                _ => dirty.push((*path).to_owned()),
            }
        }
        for path in head_index.keys() {
            if !tree_index.contains_key(path) {
                dirty.push((*path).to_owned());
            }
        }
        Ok(dirty)
    }

    /// Write or delete one non-conflicting action.
    fn materialize_action(&self, action: &MergeAction) -> Result<()> {
        match &action.source_hash {
            Some(hash) => {
                let bytes = self.store().blobs().read(hash)?;
                let mode = effective_source_mode(action.source_mode);
                write_tree_file(self.root(), &action.path, &bytes, mode)?;
            }
            None => delete_tree_file(self.root(), &action.path)?,
        }
        Ok(())
    }

    fn resolve_conflict(
        &self,
        action: &MergeAction,
        opts: &MergeOptions<'_>,
    ) -> Result<ConflictOutcome> {
        let current = self.read_side(&action.current_hash)?;
        let source = self.read_side(&action.source_hash)?;
        let base = self.read_side(&action.base_hash)?;

        if let Some(resolver) = opts.resolver {
            match resolver(
                &action.path,
                current.as_deref(),
                source.as_deref(),
                base.as_deref(),
            ) {
                Ok(bytes) => {
                    let mode = effective_source_mode(action.source_mode);
                    write_tree_file(self.root(), &action.path, &bytes, mode)?;
                    return Ok(ConflictOutcome::Applied);
                }
                Err(e) => {
                    warn!(path = %action.path, error = %e, "resolver failed, falling back to mode");
                }
            }
        }

        match opts.mode {
            ConflictMode::Theirs => {
                match source.as_deref() {
                    Some(bytes) => {
                        let mode = effective_source_mode(action.source_mode);
                        write_tree_file(self.root(), &action.path, bytes, mode)?;
                    }
                    // Source deleted the file; taking theirs deletes it here.
                    None => delete_tree_file(self.root(), &action.path)?,
                }
                Ok(ConflictOutcome::Applied)
            }
            ConflictMode::Ours => Ok(ConflictOutcome::Applied),
            ConflictMode::Manual => {
                let doc = render_conflict(current.as_deref(), source.as_deref());
                write_tree_file(self.root(), &action.path, &doc, DEFAULT_FILE_MODE)?;
                Ok(ConflictOutcome::Marked)
            }
        }
    }

    fn read_side(&self, hash: &Option<ContentHash>) -> Result<Option<Vec<u8>>> {
        hash.as_ref()
            .map(|h| self.store().blobs().read(h))
            .transpose()
    }
}

enum ConflictOutcome {
    Applied,
    Marked,
}

const fn effective_source_mode(mode: u32) -> u32 {
    if mode == 0 { DEFAULT_FILE_MODE } else { mode }
}
