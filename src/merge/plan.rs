//! Three-way merge planning over manifests.
//!
//! A [`MergePlan`] is computed from three manifests: the merge **base**, the
//! **current** side (this workspace's head), and the **source** side (the
//! sibling being merged from). Planning is pure: it touches no files and can
//! be recomputed freely.
//!
//! Per path, the decision follows the classic three-way rules:
//!
//! - current and source agree: nothing to do;
//! - source is unchanged from base: nothing to pull;
//! - current is unchanged from base: apply the source side (add, update, or
//!   delete);
//! - otherwise both sides changed differently: conflict. This includes
//!   add/add divergence and both deletion-vs-modification orders, which are
//!   surfaced as conflicts rather than collapsed silently.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::model::manifest::Manifest;
use crate::model::types::{ContentHash, SnapshotId};

// ---------------------------------------------------------------------------
// MergeAction
// ---------------------------------------------------------------------------

/// One per-path decision within a merge plan.
///
/// A hash of `None` means the file does not exist on that side. An action in
/// `to_apply` with `source_hash: None` is a deletion to carry over.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeAction {
    /// Workspace-relative path.
    pub path: String,
    /// Hash at the merge base, if the file existed there.
    pub base_hash: Option<ContentHash>,
    /// Hash on the current side, if present.
    pub current_hash: Option<ContentHash>,
    /// Hash on the source side, if present.
    pub source_hash: Option<ContentHash>,
    /// Mode bits on the source side (0 when absent or unset).
    pub source_mode: u32,
}

impl MergeAction {
    /// Whether this action deletes the path when applied.
    #[must_use]
    pub const fn is_delete(&self) -> bool {
        self.source_hash.is_none()
    }
}

// ---------------------------------------------------------------------------
// MergePlan
// ---------------------------------------------------------------------------

/// The precomputed outcome of three-way planning between two snapshots.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergePlan {
    /// The merge base both sides fork from.
    pub base_id: SnapshotId,
    /// Head of the current side (this workspace).
    pub current_id: SnapshotId,
    /// Head of the source side (the sibling merged from).
    pub source_id: SnapshotId,
    /// Non-conflicting updates to pull from source.
    pub to_apply: Vec<MergeAction>,
    /// Paths modified on both sides differently.
    pub conflicts: Vec<MergeAction>,
}

impl MergePlan {
    /// Build a plan from the three manifests and their snapshot ids.
    #[must_use]
    pub fn build(
        base_id: SnapshotId,
        current_id: SnapshotId,
        source_id: SnapshotId,
        base: &Manifest,
        current: &Manifest,
        source: &Manifest,
    ) -> Self {
        let base_index = base.file_index();
        let current_index = current.file_index();
        let source_index = source.file_index();

        let mut paths: BTreeSet<&str> = BTreeSet::new();
        paths.extend(base_index.keys());
        paths.extend(current_index.keys());
        paths.extend(source_index.keys());

        let mut to_apply = Vec::new();
        let mut conflicts = Vec::new();
        for path in paths {
            let base_hash = base_index.get(path).and_then(|e| e.hash.clone());
            let current_hash = current_index.get(path).and_then(|e| e.hash.clone());
            let source_hash = source_index.get(path).and_then(|e| e.hash.clone());

            if current_hash == source_hash {
                // Both sides agree (same content, or both deleted).
                continue;
            }
            if base_hash == source_hash {
                // Source is unchanged from base; keep the current side.
                continue;
            }

            let action = MergeAction {
                path: path.to_owned(),
                base_hash: base_hash.clone(),
                current_hash: current_hash.clone(),
                source_hash,
                source_mode: source_index.get(path).map_or(0, |e| e.mode),
            };
            if base_hash == current_hash {
                // Current is unchanged from base; pull the source change.
                to_apply.push(action);
            } else {
                conflicts.push(action);
            }
        }

        Self {
            base_id,
            current_id,
            source_id,
            to_apply,
            conflicts,
        }
    }

    /// Every path the plan would touch, in sorted order.
    #[must_use]
    pub fn touched_paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self
            .to_apply
            .iter()
            .chain(&self.conflicts)
            .map(|a| a.path.as_str())
            .collect();
        paths.sort_unstable();
        paths
    }

    /// Whether the plan has neither updates nor conflicts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_apply.is_empty() && self.conflicts.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
