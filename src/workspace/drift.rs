//! Drift: compare this workspace against a sibling since their merge base.
//!
//! Both heads are resolved from workspace configs (ours in memory, the
//! sibling's read from its own `.fst/config.json` via the registry). The
//! merge base anchors two change reports (what each side did since the
//! base) and two conflict previews: one over the committed heads, one that
//! additionally folds in each side's uncommitted working-tree state.
//!
//! Drift never mutates either workspace. The sibling's tree is scanned
//! read-only with a throwaway stat cache rather than its own, since its
//! workspace lock is not held.

use std::collections::BTreeSet;

use tracing::debug;

use crate::error::{ArtifactKind, FstError, Result};
use crate::merge::plan::MergePlan;
use crate::model::manifest::Manifest;
use crate::model::types::{SnapshotId, WorkspaceName};

use super::stat_cache::StatCache;
use super::{Workspace, scan};

// ---------------------------------------------------------------------------
// Options / result
// ---------------------------------------------------------------------------

/// Options for [`Workspace::drift`].
#[derive(Clone, Debug)]
pub struct DriftOptions {
    /// The sibling workspace to compare against.
    pub target: WorkspaceName,
    /// Also compare uncommitted working-tree state on both sides.
    pub include_dirty: bool,
}

impl DriftOptions {
    /// Compare against `target` with dirty-state comparison enabled.
    #[must_use]
    pub const fn new(target: WorkspaceName) -> Self {
        Self {
            target,
            include_dirty: true,
        }
    }
}

/// What one side did since the merge base.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChangeReport {
    /// Paths added since the base.
    pub added: Vec<String>,
    /// Paths modified since the base.
    pub modified: Vec<String>,
    /// Paths deleted since the base.
    pub deleted: Vec<String>,
}

impl ChangeReport {
    /// All touched paths, in sorted order.
    #[must_use]
    pub fn touched(&self) -> BTreeSet<&str> {
        self.added
            .iter()
            .chain(&self.modified)
            .chain(&self.deleted)
            .map(String::as_str)
            .collect()
    }

    /// Whether nothing changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }
}

/// The outcome of a drift comparison.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DriftResult {
    /// This workspace's name.
    pub our_name: WorkspaceName,
    /// The sibling's name.
    pub their_name: WorkspaceName,
    /// The merge base both comparisons anchor on.
    pub common_ancestor_id: SnapshotId,
    /// This workspace's head.
    pub our_head: SnapshotId,
    /// The sibling's head.
    pub their_head: SnapshotId,
    /// What we did since the base.
    pub our_changes: ChangeReport,
    /// What they did since the base.
    pub their_changes: ChangeReport,
    /// Conflicting paths between the committed heads.
    pub snapshot_conflicts: Vec<String>,
    /// Conflicting paths when both dirty trees are folded in. Empty when
    /// dirty comparison is disabled.
    pub dirty_conflicts: Vec<String>,
    /// Paths touched on both sides since the base.
    pub overlapping_paths: Vec<String>,
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

impl Workspace {
    /// Compare this workspace against a sibling.
    ///
    /// # Errors
    /// Fails if the sibling is unknown, either side has no snapshots, or the
    /// heads share no common ancestor.
    pub fn drift(&self, opts: &DriftOptions) -> Result<DriftResult> {
        let our_head = self.require_head()?;
        let (their_info, their_config) = self.sibling(&opts.target)?;
        let their_head = their_config.current_snapshot_id.ok_or_else(|| FstError::NotFound {
            kind: ArtifactKind::Snapshot,
            id: format!("head of workspace '{}'", opts.target),
        })?;

        let base_id = self.store().snapshots().merge_base(&our_head, &their_head)?;
        let base = self.manifest_of(&base_id)?;
        let ours = self.manifest_of(&our_head)?;
        let theirs = self.manifest_of(&their_head)?;

        let our_changes = change_report(&base, &ours);
        let their_changes = change_report(&base, &theirs);
        let overlapping_paths: Vec<String> = our_changes
            .touched()
            .intersection(&their_changes.touched())
            .map(|p| (*p).to_owned())
            .collect();

        let snapshot_conflicts = conflict_paths(&MergePlan::build(
            base_id.clone(),
            our_head.clone(),
            their_head.clone(),
            &base,
            &ours,
            &theirs,
        ));

        let dirty_conflicts = if opts.include_dirty {
            let our_tree = self.scan_working_tree(false)?.manifest;
            // The sibling's lock is not held; scan read-only with a
            // throwaway cache instead of touching its stat cache.
            let mut scratch = StatCache::default();
            let their_tree = scan::scan_tree(&their_info.path, None, &mut scratch)?;
            conflict_paths(&MergePlan::build(
                base_id.clone(),
                our_head.clone(),
                their_head.clone(),
                &base,
                &our_tree,
                &their_tree.manifest,
            ))
        } else {
            Vec::new()
        };

        debug!(
            ours = %self.name(),
            theirs = %opts.target,
            base = %base_id,
            overlap = overlapping_paths.len(),
            "drift computed"
        );
        Ok(DriftResult {
            our_name: self.name().clone(),
            their_name: opts.target.clone(),
            common_ancestor_id: base_id,
            our_head,
            their_head,
            our_changes,
            their_changes,
            snapshot_conflicts,
            dirty_conflicts,
            overlapping_paths,
        })
    }

    fn manifest_of(&self, id: &SnapshotId) -> Result<Manifest> {
        let hash = self.store().snapshots().manifest_hash_of(id)?;
        self.store().manifests().load(&hash)
    }
}

// ---------------------------------------------------------------------------
// Pure helpers
// ---------------------------------------------------------------------------

/// Classify what `side` did relative to `base`.
fn change_report(base: &Manifest, side: &Manifest) -> ChangeReport {
    let base_index = base.file_index();
    let side_index = side.file_index();
    let mut report = ChangeReport::default();

    for (path, entry) in &side_index {
        match base_index.get(path) {
            None => report.added.push((*path).to_owned()),
            Some(base_entry) if base_entry.hash != entry.hash => {
                report.modified.push((*path).to_owned());
            }
            Some(_) => {}
        }
    }
    for path in base_index.keys() {
        if !side_index.contains_key(path) {
            report.deleted.push((*path).to_owned());
        }
    }
    report
}

fn conflict_paths(plan: &MergePlan) -> Vec<String> {
    plan.conflicts.iter().map(|a| a.path.clone()).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::manifest::FileEntry;
    use crate::model::types::ContentHash;

    fn manifest(entries: &[(&str, &str)]) -> Manifest {
        let mut m = Manifest::new();
        for (path, content) in entries {
            m.files.push(FileEntry::file(
                (*path).to_owned(),
                ContentHash::of_bytes(content.as_bytes()),
                content.len() as u64,
                0o644,
            ));
        }
        m
    }

    #[test]
    fn change_report_classifies_all_three_kinds() {
        let base = manifest(&[("kept", "1"), ("edited", "2"), ("removed", "3")]);
        let side = manifest(&[("kept", "1"), ("edited", "2x"), ("fresh", "4")]);
        let report = change_report(&base, &side);
        assert_eq!(report.added, vec!["fresh"]);
        assert_eq!(report.modified, vec!["edited"]);
        assert_eq!(report.deleted, vec!["removed"]);
    }

    #[test]
    fn change_report_empty_for_identical_sides() {
        let base = manifest(&[("a", "1")]);
        let side = manifest(&[("a", "1")]);
        assert!(change_report(&base, &side).is_empty());
    }

    #[test]
    fn touched_unions_all_kinds() {
        let report = ChangeReport {
            added: vec!["a".into()],
            modified: vec!["m".into()],
            deleted: vec!["d".into()],
        };
        let touched: Vec<&str> = report.touched().into_iter().collect();
        assert_eq!(touched, vec!["a", "d", "m"]);
    }
}
