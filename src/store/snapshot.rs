//! Snapshot metadata storage and history-DAG queries.
//!
//! Snapshot records live at `snapshots/<id>.json`. The DAG exists only as
//! parent ids resolved on demand against this store; nothing ever holds
//! two-way pointers, so cycles cannot form in memory. Ancestry queries are
//! breadth-first walks over id sets.

use std::collections::{HashSet, VecDeque};
use std::fs;
use std::io::Write as IoWrite;
use std::path::PathBuf;

use tempfile::NamedTempFile;
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{ArtifactKind, FstError, Result};
use crate::model::snapshot::SnapshotMeta;
use crate::model::types::{ContentHash, SnapshotId};

pub use crate::model::snapshot::compute_snapshot_id;

// ---------------------------------------------------------------------------
// SnapshotStore
// ---------------------------------------------------------------------------

/// The snapshot metadata store shared by all workspaces of a project.
#[derive(Clone, Debug)]
pub struct SnapshotStore {
    root: PathBuf,
}

impl SnapshotStore {
    /// Open the snapshot store rooted at `root` (the `snapshots/` directory).
    #[must_use]
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// On-disk path of the record with the given id.
    #[must_use]
    pub fn path_of(&self, id: &SnapshotId) -> PathBuf {
        self.root.join(format!("{id}.json"))
    }

    /// Whether a snapshot with the given id is stored.
    #[must_use]
    pub fn exists(&self, id: &SnapshotId) -> bool {
        self.path_of(id).is_file()
    }

    /// Store a snapshot record.
    ///
    /// Re-writing an identical record is a no-op; a record with the same id
    /// but different contents is rejected.
    ///
    /// # Errors
    /// Returns [`FstError::Integrity`] if the meta's id does not verify
    /// against its fields or collides with a differing record, or an I/O
    /// error if the write fails.
    pub fn write_meta(&self, meta: &SnapshotMeta) -> Result<()> {
        if !meta.verify_id() {
            return Err(FstError::Integrity {
                kind: ArtifactKind::Snapshot,
                id: meta.id.to_string(),
                detail: "id does not match the record's fields".to_owned(),
            });
        }
        if self.exists(&meta.id) {
            let existing = self.load_meta(&meta.id)?;
            if existing == *meta {
                return Ok(());
            }
            return Err(FstError::Integrity {
                kind: ArtifactKind::Snapshot,
                id: meta.id.to_string(),
                detail: "a different record with this id already exists".to_owned(),
            });
        }

        fs::create_dir_all(&self.root)?;
        let bytes = serde_json::to_vec_pretty(meta)?;
        let mut tmp = NamedTempFile::new_in(&self.root)?;
        tmp.write_all(&bytes)?;
        tmp.flush()?;
        tmp.persist(self.path_of(&meta.id))
            .map_err(|e| FstError::Io(e.error))?;
        debug!(id = %meta.id, parents = meta.parent_snapshot_ids.len(), "snapshot written");
        Ok(())
    }

    /// Load the record with the given id, verifying it.
    ///
    /// # Errors
    /// Returns [`FstError::NotFound`] if absent, or [`FstError::Integrity`]
    /// if the record does not parse, carries a different id, or fails id
    /// verification.
    pub fn load_meta(&self, id: &SnapshotId) -> Result<SnapshotMeta> {
        let path = self.path_of(id);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(FstError::NotFound {
                    kind: ArtifactKind::Snapshot,
                    id: id.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };
        let meta: SnapshotMeta = serde_json::from_slice(&bytes).map_err(|e| FstError::Integrity {
            kind: ArtifactKind::Snapshot,
            id: id.to_string(),
            detail: format!("stored bytes do not parse as a snapshot record: {e}"),
        })?;
        if meta.id != *id {
            return Err(FstError::Integrity {
                kind: ArtifactKind::Snapshot,
                id: id.to_string(),
                detail: format!("record carries id {}", meta.id),
            });
        }
        if !meta.verify_id() {
            return Err(FstError::Integrity {
                kind: ArtifactKind::Snapshot,
                id: id.to_string(),
                detail: "id does not match the record's fields".to_owned(),
            });
        }
        Ok(meta)
    }

    /// The manifest hash referenced by the given snapshot.
    ///
    /// # Errors
    /// Propagates [`Self::load_meta`] failures.
    pub fn manifest_hash_of(&self, id: &SnapshotId) -> Result<ContentHash> {
        Ok(self.load_meta(id)?.manifest_hash)
    }

    /// Lazily enumerate every stored snapshot id. Used by GC.
    pub fn iter_ids(&self) -> impl Iterator<Item = SnapshotId> + '_ {
        WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| {
                let name = e.file_name().to_str()?;
                SnapshotId::new(name.strip_suffix(".json")?).ok()
            })
    }

    // -----------------------------------------------------------------------
    // Ancestry
    // -----------------------------------------------------------------------

    /// The ancestor set of `id`, including `id` itself.
    ///
    /// # Errors
    /// Returns [`FstError::NotFound`] if any snapshot in the chain is
    /// missing.
    pub fn ancestor_set(&self, id: &SnapshotId) -> Result<HashSet<SnapshotId>> {
        let mut seen: HashSet<SnapshotId> = HashSet::new();
        let mut queue: VecDeque<SnapshotId> = VecDeque::new();
        queue.push_back(id.clone());
        while let Some(current) = queue.pop_front() {
            if !seen.insert(current.clone()) {
                continue;
            }
            let meta = self.load_meta(&current)?;
            for parent in meta.parent_snapshot_ids {
                if !seen.contains(&parent) {
                    queue.push_back(parent);
                }
            }
        }
        Ok(seen)
    }

    /// Whether `ancestor` is a proper ancestor of `descendant`.
    ///
    /// # Errors
    /// Propagates load failures during the walk.
    pub fn is_ancestor(&self, ancestor: &SnapshotId, descendant: &SnapshotId) -> Result<bool> {
        if ancestor == descendant {
            return Ok(false);
        }
        Ok(self.ancestor_set(descendant)?.contains(ancestor))
    }

    /// The merge base (lowest common ancestor) of `a` and `b`.
    ///
    /// Candidates are the intersection of the two ancestor sets. The result
    /// is a maximal element of that intersection under the is-ancestor-of
    /// partial order; when several are maximal (criss-cross histories), the
    /// one with the earliest `created_at` wins, then the smallest id.
    ///
    /// # Errors
    /// Returns [`FstError::NoCommonAncestor`] if the intersection is empty,
    /// or propagates load failures.
    pub fn merge_base(&self, a: &SnapshotId, b: &SnapshotId) -> Result<SnapshotId> {
        let ancestors_a = self.ancestor_set(a)?;
        let ancestors_b = self.ancestor_set(b)?;
        let candidates: Vec<SnapshotId> =
            ancestors_a.intersection(&ancestors_b).cloned().collect();
        if candidates.is_empty() {
            return Err(FstError::NoCommonAncestor {
                a: a.to_string(),
                b: b.to_string(),
            });
        }

        // A candidate is ruled out if it is a proper ancestor of another
        // candidate.
        let mut non_maximal: HashSet<SnapshotId> = HashSet::new();
        for candidate in &candidates {
            let mut ancestors = self.ancestor_set(candidate)?;
            ancestors.remove(candidate);
            for other in &candidates {
                if other != candidate && ancestors.contains(other) {
                    non_maximal.insert(other.clone());
                }
            }
        }

        let mut best: Option<(String, SnapshotId)> = None;
        for candidate in candidates {
            if non_maximal.contains(&candidate) {
                continue;
            }
            let created_at = self.load_meta(&candidate)?.created_at;
            let key = (created_at, candidate);
            if best.as_ref().is_none_or(|b| key < *b) {
                best = Some(key);
            }
        }
        best.map(|(_, id)| id).ok_or_else(|| FstError::NoCommonAncestor {
            a: a.to_string(),
            b: b.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::snapshot::compute_snapshot_id;
    use tempfile::TempDir;

    fn store() -> (TempDir, SnapshotStore) {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::open(dir.path().join("snapshots"));
        (dir, store)
    }

    /// Write a snapshot with the given parents and a timestamp derived from
    /// `seq` so `created_at` ordering follows insertion order.
    fn commit(store: &SnapshotStore, seq: u32, parents: &[&SnapshotId]) -> SnapshotId {
        let manifest_hash = ContentHash::of_bytes(format!("manifest-{seq}").as_bytes());
        let parent_ids: Vec<SnapshotId> = parents.iter().map(|&p| p.clone()).collect();
        let created_at = format!("2026-01-01T00:00:{seq:02}Z");
        let id = compute_snapshot_id(&manifest_hash, &parent_ids, "Test", "t@t", &created_at);
        store
            .write_meta(&SnapshotMeta {
                id: id.clone(),
                manifest_hash,
                parent_snapshot_ids: parent_ids,
                author_name: "Test".into(),
                author_email: "t@t".into(),
                created_at,
                message: None,
                workspace_id: None,
            })
            .unwrap();
        id
    }

    #[test]
    fn write_then_load_round_trips() {
        let (_dir, store) = store();
        let id = commit(&store, 0, &[]);
        let meta = store.load_meta(&id).unwrap();
        assert_eq!(meta.id, id);
        assert!(meta.verify_id());
    }

    #[test]
    fn write_identical_record_is_noop() {
        let (_dir, store) = store();
        let id = commit(&store, 0, &[]);
        let meta = store.load_meta(&id).unwrap();
        store.write_meta(&meta).unwrap();
    }

    #[test]
    fn write_rejects_unverifiable_id() {
        let (_dir, store) = store();
        let id = commit(&store, 0, &[]);
        let mut meta = store.load_meta(&id).unwrap();
        meta.author_name = "Forged".into();
        assert!(matches!(
            store.write_meta(&meta),
            Err(FstError::Integrity { .. })
        ));
    }

    #[test]
    fn load_missing_is_not_found() {
        let (_dir, store) = store();
        let ghost = SnapshotId::from_hash(ContentHash::of_bytes(b"ghost"));
        assert!(matches!(
            store.load_meta(&ghost),
            Err(FstError::NotFound { kind: ArtifactKind::Snapshot, .. })
        ));
    }

    #[test]
    fn load_detects_tampered_record() {
        let (_dir, store) = store();
        let id = commit(&store, 0, &[]);
        let mut meta = store.load_meta(&id).unwrap();
        meta.message = Some("inserted after the fact".into());
        fs::write(store.path_of(&id), serde_json::to_vec_pretty(&meta).unwrap()).unwrap();
        assert!(matches!(store.load_meta(&id), Err(FstError::Integrity { .. })));
    }

    #[test]
    fn manifest_hash_of_returns_reference() {
        let (_dir, store) = store();
        let id = commit(&store, 7, &[]);
        assert_eq!(
            store.manifest_hash_of(&id).unwrap(),
            ContentHash::of_bytes(b"manifest-7")
        );
    }

    #[test]
    fn ancestor_set_includes_self_and_all_parents() {
        let (_dir, store) = store();
        let a = commit(&store, 0, &[]);
        let b = commit(&store, 1, &[&a]);
        let c = commit(&store, 2, &[&b]);
        let ancestors = store.ancestor_set(&c).unwrap();
        assert_eq!(ancestors.len(), 3);
        assert!(ancestors.contains(&a));
        assert!(ancestors.contains(&b));
        assert!(ancestors.contains(&c));
    }

    #[test]
    fn is_ancestor_is_proper() {
        let (_dir, store) = store();
        let a = commit(&store, 0, &[]);
        let b = commit(&store, 1, &[&a]);
        assert!(store.is_ancestor(&a, &b).unwrap());
        assert!(!store.is_ancestor(&b, &a).unwrap());
        assert!(!store.is_ancestor(&a, &a).unwrap());
    }

    // -- merge_base --

    #[test]
    fn merge_base_of_linear_chain_is_older_node() {
        let (_dir, store) = store();
        let a = commit(&store, 0, &[]);
        let b = commit(&store, 1, &[&a]);
        assert_eq!(store.merge_base(&a, &b).unwrap(), a);
        assert_eq!(store.merge_base(&b, &a).unwrap(), a);
    }

    #[test]
    fn merge_base_of_diverged_branches_is_fork_point() {
        let (_dir, store) = store();
        let root = commit(&store, 0, &[]);
        let fork = commit(&store, 1, &[&root]);
        let left = commit(&store, 2, &[&fork]);
        let right = commit(&store, 3, &[&fork]);
        assert_eq!(store.merge_base(&left, &right).unwrap(), fork);
    }

    #[test]
    fn merge_base_is_symmetric() {
        let (_dir, store) = store();
        let root = commit(&store, 0, &[]);
        let left = commit(&store, 1, &[&root]);
        let right = commit(&store, 2, &[&root]);
        assert_eq!(
            store.merge_base(&left, &right).unwrap(),
            store.merge_base(&right, &left).unwrap()
        );
    }

    #[test]
    fn merge_base_sees_through_merge_commits() {
        let (_dir, store) = store();
        let root = commit(&store, 0, &[]);
        let left = commit(&store, 1, &[&root]);
        let right = commit(&store, 2, &[&root]);
        let merged = commit(&store, 3, &[&left, &right]);
        let later = commit(&store, 4, &[&right]);
        // `right` is in both histories and is not an ancestor of any other
        // shared node closer to the tips.
        assert_eq!(store.merge_base(&merged, &later).unwrap(), right);
    }

    #[test]
    fn merge_base_criss_cross_prefers_earliest_created() {
        let (_dir, store) = store();
        let root = commit(&store, 0, &[]);
        let x = commit(&store, 1, &[&root]);
        let y = commit(&store, 2, &[&root]);
        // Criss-cross: each side merges the other, so both x and y are
        // maximal common ancestors of the two tips.
        let tip_a = commit(&store, 3, &[&x, &y]);
        let tip_b = commit(&store, 4, &[&x, &y]);
        assert_eq!(store.merge_base(&tip_a, &tip_b).unwrap(), x);
    }

    #[test]
    fn merge_base_unrelated_roots_fails() {
        let (_dir, store) = store();
        let a = commit(&store, 0, &[]);
        let b = commit(&store, 1, &[]);
        assert!(matches!(
            store.merge_base(&a, &b),
            Err(FstError::NoCommonAncestor { .. })
        ));
    }

    #[test]
    fn iter_ids_lists_snapshots() {
        let (_dir, store) = store();
        let a = commit(&store, 0, &[]);
        let b = commit(&store, 1, &[&a]);
        let mut ids: Vec<SnapshotId> = store.iter_ids().collect();
        ids.sort();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(ids, expected);
    }
}
