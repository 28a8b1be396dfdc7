//! Snapshot metadata records: the nodes of the history DAG.
//!
//! A snapshot references one manifest and zero or more parent snapshots.
//! Its id is content-addressed over the metadata fields, so every stored id
//! can be recomputed and verified. The canonical byte concatenation is fixed
//! for compatibility:
//!
//! ```text
//! manifest_hash "\n" parent_ids_joined_by_comma "\n" author_name "\n" author_email "\n" created_at
//! ```
//!
//! Parent ids are sorted ascending for id computation; the persisted record
//! preserves whatever order the caller supplied.

use serde::{Deserialize, Serialize};

use super::types::{ContentHash, SnapshotId};

// ---------------------------------------------------------------------------
// SnapshotMeta
// ---------------------------------------------------------------------------

/// The persisted metadata of one snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMeta {
    /// Content-addressed snapshot id.
    pub id: SnapshotId,

    /// Hash of the manifest describing this snapshot's tree.
    pub manifest_hash: ContentHash,

    /// Parent snapshot ids: empty for a root, two or more for a merge.
    pub parent_snapshot_ids: Vec<SnapshotId>,

    /// Author name.
    pub author_name: String,

    /// Author email.
    pub author_email: String,

    /// ISO-8601 creation timestamp.
    pub created_at: String,

    /// Optional free-form message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Id of the workspace that produced this snapshot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<String>,
}

impl SnapshotMeta {
    /// Whether this snapshot has more than one parent.
    #[must_use]
    pub fn is_merge(&self) -> bool {
        self.parent_snapshot_ids.len() >= 2
    }

    /// Recompute this snapshot's id from its own fields and compare.
    #[must_use]
    pub fn verify_id(&self) -> bool {
        compute_snapshot_id(
            &self.manifest_hash,
            &self.parent_snapshot_ids,
            &self.author_name,
            &self.author_email,
            &self.created_at,
        ) == self.id
    }
}

// ---------------------------------------------------------------------------
// Id computation
// ---------------------------------------------------------------------------

/// Compute a snapshot id from its identifying fields.
///
/// Parents are sorted ascending before joining, so the id is independent of
/// the order the caller lists them in.
#[must_use]
pub fn compute_snapshot_id(
    manifest_hash: &ContentHash,
    parent_ids: &[SnapshotId],
    author_name: &str,
    author_email: &str,
    created_at: &str,
) -> SnapshotId {
    let mut parents: Vec<&str> = parent_ids.iter().map(SnapshotId::as_str).collect();
    parents.sort_unstable();
    let canonical = format!(
        "{}\n{}\n{}\n{}\n{}",
        manifest_hash.as_str(),
        parents.join(","),
        author_name,
        author_email,
        created_at,
    );
    SnapshotId::from_hash(ContentHash::of_bytes(canonical.as_bytes()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest_hash() -> ContentHash {
        ContentHash::of_bytes(b"manifest")
    }

    fn parent(byte: u8) -> SnapshotId {
        SnapshotId::from_hash(ContentHash::of_bytes(&[byte]))
    }

    fn sample_meta() -> SnapshotMeta {
        let parents = vec![parent(1), parent(2)];
        let id = compute_snapshot_id(
            &manifest_hash(),
            &parents,
            "Test",
            "t@t",
            "2026-01-02T03:04:05Z",
        );
        SnapshotMeta {
            id,
            manifest_hash: manifest_hash(),
            parent_snapshot_ids: parents,
            author_name: "Test".into(),
            author_email: "t@t".into(),
            created_at: "2026-01-02T03:04:05Z".into(),
            message: Some("initial".into()),
            workspace_id: None,
        }
    }

    #[test]
    fn id_is_deterministic() {
        let a = compute_snapshot_id(&manifest_hash(), &[], "A", "a@a", "t");
        let b = compute_snapshot_id(&manifest_hash(), &[], "A", "a@a", "t");
        assert_eq!(a, b);
    }

    #[test]
    fn id_is_parent_order_independent() {
        let ab = compute_snapshot_id(&manifest_hash(), &[parent(1), parent(2)], "A", "a@a", "t");
        let ba = compute_snapshot_id(&manifest_hash(), &[parent(2), parent(1)], "A", "a@a", "t");
        assert_eq!(ab, ba);
    }

    #[test]
    fn id_depends_on_every_field() {
        let base = compute_snapshot_id(&manifest_hash(), &[parent(1)], "A", "a@a", "t");
        let other_manifest =
            compute_snapshot_id(&ContentHash::of_bytes(b"other"), &[parent(1)], "A", "a@a", "t");
        let other_parent = compute_snapshot_id(&manifest_hash(), &[parent(2)], "A", "a@a", "t");
        let other_author = compute_snapshot_id(&manifest_hash(), &[parent(1)], "B", "a@a", "t");
        let other_email = compute_snapshot_id(&manifest_hash(), &[parent(1)], "A", "b@b", "t");
        let other_time = compute_snapshot_id(&manifest_hash(), &[parent(1)], "A", "a@a", "t2");
        for other in [other_manifest, other_parent, other_author, other_email, other_time] {
            assert_ne!(base, other);
        }
    }

    #[test]
    fn verify_id_round_trips() {
        assert!(sample_meta().verify_id());
    }

    #[test]
    fn verify_id_detects_tampering() {
        let mut meta = sample_meta();
        meta.author_name = "Mallory".into();
        assert!(!meta.verify_id());
    }

    #[test]
    fn is_merge_requires_two_parents() {
        let mut meta = sample_meta();
        assert!(meta.is_merge());
        meta.parent_snapshot_ids.truncate(1);
        assert!(!meta.is_merge());
        meta.parent_snapshot_ids.clear();
        assert!(!meta.is_merge());
    }

    #[test]
    fn meta_serde_round_trip() {
        let meta = sample_meta();
        let json = serde_json::to_string(&meta).unwrap();
        let back: SnapshotMeta = serde_json::from_str(&json).unwrap();
        assert_eq!(meta, back);
    }

    #[test]
    fn absent_optionals_are_omitted() {
        let mut meta = sample_meta();
        meta.message = None;
        let json = serde_json::to_string(&meta).unwrap();
        assert!(!json.contains("message"));
        assert!(!json.contains("workspace_id"));
    }
}
