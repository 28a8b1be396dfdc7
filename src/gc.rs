//! Garbage collection: sweep unreferenced blobs and manifests.
//!
//! GC acquires the project's GC rendezvous lock **exclusively**, blocking
//! until every open workspace (a shared holder) has closed. No workspace can
//! open while the sweep runs, so reachability is stable for its duration.
//!
//! Reachability is rooted at the snapshot records: every manifest referenced
//! by a snapshot is live, and every blob referenced by a live manifest is
//! live. Snapshot metas themselves are never collected. Anything else in the
//! blob and manifest stores (interrupted snapshots, abandoned scans) is
//! swept.

use std::collections::HashSet;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::lock::LockGuard;
use crate::model::types::ContentHash;
use crate::store::ProjectStore;

// ---------------------------------------------------------------------------
// GcReport
// ---------------------------------------------------------------------------

/// Outcome of one garbage-collection pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GcReport {
    /// Unreferenced blobs deleted.
    pub blobs_removed: usize,
    /// Unreferenced manifests deleted.
    pub manifests_removed: usize,
    /// Total bytes reclaimed.
    pub bytes_freed: u64,
}

// ---------------------------------------------------------------------------
// collect_garbage
// ---------------------------------------------------------------------------

/// Run a full mark-and-sweep over the project store at `project_root`.
///
/// Blocks until all open workspaces release the shared GC lock.
///
/// # Errors
/// Fails if the project is not initialized, the lock cannot be taken, or a
/// store walk fails. Individual deletions that fail are logged and skipped;
/// a blob that survives a failed delete is simply collected next time.
pub fn collect_garbage(project_root: &Path) -> Result<GcReport> {
    let store = ProjectStore::open(project_root)?;
    let _guard = LockGuard::acquire_exclusive_blocking(&store.layout().gc_lock_file())?;

    // Mark: every manifest and blob reachable from any snapshot.
    let mut live_manifests: HashSet<ContentHash> = HashSet::new();
    let mut live_blobs: HashSet<ContentHash> = HashSet::new();
    for id in store.snapshots().iter_ids() {
        let meta = store.snapshots().load_meta(&id)?;
        if live_manifests.insert(meta.manifest_hash.clone()) {
            let manifest = store.manifests().load(&meta.manifest_hash)?;
            for entry in &manifest.files {
                if let Some(hash) = &entry.hash {
                    live_blobs.insert(hash.clone());
                }
            }
        }
    }
    debug!(
        manifests = live_manifests.len(),
        blobs = live_blobs.len(),
        "gc mark complete"
    );

    // Sweep. Hashes are collected before deleting so the walk never
    // observes its own removals.
    let mut report = GcReport::default();
    let dead_blobs: Vec<ContentHash> = store
        .blobs()
        .iter_hashes()
        .filter(|h| !live_blobs.contains(h))
        .collect();
    for hash in dead_blobs {
        match store.blobs().remove(&hash) {
            Ok(size) => {
                report.blobs_removed += 1;
                report.bytes_freed += size;
            }
            Err(e) => warn!(hash = %hash, error = %e, "gc could not remove blob"),
        }
    }
    let dead_manifests: Vec<ContentHash> = store
        .manifests()
        .iter_hashes()
        .filter(|h| !live_manifests.contains(h))
        .collect();
    for hash in dead_manifests {
        match store.manifests().remove(&hash) {
            Ok(size) => {
                report.manifests_removed += 1;
                report.bytes_freed += size;
            }
            Err(e) => warn!(hash = %hash, error = %e, "gc could not remove manifest"),
        }
    }

    info!(
        blobs = report.blobs_removed,
        manifests = report.manifests_removed,
        bytes = report.bytes_freed,
        "gc sweep complete"
    );
    Ok(report)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::manifest::{FileEntry, Manifest};
    use crate::model::snapshot::{SnapshotMeta, compute_snapshot_id};
    use tempfile::TempDir;

    fn snapshot_tree(store: &ProjectStore, content: &str) -> (ContentHash, ContentHash) {
        let blob = store.blobs().write_bytes(content.as_bytes()).unwrap();
        let mut manifest = Manifest::new();
        manifest.files.push(FileEntry::file(
            "f.txt".into(),
            blob.clone(),
            content.len() as u64,
            0o644,
        ));
        let manifest_hash = store.manifests().write(&manifest).unwrap();
        let id = compute_snapshot_id(&manifest_hash, &[], "Test", "t@t", content);
        store
            .snapshots()
            .write_meta(&SnapshotMeta {
                id,
                manifest_hash: manifest_hash.clone(),
                parent_snapshot_ids: vec![],
                author_name: "Test".into(),
                author_email: "t@t".into(),
                created_at: content.to_owned(),
                message: None,
                workspace_id: None,
            })
            .unwrap();
        (blob, manifest_hash)
    }

    #[test]
    fn gc_keeps_reachable_artifacts() {
        let dir = TempDir::new().unwrap();
        let store = ProjectStore::init(dir.path()).unwrap();
        let (blob, manifest) = snapshot_tree(&store, "live");
        let report = collect_garbage(dir.path()).unwrap();
        assert_eq!(report, GcReport::default());
        assert!(store.blobs().exists(&blob));
        assert!(store.manifests().exists(&manifest));
    }

    #[test]
    fn gc_sweeps_unreferenced_artifacts() {
        let dir = TempDir::new().unwrap();
        let store = ProjectStore::init(dir.path()).unwrap();
        let (live_blob, _) = snapshot_tree(&store, "live");

        // Orphans: a blob nothing references and a manifest no snapshot
        // points at.
        let orphan_blob = store.blobs().write_bytes(b"orphan bytes").unwrap();
        let mut orphan_manifest = Manifest::new();
        orphan_manifest.files.push(FileEntry::file(
            "o.txt".into(),
            orphan_blob.clone(),
            12,
            0o644,
        ));
        let orphan_manifest_hash = store.manifests().write(&orphan_manifest).unwrap();

        let report = collect_garbage(dir.path()).unwrap();
        assert_eq!(report.blobs_removed, 1);
        assert_eq!(report.manifests_removed, 1);
        assert!(report.bytes_freed > 0);
        assert!(!store.blobs().exists(&orphan_blob));
        assert!(!store.manifests().exists(&orphan_manifest_hash));
        assert!(store.blobs().exists(&live_blob));
    }

    #[test]
    fn gc_on_empty_store_is_clean() {
        let dir = TempDir::new().unwrap();
        ProjectStore::init(dir.path()).unwrap();
        assert_eq!(collect_garbage(dir.path()).unwrap(), GcReport::default());
    }
}
