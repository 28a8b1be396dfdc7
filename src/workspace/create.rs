//! Project initialization and sibling-workspace forking.
//!
//! `init_project` lays down the shared store skeleton and the first
//! workspace (which may live at the project root itself). `fork_workspace`
//! creates a sibling under the same project root: it shares the store,
//! starts from the source workspace's head snapshot, and gets that head
//! materialized into its directory.

use std::fs;
use std::path::Path;

use tracing::{debug, warn};

use crate::error::{FstError, Result};
use crate::model::layout::{WorkspaceLayout, find_workspace_root};
use crate::model::manifest::EntryKind;
use crate::model::types::{WorkspaceName, mint_id};
use crate::store::ProjectStore;

use super::config::WorkspaceConfig;
use super::{Workspace, write_tree_file, write_tree_symlink};

// ---------------------------------------------------------------------------
// init_project
// ---------------------------------------------------------------------------

/// Initialize a new project at `root` with its first workspace.
///
/// Creates the store directories (`blobs/`, `manifests/`, `snapshots/`),
/// the project lock files, and the workspace config, then opens the
/// workspace.
///
/// # Errors
/// Returns [`FstError::AlreadyAWorkspace`] if `root` already carries a
/// workspace config, or I/O errors creating the skeleton.
pub fn init_project(root: &Path, name: &WorkspaceName) -> Result<Workspace> {
    let layout = WorkspaceLayout::new(root);
    if layout.has_config() {
        return Err(FstError::AlreadyAWorkspace {
            root: root.to_path_buf(),
        });
    }

    let store = ProjectStore::init(root)?;
    // The lock files are part of the documented layout; create them eagerly
    // so `ls .fst` shows the full shape even before first contention.
    touch(&store.layout().gc_lock_file())?;
    touch(&store.layout().backend_lock_file())?;

    let config = WorkspaceConfig {
        project_id: mint_id(),
        workspace_id: mint_id(),
        workspace_name: name.clone(),
        current_snapshot_id: None,
        base_snapshot_id: None,
        pending_merge_parents: None,
    };
    config.save(&layout.config_file())?;

    debug!(root = %root.display(), workspace = %name, "project initialized");
    Workspace::open(root)
}

// ---------------------------------------------------------------------------
// fork_workspace
// ---------------------------------------------------------------------------

/// Create a sibling workspace of `source` at `dest_root`.
///
/// The sibling shares the project store, records the source's head as its
/// `base_snapshot_id` (and initial head), and gets that snapshot's tree
/// materialized into its directory. The new workspace is registered and
/// opened.
///
/// # Errors
/// Returns [`FstError::AlreadyAWorkspace`] if `dest_root` is already a
/// workspace or nested inside a sibling (other than the project root), or
/// an I/O error if `dest_root` is outside the project root.
pub fn fork_workspace(
    source: &Workspace,
    dest_root: &Path,
    name: &WorkspaceName,
) -> Result<Workspace> {
    if !dest_root.starts_with(source.project_root()) {
        return Err(FstError::Io(std::io::Error::other(format!(
            "fork destination '{}' must live under the project root '{}'",
            dest_root.display(),
            source.project_root().display()
        ))));
    }
    let dest_layout = WorkspaceLayout::new(dest_root);
    if dest_layout.has_config() {
        return Err(FstError::AlreadyAWorkspace {
            root: dest_root.to_path_buf(),
        });
    }
    // A destination nested inside a sibling workspace (not the project-root
    // workspace) would be scanned by that sibling before its own config
    // exists; refuse.
    if let Some(parent) = dest_root.parent()
        && let Some(enclosing) = find_workspace_root(parent)
        && enclosing != source.project_root()
    {
        return Err(FstError::AlreadyAWorkspace { root: enclosing });
    }

    fs::create_dir_all(dest_root)?;
    let head = source.config().current_snapshot_id.clone();
    let config = WorkspaceConfig {
        project_id: source.config().project_id.clone(),
        workspace_id: mint_id(),
        workspace_name: name.clone(),
        current_snapshot_id: head.clone(),
        base_snapshot_id: head.clone(),
        pending_merge_parents: None,
    };
    // Config lands before the tree so sibling scans exclude this directory
    // from the first moment it has content.
    config.save(&dest_layout.config_file())?;

    if let Some(head) = &head {
        materialize_snapshot(source, dest_root, head)?;
    }

    debug!(
        source = %source.name(),
        dest = %dest_root.display(),
        workspace = %name,
        "workspace forked"
    );
    Workspace::open(dest_root)
}

/// Write the full tree of `snapshot` into `dest_root`.
fn materialize_snapshot(source: &Workspace, dest_root: &Path, snapshot: &crate::model::types::SnapshotId) -> Result<()> {
    let manifest_hash = source.store().snapshots().manifest_hash_of(snapshot)?;
    let manifest = source.store().manifests().load(&manifest_hash)?;
    for entry in &manifest.files {
        match entry.kind {
            EntryKind::Dir => fs::create_dir_all(dest_root.join(&entry.path))?,
            EntryKind::File => {
                let Some(hash) = &entry.hash else { continue };
                let bytes = source.store().blobs().read(hash)?;
                write_tree_file(dest_root, &entry.path, &bytes, entry.effective_mode())?;
            }
            EntryKind::Symlink => {}
        }
    }
    for link in &manifest.symlinks {
        if let Err(e) = write_tree_symlink(dest_root, &link.path, &link.target) {
            warn!(path = %link.path, error = %e, "fork could not recreate symlink");
        }
    }
    Ok(())
}

fn touch(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::File::create(path)?;
    }
    Ok(())
}
