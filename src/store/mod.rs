//! The shared project store: blobs, manifests, snapshots, and the registry.

pub mod blob;
pub mod manifest;
pub mod registry;
pub mod snapshot;

use std::path::Path;

use crate::error::{FstError, Result};
use crate::model::layout::ProjectLayout;

pub use blob::BlobStore;
pub use manifest::ManifestStore;
pub use registry::{WorkspaceInfo, WorkspaceRegistry};
pub use snapshot::SnapshotStore;

// ---------------------------------------------------------------------------
// ProjectStore
// ---------------------------------------------------------------------------

/// All store handles of one project, opened together.
///
/// The store is a passive on-disk resource: handles are cheap, hold no
/// caches, and may coexist across workspaces. Mutations are additive and
/// idempotent by content hash, which is what makes concurrent sibling
/// workspaces safe under the shared project lock.
#[derive(Clone, Debug)]
pub struct ProjectStore {
    layout: ProjectLayout,
    blobs: BlobStore,
    manifests: ManifestStore,
    snapshots: SnapshotStore,
    registry: WorkspaceRegistry,
}

impl ProjectStore {
    /// Open the store of an initialized project.
    ///
    /// # Errors
    /// Returns [`FstError::NotAWorkspace`] if `project_root` does not hold
    /// an initialized store.
    pub fn open(project_root: &Path) -> Result<Self> {
        let layout = ProjectLayout::new(project_root);
        if !layout.is_initialized() {
            return Err(FstError::NotAWorkspace {
                start: project_root.to_path_buf(),
            });
        }
        Ok(Self::from_layout(layout))
    }

    /// Create the store skeleton at `project_root` and open it. Idempotent.
    ///
    /// # Errors
    /// Returns an I/O error if the directories cannot be created.
    pub fn init(project_root: &Path) -> Result<Self> {
        let layout = ProjectLayout::new(project_root);
        layout.ensure_dirs()?;
        Ok(Self::from_layout(layout))
    }

    fn from_layout(layout: ProjectLayout) -> Self {
        let blobs = BlobStore::open(layout.blobs_dir());
        let manifests = ManifestStore::open(layout.manifests_dir());
        let snapshots = SnapshotStore::open(layout.snapshots_dir());
        let registry = WorkspaceRegistry::open(layout.registry_file());
        Self {
            layout,
            blobs,
            manifests,
            snapshots,
            registry,
        }
    }

    /// The project layout backing this store.
    #[must_use]
    pub const fn layout(&self) -> &ProjectLayout {
        &self.layout
    }

    /// The blob store.
    #[must_use]
    pub const fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    /// The manifest store.
    #[must_use]
    pub const fn manifests(&self) -> &ManifestStore {
        &self.manifests
    }

    /// The snapshot store.
    #[must_use]
    pub const fn snapshots(&self) -> &SnapshotStore {
        &self.snapshots
    }

    /// The workspace registry.
    #[must_use]
    pub const fn registry(&self) -> &WorkspaceRegistry {
        &self.registry
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
