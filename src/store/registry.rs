//! Project-level workspace registry.
//!
//! A single `registry.json` at the project root maps workspace id to
//! [`WorkspaceInfo`] for every sibling workspace sharing the store. The
//! registry is advisory: per-workspace config files remain canonical, so
//! callers treat registry write failures as log-and-continue, never as a
//! reason to fail the enclosing operation.
//!
//! Read-modify-write cycles are serialized by a brief exclusive lock on a
//! sidecar file (`registry.lock`); the update itself lands via temp+rename
//! so readers never observe a torn document. The sidecar exists because the
//! rename replaces the registry's inode, which would defeat a lock on the
//! registry file itself.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write as IoWrite;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{FstError, Result};
use crate::lock::LockGuard;
use crate::model::types::WorkspaceName;

/// Registry schema version.
const REGISTRY_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// WorkspaceInfo
// ---------------------------------------------------------------------------

/// One registry entry: a workspace's identity plus its filesystem location.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceInfo {
    /// Project this workspace belongs to.
    pub project_id: String,
    /// Opaque workspace id (registry key).
    pub workspace_id: String,
    /// Human-facing workspace name.
    pub workspace_name: WorkspaceName,
    /// Absolute path of the workspace root.
    pub path: PathBuf,
}

// ---------------------------------------------------------------------------
// Persisted document
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryFile {
    version: u32,
    workspaces: BTreeMap<String, WorkspaceInfo>,
}

// ---------------------------------------------------------------------------
// WorkspaceRegistry
// ---------------------------------------------------------------------------

/// Handle to the project's `registry.json`.
#[derive(Clone, Debug)]
pub struct WorkspaceRegistry {
    file: PathBuf,
    lock_file: PathBuf,
}

impl WorkspaceRegistry {
    /// Open the registry at `file` (the `registry.json` path).
    #[must_use]
    pub fn open(file: impl Into<PathBuf>) -> Self {
        let file = file.into();
        let lock_file = file.with_extension("lock");
        Self { file, lock_file }
    }

    /// The registry file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.file
    }

    /// Register or update a workspace entry, keyed by workspace id.
    ///
    /// # Errors
    /// Returns an I/O or serialization error; callers log and continue.
    pub fn register(&self, info: &WorkspaceInfo) -> Result<()> {
        let _lock = LockGuard::acquire_exclusive_blocking(&self.lock_file)?;
        let mut doc = self.read_document()?;
        doc.workspaces.insert(info.workspace_id.clone(), info.clone());
        self.write_document(&doc)?;
        debug!(workspace = %info.workspace_name, "workspace registered");
        Ok(())
    }

    /// Remove a workspace entry by id. Returns whether an entry existed.
    ///
    /// # Errors
    /// Returns an I/O or serialization error; callers log and continue.
    pub fn remove(&self, workspace_id: &str) -> Result<bool> {
        let _lock = LockGuard::acquire_exclusive_blocking(&self.lock_file)?;
        let mut doc = self.read_document()?;
        let existed = doc.workspaces.remove(workspace_id).is_some();
        if existed {
            self.write_document(&doc)?;
        }
        Ok(existed)
    }

    /// Find a workspace entry by its human-facing name.
    ///
    /// # Errors
    /// Returns an I/O or serialization error reading the registry.
    pub fn find_by_name(&self, name: &WorkspaceName) -> Result<Option<WorkspaceInfo>> {
        let doc = self.read_document()?;
        Ok(doc
            .workspaces
            .into_values()
            .find(|info| info.workspace_name == *name))
    }

    /// All registered workspaces, ordered by workspace id.
    ///
    /// # Errors
    /// Returns an I/O or serialization error reading the registry.
    pub fn list_all(&self) -> Result<Vec<WorkspaceInfo>> {
        let doc = self.read_document()?;
        Ok(doc.workspaces.into_values().collect())
    }

    // -----------------------------------------------------------------------
    // Document I/O
    // -----------------------------------------------------------------------

    fn read_document(&self) -> Result<RegistryFile> {
        match fs::read(&self.file) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(RegistryFile {
                version: REGISTRY_VERSION,
                workspaces: BTreeMap::new(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn write_document(&self, doc: &RegistryFile) -> Result<()> {
        let parent = self.file.parent().ok_or_else(|| {
            FstError::Io(std::io::Error::other("registry file has no parent directory"))
        })?;
        fs::create_dir_all(parent)?;
        let bytes = serde_json::to_vec_pretty(doc)?;
        let mut tmp = NamedTempFile::new_in(parent)?;
        tmp.write_all(&bytes)?;
        tmp.flush()?;
        tmp.persist(&self.file).map_err(|e| FstError::Io(e.error))?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn registry() -> (TempDir, WorkspaceRegistry) {
        let dir = TempDir::new().unwrap();
        let registry = WorkspaceRegistry::open(dir.path().join(".fst/registry.json"));
        (dir, registry)
    }

    fn info(id: &str, name: &str) -> WorkspaceInfo {
        WorkspaceInfo {
            project_id: "proj-1".into(),
            workspace_id: id.into(),
            workspace_name: WorkspaceName::new(name).unwrap(),
            path: PathBuf::from(format!("/work/{name}")),
        }
    }

    #[test]
    fn register_then_list() {
        let (_dir, registry) = registry();
        registry.register(&info("w1", "default")).unwrap();
        registry.register(&info("w2", "agent-1")).unwrap();
        let all = registry.list_all().unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn register_is_idempotent_upsert() {
        let (_dir, registry) = registry();
        registry.register(&info("w1", "default")).unwrap();
        let mut moved = info("w1", "default");
        moved.path = PathBuf::from("/elsewhere");
        registry.register(&moved).unwrap();
        let all = registry.list_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].path, PathBuf::from("/elsewhere"));
    }

    #[test]
    fn find_by_name_matches() {
        let (_dir, registry) = registry();
        registry.register(&info("w1", "default")).unwrap();
        registry.register(&info("w2", "agent-1")).unwrap();
        let found = registry
            .find_by_name(&WorkspaceName::new("agent-1").unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(found.workspace_id, "w2");
        assert!(registry
            .find_by_name(&WorkspaceName::new("ghost").unwrap())
            .unwrap()
            .is_none());
    }

    #[test]
    fn remove_reports_existence() {
        let (_dir, registry) = registry();
        registry.register(&info("w1", "default")).unwrap();
        assert!(registry.remove("w1").unwrap());
        assert!(!registry.remove("w1").unwrap());
        assert!(registry.list_all().unwrap().is_empty());
    }

    #[test]
    fn missing_file_reads_as_empty() {
        let (_dir, registry) = registry();
        assert!(registry.list_all().unwrap().is_empty());
    }
}
