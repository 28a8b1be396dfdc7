//! Per-workspace configuration file.
//!
//! `config.json` under a workspace's `.fst` directory is the canonical
//! record of that workspace's identity and head. Every write is atomic
//! (write-to-temp + rename) so a crash never leaves a torn config.
//!
//! `pending_merge_parents` is the crash-safety anchor for merges: it is
//! written before a merge mutates the working tree, so the next snapshot
//! becomes a merge commit even if the apply was interrupted.

use std::fs;
use std::io::Write as IoWrite;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::{FstError, Result};
use crate::model::types::{SnapshotId, WorkspaceName};

// ---------------------------------------------------------------------------
// WorkspaceConfig
// ---------------------------------------------------------------------------

/// The persisted per-workspace configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Project this workspace belongs to.
    pub project_id: String,

    /// Opaque workspace id, minted at creation.
    pub workspace_id: String,

    /// Human-facing workspace name.
    pub workspace_name: WorkspaceName,

    /// Head snapshot, absent until the first snapshot is taken.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_snapshot_id: Option<SnapshotId>,

    /// The snapshot this workspace was forked from, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_snapshot_id: Option<SnapshotId>,

    /// Present only while a merge is in progress: `[current, source]` at the
    /// time the merge began.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_merge_parents: Option<[SnapshotId; 2]>,
}

impl WorkspaceConfig {
    /// Load the config at `path`.
    ///
    /// # Errors
    /// Returns [`FstError::NotAWorkspace`] if the file is absent, or a
    /// serialization error if it does not parse.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(FstError::NotAWorkspace {
                    start: path.to_path_buf(),
                });
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Persist the config to `path` atomically.
    ///
    /// # Errors
    /// Returns an I/O or serialization error.
    pub fn save(&self, path: &Path) -> Result<()> {
        let parent = path.parent().ok_or_else(|| {
            FstError::Io(std::io::Error::other("config path has no parent directory"))
        })?;
        fs::create_dir_all(parent)?;
        let bytes = serde_json::to_vec_pretty(self)?;
        let mut tmp = NamedTempFile::new_in(parent)?;
        tmp.write_all(&bytes)?;
        tmp.flush()?;
        tmp.persist(path).map_err(|e| FstError::Io(e.error))?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::types::ContentHash;
    use tempfile::TempDir;

    fn snap(byte: u8) -> SnapshotId {
        SnapshotId::from_hash(ContentHash::of_bytes(&[byte]))
    }

    fn sample() -> WorkspaceConfig {
        WorkspaceConfig {
            project_id: "p1".into(),
            workspace_id: "w1".into(),
            workspace_name: WorkspaceName::new("default").unwrap(),
            current_snapshot_id: Some(snap(1)),
            base_snapshot_id: None,
            pending_merge_parents: None,
        }
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".fst/config.json");
        let config = sample();
        config.save(&path).unwrap();
        assert_eq!(WorkspaceConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn load_missing_is_not_a_workspace() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".fst/config.json");
        assert!(matches!(
            WorkspaceConfig::load(&path),
            Err(FstError::NotAWorkspace { .. })
        ));
    }

    #[test]
    fn load_garbage_is_serialize_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, b"not json").unwrap();
        assert!(matches!(
            WorkspaceConfig::load(&path),
            Err(FstError::Serialize(_))
        ));
    }

    #[test]
    fn pending_merge_parents_survive_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        let mut config = sample();
        config.pending_merge_parents = Some([snap(2), snap(3)]);
        config.save(&path).unwrap();
        let loaded = WorkspaceConfig::load(&path).unwrap();
        assert_eq!(loaded.pending_merge_parents, Some([snap(2), snap(3)]));
    }

    #[test]
    fn absent_optionals_are_omitted_from_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        let mut config = sample();
        config.current_snapshot_id = None;
        config.save(&path).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(!text.contains("current_snapshot_id"));
        assert!(!text.contains("pending_merge_parents"));
    }

    #[test]
    fn save_overwrites_atomically() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        let mut config = sample();
        config.save(&path).unwrap();
        config.current_snapshot_id = Some(snap(9));
        config.save(&path).unwrap();
        assert_eq!(
            WorkspaceConfig::load(&path).unwrap().current_snapshot_id,
            Some(snap(9))
        );
    }
}
