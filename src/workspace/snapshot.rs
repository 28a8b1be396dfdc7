//! Snapshot operations: record the working tree into the history DAG.

use chrono::{SecondsFormat, Utc};
use tracing::debug;

use crate::error::Result;
use crate::model::snapshot::{SnapshotMeta, compute_snapshot_id};
use crate::model::types::{ContentHash, SnapshotId};

use super::{ScanOutcome, Workspace};

// ---------------------------------------------------------------------------
// Options / result
// ---------------------------------------------------------------------------

/// Options for [`Workspace::snapshot`] and [`Workspace::auto_snapshot`].
#[derive(Clone, Debug, Default)]
pub struct SnapshotOptions {
    /// Optional free-form message.
    pub message: Option<String>,
    /// Author name recorded in the snapshot.
    pub author_name: String,
    /// Author email recorded in the snapshot.
    pub author_email: String,
}

impl SnapshotOptions {
    /// Options with the given author and no message.
    #[must_use]
    pub fn new(author_name: impl Into<String>, author_email: impl Into<String>) -> Self {
        Self {
            message: None,
            author_name: author_name.into(),
            author_email: author_email.into(),
        }
    }

    /// Attach a message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// The outcome of a snapshot operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SnapshotResult {
    /// Id of the new snapshot.
    pub id: SnapshotId,
    /// Hash of the manifest it references.
    pub manifest_hash: ContentHash,
    /// Number of regular files captured.
    pub files: usize,
    /// Total bytes across captured files.
    pub size: u64,
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

impl Workspace {
    /// Record the current working tree as a new snapshot and advance the
    /// head.
    ///
    /// Parents are the pending merge parents when a merge is in progress,
    /// otherwise the current head (or none for the first snapshot). Taking a
    /// snapshot clears any pending merge state: the merge is thereby
    /// committed.
    ///
    /// # Errors
    /// Propagates scan, store, and config persistence failures.
    pub fn snapshot(&mut self, opts: &SnapshotOptions) -> Result<SnapshotResult> {
        let outcome = self.scan_working_tree(true)?;
        self.commit_scan(&outcome, opts)
    }

    /// Like [`Self::snapshot`], but declines (returning `None`) when the
    /// working tree is identical to the current head's manifest and no merge
    /// is pending.
    ///
    /// # Errors
    /// Propagates scan, store, and config persistence failures.
    pub fn auto_snapshot(&mut self, opts: &SnapshotOptions) -> Result<Option<SnapshotResult>> {
        let outcome = self.scan_working_tree(true)?;
        if self.config().pending_merge_parents.is_none()
            && let Some(head) = &self.config().current_snapshot_id
        {
            let head_manifest = self.store().snapshots().manifest_hash_of(head)?;
            if outcome.manifest.content_hash()? == head_manifest {
                debug!(workspace = %self.name(), "auto-snapshot: no changes");
                return Ok(None);
            }
        }
        self.commit_scan(&outcome, opts).map(Some)
    }

    fn commit_scan(&mut self, outcome: &ScanOutcome, opts: &SnapshotOptions) -> Result<SnapshotResult> {
        let manifest_hash = self.store().manifests().write(&outcome.manifest)?;

        // Pending merge parents win: the snapshot that follows a merge apply
        // is the merge commit, crash or no crash in between.
        let parents: Vec<SnapshotId> = match &self.config().pending_merge_parents {
            Some([current, source]) => vec![current.clone(), source.clone()],
            None => self.config().current_snapshot_id.clone().into_iter().collect(),
        };

        let created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
        let id = compute_snapshot_id(
            &manifest_hash,
            &parents,
            &opts.author_name,
            &opts.author_email,
            &created_at,
        );
        let meta = SnapshotMeta {
            id: id.clone(),
            manifest_hash: manifest_hash.clone(),
            parent_snapshot_ids: parents,
            author_name: opts.author_name.clone(),
            author_email: opts.author_email.clone(),
            created_at,
            message: opts.message.clone(),
            workspace_id: Some(self.config().workspace_id.clone()),
        };
        self.store().snapshots().write_meta(&meta)?;

        let config = self.config_mut();
        config.current_snapshot_id = Some(id.clone());
        config.pending_merge_parents = None;
        self.save_config()?;

        debug!(workspace = %self.name(), id = %id, files = outcome.manifest.file_count(), "snapshot created");
        Ok(SnapshotResult {
            id,
            manifest_hash,
            files: outcome.manifest.file_count(),
            size: outcome.manifest.total_size(),
        })
    }
}
