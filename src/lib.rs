//! fst core: content-addressed snapshots and multi-workspace coordination.
//!
//! The engine records immutable snapshots of a working tree into a shared,
//! content-addressed project store, computes three-way differences between
//! snapshot histories, applies merges and partial restores to live trees,
//! and coordinates concurrent access through advisory file locks.
//!
//! Upper layers (CLI, HTTP) consume the [`Workspace`] handle; everything
//! else is plumbing underneath it.

pub mod error;
pub mod gc;
pub mod lock;
pub mod merge;
pub mod model;
pub mod store;
pub mod workspace;

pub use error::{FstError, Result};
pub use merge::{MergeAction, MergePlan};
pub use workspace::{
    ConflictMode, DriftOptions, DriftResult, MergeOptions, MergeResult, RestoreOptions,
    RestoreResult, RollbackOptions, SnapshotOptions, SnapshotResult, Workspace, fork_workspace,
    init_project,
};
