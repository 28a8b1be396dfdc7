//! Shared test helpers for fst integration tests.
//!
//! All tests use temp directories; nothing touches the host filesystem
//! outside them. Each test gets its own project via `setup_project()`, with
//! the first workspace living at the project root.

#![allow(dead_code)]

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use fst::model::types::WorkspaceName;
use fst::workspace::{SnapshotOptions, Workspace, fork_workspace, init_project};

/// Create a fresh project in a temp directory, with workspace `default`
/// at the project root. The `TempDir` must outlive the workspace.
pub fn setup_project() -> (TempDir, Workspace) {
    let dir = TempDir::new().expect("failed to create temp dir");
    let ws = init_project(dir.path(), &name("default")).expect("failed to init project");
    (dir, ws)
}

/// Fork a sibling workspace under the project root.
pub fn fork(source: &Workspace, dir_name: &str, ws_name: &str) -> Workspace {
    let dest = source.project_root().join(dir_name);
    fork_workspace(source, &dest, &name(ws_name)).expect("failed to fork workspace")
}

/// A validated workspace name.
pub fn name(s: &str) -> WorkspaceName {
    WorkspaceName::new(s).expect("invalid workspace name")
}

/// Snapshot options with the standard test author.
pub fn author(message: &str) -> SnapshotOptions {
    SnapshotOptions::new("Test", "t@t").with_message(message)
}

/// Write a file under `root`, creating parent directories.
pub fn write_file(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("failed to create parent dirs");
    }
    fs::write(path, content).expect("failed to write file");
}

/// Read a file under `root` as UTF-8.
pub fn read_file(root: &Path, rel: &str) -> String {
    fs::read_to_string(root.join(rel)).expect("failed to read file")
}
