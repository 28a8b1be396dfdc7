//! Working-tree scanning: from files on disk to a manifest.
//!
//! A scan walks the workspace root (skipping `.fst` metadata directories),
//! hashes file contents, and composes a [`Manifest`]. When a blob store is
//! supplied, file bytes are written into it as they are hashed, which is the
//! snapshot path; without one the scan only computes hashes, which is how
//! dirty-state checks stay read-only.
//!
//! The stat cache short-circuits hashing for files whose (size, mtime) are
//! unchanged since the previous scan. Cache entries are revalidated against
//! the blob store in write mode, so a garbage-collected blob is simply
//! rewritten rather than trusted.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::Result;
use crate::model::layout::{CONFIG_FILE, FST_DIR};
use crate::model::manifest::{FileEntry, Manifest, SymlinkEntry};
use crate::model::types::ContentHash;
use crate::store::BlobStore;

use super::stat_cache::{Mtime, StatCache};

// ---------------------------------------------------------------------------
// ScanOutcome
// ---------------------------------------------------------------------------

/// The result of one working-tree scan.
#[derive(Clone, Debug)]
pub struct ScanOutcome {
    /// The manifest describing the tree as scanned.
    pub manifest: Manifest,
    /// Files whose bytes were (re)hashed.
    pub hashed: usize,
    /// Files served from the stat cache.
    pub reused: usize,
}

// ---------------------------------------------------------------------------
// scan_tree
// ---------------------------------------------------------------------------

/// Scan the tree rooted at `root` into a manifest.
///
/// With `blobs` supplied, every file's bytes end up in the blob store;
/// without it the scan is read-only. `cache` is consulted and refreshed
/// either way, but persisting it is the caller's concern.
///
/// # Errors
/// Returns an I/O error if the walk or a file read fails.
pub fn scan_tree(
    root: &Path,
    blobs: Option<&BlobStore>,
    cache: &mut StatCache,
) -> Result<ScanOutcome> {
    let mut manifest = Manifest::new();
    let mut hashed = 0usize;
    let mut reused = 0usize;
    let mut seen_files: BTreeSet<String> = BTreeSet::new();

    let walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| {
            // Skip `.fst` metadata and any nested sibling workspace root
            // (a directory carrying its own workspace config).
            e.depth() == 0
                || (e.file_name() != FST_DIR
                    && !(e.file_type().is_dir()
                        && e.path().join(FST_DIR).join(CONFIG_FILE).is_file()))
        });

    for entry in walker {
        let entry = entry.map_err(|e| {
            std::io::Error::other(format!("walking {}: {e}", root.display()))
        })?;
        let Some(rel) = relative_path(root, entry.path()) else {
            warn!(path = %entry.path().display(), "skipping non-UTF-8 path");
            continue;
        };

        let file_type = entry.file_type();
        if file_type.is_dir() {
            manifest.files.push(FileEntry::dir(rel));
        } else if file_type.is_symlink() {
            let target = fs::read_link(entry.path())?;
            let Some(target) = target.to_str() else {
                warn!(path = %entry.path().display(), "skipping symlink with non-UTF-8 target");
                continue;
            };
            manifest.symlinks.push(SymlinkEntry {
                path: rel,
                target: target.to_owned(),
                mode: 0,
            });
        } else if file_type.is_file() {
            let meta = entry.metadata().map_err(|e| {
                std::io::Error::other(format!("stat {}: {e}", entry.path().display()))
            })?;
            let size = meta.len();
            let mode = mode_bits(&meta);
            let mtime = meta.modified().ok().and_then(Mtime::from_system_time);

            let cached = mtime.and_then(|m| cache.lookup(&rel, size, m).cloned());
            let hash = match cached {
                // In write mode a cached hash is only trusted if the blob is
                // still present; a swept blob forces a rehash.
                Some(hash) if blobs.is_none_or(|b| b.exists(&hash)) => {
                    reused += 1;
                    hash
                }
                _ => {
                    let bytes = fs::read(entry.path())?;
                    let hash = match blobs {
                        Some(store) => store.write_bytes(&bytes)?,
                        None => ContentHash::of_bytes(&bytes),
                    };
                    hashed += 1;
                    if let Some(m) = mtime {
                        cache.record(rel.clone(), size, m, hash.clone());
                    }
                    hash
                }
            };

            seen_files.insert(rel.clone());
            manifest.files.push(FileEntry::file(rel, hash, size, mode));
        }
        // Sockets, fifos, and other special files are not tracked.
    }

    cache.retain_paths(&seen_files);
    manifest.sort();
    debug!(
        files = manifest.file_count(),
        hashed, reused, "working tree scanned"
    );
    Ok(ScanOutcome {
        manifest,
        hashed,
        reused,
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// The workspace-relative forward-slash path of `abs`, or `None` if any
/// component is not UTF-8.
fn relative_path(root: &Path, abs: &Path) -> Option<String> {
    let rel = abs.strip_prefix(root).ok()?;
    let mut out = String::new();
    for component in rel.components() {
        if !out.is_empty() {
            out.push('/');
        }
        out.push_str(component.as_os_str().to_str()?);
    }
    Some(out)
}

#[cfg(unix)]
fn mode_bits(meta: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn mode_bits(_meta: &fs::Metadata) -> u32 {
    0
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
