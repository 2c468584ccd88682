//! Source-tree discovery.
//!
//! Walks a directory into the flat list of files the engines treat as work
//! units. Hidden files and directories (dot-prefixed) are pruned: corpora
//! synced from macOS or cloud drives are full of `.DS_Store` and
//! `.sync-conflict` droppings that must never become conversion failures.
//!
//! Unreadable entries are logged and skipped rather than failing the walk —
//! one permission-denied subdirectory must not take down a batch any more
//! than one corrupt file does.

use crate::error::CorpusError;
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::{DirEntry, WalkDir};

/// A file found under the source root.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Full path to the file.
    pub path: PathBuf,
    /// Path relative to the walk root; mirrored into the destination tree.
    pub rel_path: PathBuf,
    /// Lowercased extension without the dot; empty if the file has none.
    pub extension: String,
    /// Size in bytes.
    pub size: u64,
}

/// Check if a directory entry is hidden (dot-prefixed).
fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|s| s.starts_with('.'))
        .unwrap_or(false)
}

/// Collect every visible file under `root`, sorted by relative path.
///
/// The sort gives runs a deterministic unit order regardless of directory
/// iteration order, which keeps logs, reports, and tests stable.
pub fn walk_files(root: &Path) -> Result<Vec<SourceFile>, CorpusError> {
    if !root.exists() {
        return Err(CorpusError::SourceDirMissing {
            path: root.to_path_buf(),
        });
    }
    if !root.is_dir() {
        return Err(CorpusError::SourceNotADirectory {
            path: root.to_path_buf(),
        });
    }

    let mut files = Vec::new();

    // depth 0 is the root itself: never prune it, even when the root's own
    // name is dot-prefixed (temp dirs often are).
    let walker = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e));

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path().to_path_buf();
        let rel_path = match path.strip_prefix(root) {
            Ok(r) => r.to_path_buf(),
            Err(_) => continue, // unreachable for entries under root
        };
        let size = match entry.metadata() {
            Ok(m) => m.len(),
            Err(e) => {
                warn!("Skipping '{}': cannot stat: {}", path.display(), e);
                continue;
            }
        };
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        files.push(SourceFile {
            path,
            rel_path,
            extension,
            size,
        });
    }

    files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    Ok(files)
}
