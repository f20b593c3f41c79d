//! Materialized tree scanning, diffing and syncing.
//!
//! Paths are compared by content digest. `.git` directories are never
//! scanned, copied or removed, and symlinks are skipped so a tree can never
//! pull in files from outside its root.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::domain::value_objects::{ChangeKind, FileChange};

const GIT_DIR: &str = ".git";

/// Relative path (with `/` separators) to SHA-256 of contents.
pub type TreeIndex = BTreeMap<String, [u8; 32]>;

/// Differences from a target tree to a source tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeDiff {
    /// Sorted by path
    pub changes: Vec<FileChange>,
    pub unchanged: usize,
}

impl TreeDiff {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Counters from [`sync_tree`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    pub written: usize,
    pub removed: usize,
    pub unchanged: usize,
}

/// Digest every regular file under `root`. A missing root is an empty tree.
pub fn scan_tree(root: &Path) -> io::Result<TreeIndex> {
    let mut index = TreeIndex::new();
    if !root.exists() {
        return Ok(index);
    }

    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || e.file_name() != GIT_DIR);

    for entry in walker {
        let entry = entry.map_err(io::Error::from)?;
        let file_type = entry.file_type();
        if file_type.is_symlink() {
            tracing::debug!(path = %entry.path().display(), "Skipping symlink");
            continue;
        }
        if !file_type.is_file() {
            continue;
        }
        let Some(key) = relative_key(root, entry.path()) else {
            tracing::warn!(path = %entry.path().display(), "Skipping non UTF-8 path");
            continue;
        };
        index.insert(key, digest_file(entry.path())?);
    }
    Ok(index)
}

/// Like [`scan_tree`], but a missing root is `NotFound`.
pub fn scan_source(root: &Path) -> io::Result<TreeIndex> {
    if !fs::metadata(root)?.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} is not a directory", root.display()),
        ));
    }
    scan_tree(root)
}

/// What would change in `target` if it were made identical to `source`.
pub fn diff_trees(source: &Path, target: &Path) -> io::Result<TreeDiff> {
    let source_index = scan_source(source)?;
    let target_index = scan_tree(target)?;
    Ok(diff_indexes(&source_index, &target_index))
}

pub fn diff_indexes(source: &TreeIndex, target: &TreeIndex) -> TreeDiff {
    let mut diff = TreeDiff::default();
    for (path, digest) in source {
        match target.get(path) {
            None => diff.changes.push(FileChange {
                path: path.clone(),
                kind: ChangeKind::Added,
            }),
            Some(existing) if existing != digest => diff.changes.push(FileChange {
                path: path.clone(),
                kind: ChangeKind::Modified,
            }),
            Some(_) => diff.unchanged += 1,
        }
    }
    for path in target.keys() {
        if !source.contains_key(path) {
            diff.changes.push(FileChange {
                path: path.clone(),
                kind: ChangeKind::Removed,
            });
        }
    }
    diff.changes.sort();
    diff
}

/// Make `target` (excluding its `.git`) identical to `source`.
///
/// Only changed files are written, so unchanged files keep their mtime.
/// Directories left empty by removals are pruned.
pub fn sync_tree(source: &Path, target: &Path) -> io::Result<SyncStats> {
    fs::create_dir_all(target)?;
    let diff = diff_trees(source, target)?;
    let mut stats = SyncStats {
        unchanged: diff.unchanged,
        ..Default::default()
    };

    // Removals first: a path may turn from a directory into a file.
    for change in diff.changes.iter().filter(|c| c.kind == ChangeKind::Removed) {
        fs::remove_file(target.join(key_to_path(&change.path)))?;
        stats.removed += 1;
    }
    if stats.removed > 0 {
        prune_empty_dirs(target)?;
    }

    for change in diff.changes.iter().filter(|c| c.kind != ChangeKind::Removed) {
        let rel = key_to_path(&change.path);
        let dest = target.join(&rel);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(source.join(&rel), &dest)?;
        stats.written += 1;
    }
    Ok(stats)
}

fn prune_empty_dirs(root: &Path) -> io::Result<()> {
    let walker = WalkDir::new(root)
        .contents_first(true)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || e.file_name() != GIT_DIR);
    for entry in walker {
        let entry = entry.map_err(io::Error::from)?;
        if entry.depth() == 0 || !entry.file_type().is_dir() {
            continue;
        }
        if fs::read_dir(entry.path())?.next().is_none() {
            fs::remove_dir(entry.path())?;
        }
    }
    Ok(())
}

fn digest_file(path: &Path) -> io::Result<[u8; 32]> {
    let bytes = fs::read(path)?;
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(&bytes));
    Ok(out)
}

fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Option<Vec<&str>> = rel.components().map(|c| c.as_os_str().to_str()).collect();
    Some(parts?.join("/"))
}

fn key_to_path(key: &str) -> PathBuf {
    key.split('/').collect()
}
