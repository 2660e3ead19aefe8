use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::path::{Path, PathBuf};
use tokio::fs::{self, DirEntry};

/// A regular file found below the walk root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LocalFile {
    pub path: PathBuf,
    /// Path relative to the walk root.
    pub relative: PathBuf,
    pub size: u64,
}

/// Everything found below a local directory.
#[derive(Debug, Default)]
pub(crate) struct Walk {
    pub files: Vec<LocalFile>,
    /// Symlinks and special files, which are never uploaded.
    pub skipped: usize,
}

enum WalkEntry {
    File(LocalFile),
    Descend(PathBuf),
    Skip,
}

/// Recursively list regular files below `root`, sorted by relative path.
///
/// Symlinks are not followed: a link to a directory could loop, and a link to
/// a file would upload content from outside the tree.
pub(crate) async fn walk(root: &Path) -> Result<Walk> {
    let mut walk = Walk::default();
    let mut stack = vec![root.to_path_buf()];
    while let Some(current) = stack.pop() {
        let mut entries = fs::read_dir(&current).await.or_raise(|| ErrorKind::InvalidSource(current.clone()))?;
        while let Some(entry) = entries.next_entry().await.or_raise(|| ErrorKind::InvalidSource(current.clone()))? {
            match process_entry(root, entry).await? {
                WalkEntry::File(file) => walk.files.push(file),
                WalkEntry::Descend(dir) => stack.push(dir),
                WalkEntry::Skip => walk.skipped += 1,
            }
        }
    }
    walk.files.sort_by(|a, b| a.relative.cmp(&b.relative));
    Ok(walk)
}

async fn process_entry(root: &Path, entry: DirEntry) -> Result<WalkEntry> {
    let path = entry.path();
    // `DirEntry::file_type` does not traverse symlinks.
    let file_type = entry.file_type().await.or_raise(|| ErrorKind::InvalidSource(path.clone()))?;
    if file_type.is_dir() {
        return Ok(WalkEntry::Descend(path));
    }
    if !file_type.is_file() {
        tracing::warn!(path = %path.display(), "not a regular file, skipping");
        return Ok(WalkEntry::Skip);
    }
    let size = entry.metadata().await.or_raise(|| ErrorKind::InvalidSource(path.clone()))?.len();
    let relative = path
        .strip_prefix(root)
        .or_raise(|| ErrorKind::InvalidSource(path.clone()))?
        .to_path_buf();
    Ok(WalkEntry::File(LocalFile { path, relative, size }))
}
