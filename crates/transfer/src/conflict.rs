//! Destination conflicts found while planning a download.
//!
//! Every planned job gets its parent directories created up front. When a
//! regular file sits where a directory has to go, the user is asked whether
//! to delete it. A refusal rejects that path, and with it every other job
//! whose destination lies below it.

use crate::confirm::Confirm;
use crate::error::{ErrorKind, Result};
use crate::job::DownloadJob;
use exn::ResultExt;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Local paths rejected during planning.
#[derive(Debug, Default, Clone)]
pub struct ConflictSet {
    rejected: BTreeSet<PathBuf>,
}

impl ConflictSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the path was already rejected.
    pub fn reject(&mut self, path: impl Into<PathBuf>) -> bool {
        self.rejected.insert(path.into())
    }

    /// Whether `destination` or any of its ancestors has been rejected.
    pub fn rejects(&self, destination: &Path) -> bool {
        destination.ancestors().any(|ancestor| self.rejected.contains(ancestor))
    }

    pub fn len(&self) -> usize {
        self.rejected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rejected.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.rejected.iter().map(PathBuf::as_path)
    }
}

/// Jobs cleared to run, after conflict resolution.
#[derive(Debug, Default)]
pub(crate) struct Plan {
    pub jobs: Vec<DownloadJob>,
    pub conflicts: ConflictSet,
    pub skipped: usize,
}

enum Prepared {
    Ready,
    Collision(PathBuf),
}

/// Create every job's parent directories below `base`, resolving collisions
/// with existing files.
///
/// Without a `confirm` seam every collision is refused.
pub(crate) async fn plan_downloads(
    jobs: Vec<DownloadJob>,
    base: &Path,
    confirm: Option<&dyn Confirm>,
) -> Result<Plan> {
    let mut plan = Plan::default();
    for job in jobs {
        if plan.conflicts.rejects(&job.destination) {
            plan.skipped += 1;
            continue;
        }
        match prepare(&job.destination, base, confirm).await? {
            Prepared::Ready => plan.jobs.push(job),
            Prepared::Collision(path) => {
                tracing::warn!(path = %path.display(), "existing file is in the way, skipping everything below it");
                plan.conflicts.reject(path);
                plan.skipped += 1;
            },
        }
    }
    Ok(plan)
}

async fn prepare(destination: &Path, base: &Path, confirm: Option<&dyn Confirm>) -> Result<Prepared> {
    let mut dirs: Vec<&Path> = destination
        .ancestors()
        .skip(1)
        .take_while(|dir| *dir != base && dir.starts_with(base))
        .collect();
    dirs.reverse();
    for dir in dirs {
        match fs::metadata(dir).await {
            Ok(metadata) if metadata.is_dir() => {},
            Ok(_) => {
                if !overwrite(dir, confirm).await {
                    return Ok(Prepared::Collision(dir.to_path_buf()));
                }
                fs::remove_file(dir).await.or_raise(|| ErrorKind::Io(dir.to_path_buf()))?;
                create_dir(dir).await?;
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => create_dir(dir).await?,
            Err(e) => return Err(e).or_raise(|| ErrorKind::Io(dir.to_path_buf())),
        }
    }
    // A directory where the file itself should go.
    if fs::metadata(destination).await.is_ok_and(|metadata| metadata.is_dir()) {
        if !overwrite(destination, confirm).await {
            return Ok(Prepared::Collision(destination.to_path_buf()));
        }
        fs::remove_dir_all(destination)
            .await
            .or_raise(|| ErrorKind::Io(destination.to_path_buf()))?;
    }
    Ok(Prepared::Ready)
}

async fn overwrite(path: &Path, confirm: Option<&dyn Confirm>) -> bool {
    match confirm {
        Some(confirm) => {
            let prompt = format!("{} already exists and is in the way. Delete it?", path.display());
            confirm.confirm(&prompt).await
        },
        None => false,
    }
}

/// Create a single directory, tolerating another worker winning the race.
pub(crate) async fn create_dir(dir: &Path) -> Result<()> {
    let Err(e) = fs::create_dir(dir).await else {
        return Ok(());
    };
    if e.kind() == std::io::ErrorKind::AlreadyExists && fs::metadata(dir).await.is_ok_and(|m| m.is_dir()) {
        return Ok(());
    }
    Err(e).or_raise(|| ErrorKind::Io(dir.to_path_buf()))
}
