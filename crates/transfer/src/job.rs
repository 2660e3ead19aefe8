use ldata_remote::RemotePath;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;

/// One file to fetch from a signed URL.
///
/// Identity is the (source, destination) pair; `size` is a hint for the
/// aggregate progress bar and takes no part in equality.
#[derive(Debug, Clone)]
pub struct DownloadJob {
    pub source: String,
    pub destination: PathBuf,
    pub size: Option<u64>,
}

impl DownloadJob {
    pub fn new(source: impl Into<String>, destination: impl Into<PathBuf>, size: Option<u64>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            size,
        }
    }
}

impl PartialEq for DownloadJob {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.destination == other.destination
    }
}

impl Eq for DownloadJob {}

impl Hash for DownloadJob {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.source.hash(state);
        self.destination.hash(state);
    }
}

/// One local file to push to a remote path.
#[derive(Debug, Clone)]
pub struct UploadJob {
    pub source: PathBuf,
    pub destination: RemotePath,
    pub size: u64,
}

impl UploadJob {
    pub fn new(source: impl Into<PathBuf>, destination: RemotePath, size: u64) -> Self {
        Self {
            source: source.into(),
            destination,
            size,
        }
    }
}

impl PartialEq for UploadJob {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.destination.to_string() == other.destination.to_string()
    }
}

impl Eq for UploadJob {}

impl Hash for UploadJob {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.source.hash(state);
        self.destination.to_string().hash(state);
    }
}

/// Drop repeated jobs, keeping the first occurrence of each.
pub fn dedupe<J: Eq + Hash + Clone>(jobs: impl IntoIterator<Item = J>) -> Vec<J> {
    let mut seen = HashSet::new();
    jobs.into_iter().filter(|job| seen.insert(job.clone())).collect()
}

/// Keep only the first job writing to each destination. Returns the kept
/// jobs and how many were dropped.
/// Distinct remote keys can normalise to the same local path.
pub(crate) fn claim_destinations(jobs: Vec<DownloadJob>) -> (Vec<DownloadJob>, usize) {
    let mut claimed = HashSet::new();
    let mut dropped = 0;
    let jobs = jobs
        .into_iter()
        .filter(|job| {
            let fresh = claimed.insert(job.destination.clone());
            if !fresh {
                tracing::warn!(path = %job.destination.display(), "destination already claimed by another file, skipping");
                dropped += 1;
            }
            fresh
        })
        .collect();
    (jobs, dropped)
}
