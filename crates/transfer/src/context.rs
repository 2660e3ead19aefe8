use crate::confirm::{Confirm, TerminalConfirm};
use crate::summary::TransferSummary;
use crate::transport::TransportHandle;
use ldata_progress::{
    ProgressBars, ProgressDrawTarget, ProgressHandle, ProgressMode, Snapshot, Throttle, TransferStateManager,
};
use ldata_remote::RemoteHandle;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

pub const MIB: u64 = 1024 * 1024;
/// Smallest part object storage accepts in a multipart upload (except the
/// last one).
pub const MIN_PART_SIZE: u64 = 5 * MIB;
/// Most parts object storage accepts in a multipart upload.
pub const MAX_PARTS: u64 = 10_000;

/// Tuning knobs of the transfer engines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Files transferred at once.
    pub workers: usize,
    /// Bytes buffered per local write during a download.
    pub chunk_size: u64,
    /// Preferred multipart part size. Raised automatically for files that
    /// would otherwise need more than [`MAX_PARTS`] parts.
    pub part_size: u64,
    /// Files larger than this are uploaded in parts.
    pub multipart_threshold: u64,
    /// Upper bound on per-file bars. Defaults to `workers`.
    pub max_slots: Option<usize>,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism().map_or(4, |n| n.get()),
            chunk_size: 5 * MIB,
            part_size: MIN_PART_SIZE,
            multipart_threshold: 5 * MIB,
            max_slots: None,
        }
    }
}

/// Per-call switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Options {
    pub progress: ProgressMode,
    /// Ask before deleting local files that are in the way. Without it,
    /// anything in the way is skipped.
    pub confirm_overwrite: bool,
    /// Print a line per file as it starts and finishes.
    pub verbose: bool,
}

impl Options {
    /// Whether the closing summary line is printed.
    pub(crate) fn shows_summary(&self) -> bool {
        self.progress != ProgressMode::None || self.verbose
    }
}

/// Result of a transfer: where things ended up, and how much moved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutcome<D> {
    pub destination: D,
    pub summary: TransferSummary,
    /// Final state of the progress display.
    pub progress: Snapshot,
}

/// Everything a transfer needs besides its source and destination.
#[derive(Clone)]
pub struct TransferContext {
    pub remote: RemoteHandle,
    pub transport: TransportHandle,
    pub confirm: Arc<dyn Confirm>,
    pub config: TransferConfig,
    /// Minimum time between two redraws of the progress bars.
    pub refresh: Duration,
}

impl TransferContext {
    pub fn new(remote: RemoteHandle, transport: TransportHandle) -> Self {
        Self {
            remote,
            transport,
            confirm: Arc::new(TerminalConfirm),
            config: TransferConfig::default(),
            refresh: Duration::from_millis(100),
        }
    }

    pub fn with_config(mut self, config: TransferConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_confirm(mut self, confirm: Arc<dyn Confirm>) -> Self {
        self.confirm = confirm;
        self
    }

    pub fn with_refresh(mut self, refresh: Duration) -> Self {
        self.refresh = refresh;
        self
    }

    pub(crate) fn workers(&self) -> usize {
        self.config.workers.max(1)
    }

    /// Spin up the progress manager for `jobs` confirmed jobs.
    pub(crate) fn start_progress(&self, options: &Options, jobs: usize) -> ProgressHandle {
        let mut slots = options.progress.visible_slots(self.workers(), jobs);
        if let Some(max) = self.config.max_slots {
            slots = slots.min(max);
        }
        let target = match options.progress {
            ProgressMode::None => ProgressDrawTarget::hidden(),
            ProgressMode::PerFile | ProgressMode::Total => ProgressDrawTarget::stdout(),
        };
        let bars = ProgressBars::new(slots, options.progress.shows_total(), options.verbose, target);
        TransferStateManager::spawn(bars, Throttle::new(self.refresh))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = TransferConfig::default();
        assert!(config.workers >= 1);
        assert_eq!(config.chunk_size, 5 * MIB);
        assert_eq!(config.part_size, MIN_PART_SIZE);
        assert_eq!(config.max_slots, None);
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: TransferConfig = serde_json::from_str(r#"{"workers": 2}"#).unwrap();
        assert_eq!(config.workers, 2);
        assert_eq!(config.multipart_threshold, 5 * MIB);
    }

    #[test]
    fn test_summary_shown_unless_silent() {
        let silent = Options {
            progress: ProgressMode::None,
            ..Default::default()
        };
        assert!(!silent.shows_summary());
        assert!(Options { verbose: true, ..silent }.shows_summary());
        assert!(Options::default().shows_summary());
    }
}
