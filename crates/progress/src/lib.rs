//! Shared progress reporting for concurrent transfers.
//!
//! A transfer runs many workers at once, but the terminal has exactly one
//! owner: a [`TransferStateManager`] task holding the [`ProgressBars`] and a
//! redraw [`Throttle`]. Workers talk to it through a [`ProgressHandle`] and
//! borrow a bar for the duration of one file with a [`SlotGuard`].
//!
//! ```
//! use ldata_progress::{ProgressBars, ProgressDrawTarget, Throttle, TransferStateManager, Unit};
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> ldata_progress::error::Result<()> {
//! let bars = ProgressBars::new(2, true, false, ProgressDrawTarget::hidden());
//! let progress = TransferStateManager::spawn(bars, Throttle::new(Duration::from_millis(100)));
//! progress.set_total(8, Unit::Bytes, "Downloading")?;
//!
//! let slot = progress.acquire_free_slot().await?;
//! slot.set(8, "reads.fastq");
//! slot.update(8);
//! progress.update_total_progress(8)?;
//! drop(slot);
//!
//! assert_eq!(progress.close().await?.completed, 8);
//! # Ok(())
//! # }
//! ```

mod bars;
pub mod error;
mod manager;
mod state;
mod throttle;

pub use crate::bars::ProgressBars;
pub use crate::manager::{ProgressHandle, SlotGuard, Snapshot, TransferStateManager};
pub use crate::state::{ProgressState, Slot, Unit};
pub use crate::throttle::Throttle;
pub use indicatif::ProgressDrawTarget;
use serde::{Deserialize, Serialize};

/// Which bars a transfer shows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProgressMode {
    /// Nothing is drawn.
    None,
    /// One bar per in-flight file plus the aggregate bar.
    #[default]
    PerFile,
    /// Only the aggregate bar.
    Total,
}

impl ProgressMode {
    /// Number of per-file bars for a transfer with this many workers and jobs.
    pub fn visible_slots(&self, workers: usize, jobs: usize) -> usize {
        match self {
            Self::PerFile => workers.min(jobs),
            Self::None | Self::Total => 0,
        }
    }

    pub fn shows_total(&self) -> bool {
        !matches!(self, Self::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ProgressMode::PerFile, 8, 3, 3)]
    #[case(ProgressMode::PerFile, 4, 100, 4)]
    #[case(ProgressMode::Total, 8, 3, 0)]
    #[case(ProgressMode::None, 8, 3, 0)]
    fn test_visible_slots(#[case] mode: ProgressMode, #[case] workers: usize, #[case] jobs: usize, #[case] expected: usize) {
        assert_eq!(mode.visible_slots(workers, jobs), expected);
    }
}
