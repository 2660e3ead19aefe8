//! Actor owning the progress display.
//!
//! Workers never touch [`ProgressBars`] directly. They hold a cloneable
//! [`ProgressHandle`] that sends commands over an unbounded channel to a
//! single task, so every mutation is applied in order by one owner and
//! redraws can be throttled in one place.

use crate::bars::ProgressBars;
use crate::error::{ErrorKind, Result};
use crate::state::Unit;
use crate::throttle::Throttle;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, mpsc, oneshot};

/// Point-in-time view of the shared counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub total: u64,
    pub completed: u64,
    pub slots_in_use: usize,
    pub redraws: usize,
    /// Lines written above the bars.
    pub lines: usize,
    pub last_line: Option<String>,
}

#[derive(Debug)]
enum Command {
    SetTotal { total: u64, unit: Unit, label: String },
    UpdateTotal { delta: u64 },
    Acquire { reply: oneshot::Sender<Option<usize>> },
    Release { slot: usize },
    Set { slot: usize, total: u64, desc: String },
    Update { slot: usize, delta: u64 },
    Write { line: String },
    Snapshot { reply: oneshot::Sender<Snapshot> },
    Close { reply: oneshot::Sender<Snapshot> },
}

/// Owner of the [`ProgressBars`] and their [`Throttle`].
pub struct TransferStateManager {
    bars: ProgressBars,
    throttle: Throttle,
    rx: mpsc::UnboundedReceiver<Command>,
}

impl TransferStateManager {
    /// Start the manager on the current runtime.
    pub fn spawn(bars: ProgressBars, throttle: Throttle) -> ProgressHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let num_slots = bars.num_slots();
        let manager = Self { bars, throttle, rx };
        tokio::spawn(manager.run());
        ProgressHandle {
            tx,
            slots: Arc::new(Semaphore::new(num_slots)),
            num_slots,
        }
    }

    async fn run(mut self) {
        while let Some(command) = self.rx.recv().await {
            match command {
                Command::Close { reply } => {
                    self.bars.finish();
                    let _ = reply.send(self.snapshot());
                    return;
                },
                command => self.handle(command),
            }
        }
        // Every handle went away without closing.
        self.bars.finish();
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::SetTotal { total, unit, label } => self.bars.set_total(total, unit, label),
            Command::UpdateTotal { delta } => self.bars.update_total_progress(delta),
            Command::Acquire { reply } => {
                let _ = reply.send(self.bars.acquire_free_slot());
            },
            Command::Release { slot } => self.bars.release_slot(slot),
            Command::Set { slot, total, desc } => self.bars.set(slot, total, desc),
            Command::Update { slot, delta } => self.bars.update(slot, delta),
            Command::Write { line } => {
                self.bars.write(&line);
                return;
            },
            Command::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
                return;
            },
            Command::Close { .. } => return,
        }
        if self.throttle.try_acquire(Instant::now()) {
            self.bars.redraw();
        }
    }

    fn snapshot(&self) -> Snapshot {
        let state = self.bars.state();
        Snapshot {
            total: state.total(),
            completed: state.completed(),
            slots_in_use: state.slots_in_use(),
            redraws: self.bars.redraws(),
            lines: self.bars.lines(),
            last_line: self.bars.last_line().map(str::to_string),
        }
    }
}

/// Cloneable access to a running [`TransferStateManager`].
#[derive(Debug, Clone)]
pub struct ProgressHandle {
    tx: mpsc::UnboundedSender<Command>,
    slots: Arc<Semaphore>,
    num_slots: usize,
}

impl ProgressHandle {
    fn send(&self, command: Command) -> Result<()> {
        self.tx.send(command).map_err(|_| exn::Exn::from(ErrorKind::Closed))
    }

    async fn request<R>(&self, build: impl FnOnce(oneshot::Sender<R>) -> Command) -> Result<R> {
        let (tx, rx) = oneshot::channel();
        self.send(build(tx))?;
        rx.await.map_err(|_| exn::Exn::from(ErrorKind::Closed))
    }

    pub fn num_slots(&self) -> usize {
        self.num_slots
    }

    pub fn set_total(&self, total: u64, unit: Unit, label: impl Into<String>) -> Result<()> {
        self.send(Command::SetTotal {
            total,
            unit,
            label: label.into(),
        })
    }

    pub fn update_total_progress(&self, delta: u64) -> Result<()> {
        self.send(Command::UpdateTotal { delta })
    }

    /// Print a line above the bars.
    pub fn write(&self, line: impl Into<String>) -> Result<()> {
        self.send(Command::Write { line: line.into() })
    }

    /// Wait for a free bar slot.
    ///
    /// Blocks while all slots are taken. With no slots configured the guard
    /// is returned immediately and simply has no bar behind it.
    pub async fn acquire_free_slot(&self) -> Result<SlotGuard> {
        if self.num_slots == 0 {
            return Ok(SlotGuard {
                slot: None,
                tx: self.tx.clone(),
                _permit: None,
            });
        }
        let permit = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|_| exn::Exn::from(ErrorKind::Closed))?;
        let slot = self.request(|reply| Command::Acquire { reply }).await?;
        if slot.is_none() {
            tracing::warn!("no free progress slot despite holding a permit");
        }
        Ok(SlotGuard {
            slot,
            tx: self.tx.clone(),
            _permit: Some(permit),
        })
    }

    pub async fn snapshot(&self) -> Result<Snapshot> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    /// Flush the final state and stop the manager.
    ///
    /// Other clones of this handle fail with [`ErrorKind::Closed`] afterwards.
    pub async fn close(&self) -> Result<Snapshot> {
        let snapshot = self.request(|reply| Command::Close { reply }).await?;
        self.slots.close();
        Ok(snapshot)
    }
}

/// A claimed bar slot, released when dropped.
///
/// Dropping the guard is the only way to give a slot back, so a job that
/// fails or is aborted mid-transfer frees its slot all the same.
#[derive(Debug)]
pub struct SlotGuard {
    slot: Option<usize>,
    tx: mpsc::UnboundedSender<Command>,
    // Released after the `Release` command is queued.
    _permit: Option<OwnedSemaphorePermit>,
}

impl SlotGuard {
    pub fn slot(&self) -> Option<usize> {
        self.slot
    }

    /// Point this slot's bar at a new file.
    pub fn set(&self, total: u64, desc: impl Into<String>) {
        if let Some(slot) = self.slot {
            let _ = self.tx.send(Command::Set {
                slot,
                total,
                desc: desc.into(),
            });
        }
    }

    pub fn update(&self, delta: u64) {
        if let Some(slot) = self.slot {
            let _ = self.tx.send(Command::Update { slot, delta });
        }
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            let _ = self.tx.send(Command::Release { slot });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indicatif::ProgressDrawTarget;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::time::Duration;

    fn spawn(num_slots: usize, refresh: Duration) -> ProgressHandle {
        let bars = ProgressBars::new(num_slots, true, false, ProgressDrawTarget::hidden());
        TransferStateManager::spawn(bars, Throttle::new(refresh))
    }

    #[tokio::test]
    async fn test_completed_reaches_total() {
        let progress = spawn(2, Duration::ZERO);
        progress.set_total(30, Unit::Bytes, "Total").unwrap();
        for _ in 0..3 {
            progress.update_total_progress(10).unwrap();
        }
        let snapshot = progress.close().await.unwrap();
        assert_eq!(snapshot.completed, 30);
        assert_eq!(snapshot.total, 30);
    }

    #[tokio::test]
    async fn test_written_lines_are_counted() {
        let progress = spawn(0, Duration::ZERO);
        progress.write("first").unwrap();
        progress.write("second").unwrap();
        let snapshot = progress.close().await.unwrap();
        assert_eq!(snapshot.lines, 2);
        assert_eq!(snapshot.last_line.as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn test_redraws_are_throttled_but_counts_are_not() {
        let progress = spawn(1, Duration::from_secs(3600));
        progress.set_total(1000, Unit::Bytes, "Total").unwrap();
        for _ in 0..100 {
            progress.update_total_progress(1).unwrap();
        }
        let snapshot = progress.snapshot().await.unwrap();
        assert_eq!(snapshot.completed, 100);
        assert_eq!(snapshot.redraws, 1);
        // Closing always flushes.
        assert_eq!(progress.close().await.unwrap().redraws, 2);
    }

    #[tokio::test]
    async fn test_zero_slots_never_blocks() {
        let progress = spawn(0, Duration::ZERO);
        let a = progress.acquire_free_slot().await.unwrap();
        let b = progress.acquire_free_slot().await.unwrap();
        assert_eq!((a.slot(), b.slot()), (None, None));
        a.update(10);
    }

    #[tokio::test]
    async fn test_guard_drop_releases_slot() {
        let progress = spawn(1, Duration::ZERO);
        let guard = progress.acquire_free_slot().await.unwrap();
        assert_eq!(guard.slot(), Some(0));
        assert_eq!(progress.snapshot().await.unwrap().slots_in_use, 1);
        drop(guard);
        assert_eq!(progress.snapshot().await.unwrap().slots_in_use, 0);
        let again = tokio::time::timeout(Duration::from_secs(5), progress.acquire_free_slot())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(again.slot(), Some(0));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_slot_assignment_is_injective() {
        let progress = spawn(3, Duration::ZERO);
        let held = Arc::new(Mutex::new(HashSet::new()));
        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..24 {
            let progress = progress.clone();
            let held = Arc::clone(&held);
            tasks.spawn(async move {
                let guard = progress.acquire_free_slot().await.unwrap();
                let slot = guard.slot().unwrap();
                assert!(held.lock().unwrap().insert(slot), "slot {slot} handed out twice");
                guard.update(1);
                tokio::time::sleep(Duration::from_millis(2)).await;
                held.lock().unwrap().remove(&slot);
            });
        }
        while let Some(result) = tasks.join_next().await {
            result.unwrap();
        }
        assert_eq!(progress.close().await.unwrap().slots_in_use, 0);
    }

    #[tokio::test]
    async fn test_closed_manager_reports_error() {
        let progress = spawn(1, Duration::ZERO);
        progress.close().await.unwrap();
        let err = progress.snapshot().await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Closed));
    }
}
