use crate::state::{ProgressState, Unit};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

fn file_style() -> ProgressStyle {
    ProgressStyle::with_template("{msg:30!} [{bar:30.cyan/blue}] {bytes}/{total_bytes} @ {bytes_per_sec}")
        .expect("progress template is valid")
        .progress_chars("━━╌")
}

fn total_style(unit: Unit) -> ProgressStyle {
    let template = match unit {
        Unit::Bytes => "{prefix:.bold} [{bar:40.green/white}] {bytes}/{total_bytes} @ {bytes_per_sec} ({eta})",
        Unit::Files => "{prefix:.bold} [{bar:40.green/white}] {pos}/{len} files ({elapsed})",
    };
    ProgressStyle::with_template(template)
        .expect("progress template is valid")
        .progress_chars("━━╌")
}

/// Terminal rendering of a [`ProgressState`]: one bar per busy slot plus an
/// optional aggregate bar.
///
/// Mutations only touch the counters. Nothing reaches the terminal until
/// [`redraw`](Self::redraw) is called, which is what lets the manager rate
/// limit drawing without losing updates.
pub struct ProgressBars {
    multi: MultiProgress,
    state: ProgressState,
    total_bar: Option<ProgressBar>,
    slot_bars: Vec<Option<ProgressBar>>,
    verbose: bool,
    redraws: usize,
    lines: usize,
    last_line: Option<String>,
}

impl ProgressBars {
    pub fn new(num_slots: usize, show_total: bool, verbose: bool, target: ProgressDrawTarget) -> Self {
        let multi = MultiProgress::with_draw_target(target);
        let total_bar = show_total.then(|| {
            let bar = multi.add(ProgressBar::new(0));
            bar.set_style(total_style(Unit::Bytes));
            bar
        });
        Self {
            multi,
            state: ProgressState::new(num_slots),
            total_bar,
            slot_bars: vec![None; num_slots],
            verbose,
            redraws: 0,
            lines: 0,
            last_line: None,
        }
    }

    pub fn num_slots(&self) -> usize {
        self.slot_bars.len()
    }

    pub fn state(&self) -> &ProgressState {
        &self.state
    }

    pub fn redraws(&self) -> usize {
        self.redraws
    }

    /// Lines handed to [`write`](Self::write) so far, printed or not.
    pub fn lines(&self) -> usize {
        self.lines
    }

    pub fn last_line(&self) -> Option<&str> {
        self.last_line.as_deref()
    }

    pub fn set_total(&mut self, total: u64, unit: Unit, label: impl Into<String>) {
        self.state.set_total(total, unit, label);
        if let Some(bar) = &self.total_bar {
            bar.set_style(total_style(unit));
            bar.set_prefix(self.state.label().to_string());
        }
    }

    pub fn update_total_progress(&mut self, delta: u64) {
        self.state.advance(delta);
    }

    pub fn acquire_free_slot(&mut self) -> Option<usize> {
        self.state.acquire_free_slot()
    }

    pub fn release_slot(&mut self, slot: usize) {
        self.state.release_slot(slot);
    }

    pub fn set(&mut self, slot: usize, total: u64, desc: impl Into<String>) {
        self.state.set(slot, total, desc);
    }

    pub fn update(&mut self, slot: usize, delta: u64) {
        self.state.update(slot, delta);
    }

    /// Print a line above the bars.
    ///
    /// With a hidden draw target there is nothing to print above, so the line
    /// goes straight to stderr, and only in verbose mode.
    pub fn write(&mut self, line: &str) {
        self.lines += 1;
        self.last_line = Some(line.to_string());
        if self.multi.is_hidden() {
            if self.verbose {
                eprintln!("{line}");
            }
            return;
        }
        if let Err(error) = self.multi.println(line) {
            tracing::debug!(%error, "failed to print progress line");
        }
    }

    /// Push the current counters to the terminal.
    pub fn redraw(&mut self) {
        self.redraws += 1;
        if let Some(bar) = &self.total_bar {
            bar.set_length(self.state.total());
            bar.set_position(self.state.completed());
        }
        for (slot, bar) in self.state.slots().iter().zip(self.slot_bars.iter_mut()) {
            match (slot.in_use, bar.as_ref()) {
                (true, Some(bar)) => {
                    bar.set_length(slot.total);
                    bar.set_position(slot.position);
                    bar.set_message(slot.desc.clone());
                },
                (true, None) => {
                    let new = ProgressBar::new(slot.total).with_style(file_style()).with_message(slot.desc.clone());
                    new.set_position(slot.position);
                    *bar = Some(match &self.total_bar {
                        Some(total) => self.multi.insert_before(total, new),
                        None => self.multi.add(new),
                    });
                },
                (false, Some(_)) => {
                    if let Some(done) = bar.take() {
                        done.finish_and_clear();
                        self.multi.remove(&done);
                    }
                },
                (false, None) => {},
            }
        }
    }

    /// Final flush: draw the last state, leave the aggregate bar on screen
    /// and clear the per-file bars.
    pub fn finish(&mut self) {
        self.redraw();
        for bar in self.slot_bars.iter_mut().filter_map(Option::take) {
            bar.finish_and_clear();
            self.multi.remove(&bar);
        }
        if let Some(bar) = &self.total_bar {
            bar.finish();
        }
    }
}
