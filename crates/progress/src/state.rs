/// What the aggregate counter is measured in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Unit {
    #[default]
    Bytes,
    Files,
}

/// One per-file bar.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Slot {
    pub in_use: bool,
    pub desc: String,
    pub total: u64,
    pub position: u64,
}

/// Counters behind the progress display.
///
/// `completed` never exceeds `total`; over-reporting is clamped and logged
/// instead of trusted. Slots form a fixed pool: each is either free or owned
/// by exactly one in-flight job.
#[derive(Debug, Clone, Default)]
pub struct ProgressState {
    label: String,
    unit: Unit,
    total: u64,
    completed: u64,
    slots: Vec<Slot>,
}

impl ProgressState {
    pub fn new(num_slots: usize) -> Self {
        Self {
            slots: vec![Slot::default(); num_slots],
            ..Default::default()
        }
    }

    pub fn set_total(&mut self, total: u64, unit: Unit, label: impl Into<String>) {
        self.total = total;
        self.unit = unit;
        self.label = label.into();
        self.completed = self.completed.min(total);
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn completed(&self) -> u64 {
        self.completed
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Advance the aggregate counter, clamping at `total`.
    pub fn advance(&mut self, delta: u64) {
        let next = self.completed.saturating_add(delta);
        if next > self.total {
            tracing::warn!(completed = self.completed, delta, total = self.total, "progress over-reported, clamping");
        }
        self.completed = next.min(self.total);
    }

    /// Claim the lowest free slot.
    pub fn acquire_free_slot(&mut self) -> Option<usize> {
        let (index, slot) = self.slots.iter_mut().enumerate().find(|(_, slot)| !slot.in_use)?;
        *slot = Slot {
            in_use: true,
            ..Slot::default()
        };
        Some(index)
    }

    pub fn release_slot(&mut self, index: usize) {
        match self.slots.get_mut(index) {
            Some(slot) => slot.in_use = false,
            None => tracing::warn!(slot = index, "released unknown progress slot"),
        }
    }

    /// Point a claimed slot at a new file.
    pub fn set(&mut self, index: usize, total: u64, desc: impl Into<String>) {
        if let Some(slot) = self.slots.get_mut(index).filter(|slot| slot.in_use) {
            slot.total = total;
            slot.position = 0;
            slot.desc = desc.into();
        }
    }

    pub fn update(&mut self, index: usize, delta: u64) {
        if let Some(slot) = self.slots.get_mut(index).filter(|slot| slot.in_use) {
            slot.position = slot.position.saturating_add(delta).min(slot.total);
        }
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn slots_in_use(&self) -> usize {
        self.slots.iter().filter(|slot| slot.in_use).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(&[4, 4], 8)]
    #[case(&[4, 4, 4], 10)]
    #[case(&[u64::MAX, 1], 10)]
    fn test_completed_is_clamped(#[case] deltas: &[u64], #[case] expected: u64) {
        let mut state = ProgressState::new(0);
        state.set_total(10, Unit::Bytes, "Total");
        for delta in deltas {
            state.advance(*delta);
        }
        assert_eq!(state.completed(), expected);
        assert!(state.completed() <= state.total());
    }

    #[test]
    fn test_slots_are_never_shared() {
        let mut state = ProgressState::new(2);
        assert_eq!(state.acquire_free_slot(), Some(0));
        assert_eq!(state.acquire_free_slot(), Some(1));
        assert_eq!(state.acquire_free_slot(), None);
        state.release_slot(0);
        assert_eq!(state.slots_in_use(), 1);
        assert_eq!(state.acquire_free_slot(), Some(0));
    }

    #[test]
    fn test_reacquired_slot_is_reset() {
        let mut state = ProgressState::new(1);
        let slot = state.acquire_free_slot().unwrap();
        state.set(slot, 100, "a.txt");
        state.update(slot, 60);
        state.release_slot(slot);
        let slot = state.acquire_free_slot().unwrap();
        assert_eq!(state.slots()[slot].position, 0);
        assert_eq!(state.slots()[slot].desc, "");
    }

    #[test]
    fn test_updates_to_free_slots_are_ignored() {
        let mut state = ProgressState::new(1);
        state.update(0, 5);
        state.set(0, 10, "ghost");
        assert_eq!(state.slots()[0], Slot::default());
    }
}
