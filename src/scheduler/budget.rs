//! Cooperative step budget

/// Counts voxel operations between suspension points.
///
/// Work units report their cost with `spend`; once `interval` operations
/// accumulate the scheduler suspends and calls `reset`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StepBudget {
    interval: u64,
    spent: u64,
    total: u64,
}

impl StepBudget {
    pub fn new(interval: u32) -> Self {
        Self { interval: interval.max(1) as u64, spent: 0, total: 0 }
    }

    /// Record work done by one unit
    pub fn spend(&mut self, ops: u64) {
        self.spent = self.spent.saturating_add(ops);
        self.total = self.total.saturating_add(ops);
    }

    /// Whether the current slice is used up
    pub fn exhausted(&self) -> bool {
        self.spent >= self.interval
    }

    /// Start a new slice
    pub fn reset(&mut self) {
        self.spent = 0;
    }

    pub fn interval(&self) -> u64 {
        self.interval
    }

    /// Operations spent since the run started
    pub fn total(&self) -> u64 {
        self.total
    }
}
