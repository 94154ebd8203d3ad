use std::sync::atomic::{AtomicU64, Ordering};

/// Running unique/duplicate totals.
///
/// Only the deduplicator increments (the methods are crate private); the
/// reporter and tests read snapshots. Atomics make the cross-task reads sound,
/// they are not there to arbitrate between writers.
#[derive(Debug, Default)]
pub struct Tally {
    unique: AtomicU64,
    duplicate: AtomicU64,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TallySnapshot {
    pub unique: u64,
    pub duplicate: u64,
}

impl Tally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> TallySnapshot {
        TallySnapshot {
            unique: self.unique.load(Ordering::Acquire),
            duplicate: self.duplicate.load(Ordering::Acquire),
        }
    }

    pub(crate) fn record_unique(&self) {
        self.unique.fetch_add(1, Ordering::Release);
        metrics::counter!("intake_numbers_unique_total").increment(1);
    }

    pub(crate) fn record_duplicate(&self) {
        self.duplicate.fetch_add(1, Ordering::Release);
        metrics::counter!("intake_numbers_duplicate_total").increment(1);
    }
}
