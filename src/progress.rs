use crate::models::{CollectionEvent, WorkshopEvent};

/// `floor(100 * contributions / max(capacity_limit, 1))`, capped at 100.
///
/// A capacity of zero or below counts as one so a misconfigured event never
/// divides by zero.
pub fn progress_percent(contributions: usize, capacity_limit: i64) -> u8 {
    let capacity = capacity_limit.max(1) as u64;
    let percent = (contributions as u64).saturating_mul(100) / capacity;
    percent.min(100) as u8
}

/// An event that fills up as people contribute to it.
///
/// Progress counts contribution records (donations or attendances), never
/// kilograms, for both event kinds.
pub trait Capacity {
    fn contribution_count(&self) -> usize;
    fn capacity_limit(&self) -> i64;

    fn progress(&self) -> u8 {
        progress_percent(self.contribution_count(), self.capacity_limit())
    }

    fn remaining_spots(&self) -> u64 {
        (self.capacity_limit().max(1) as u64).saturating_sub(self.contribution_count() as u64)
    }
}

impl Capacity for CollectionEvent {
    fn contribution_count(&self) -> usize {
        self.donations.len()
    }

    fn capacity_limit(&self) -> i64 {
        self.capacity_limit
    }
}

impl Capacity for WorkshopEvent {
    fn contribution_count(&self) -> usize {
        self.assistants.len()
    }

    fn capacity_limit(&self) -> i64 {
        self.capacity_limit
    }
}
