//! Per-day task counters for the loaded month.
//!
//! # Responsibility
//! - Hold `count` and `done count` per civil day inside one month window.
//! - Apply create/reschedule/delete/status deltas without a store round trip.
//!
//! # Invariants
//! - Counters never go below zero.
//! - Days outside the loaded window are ignored.
//! - Zero counters are not stored, so an incrementally maintained index
//!   compares equal to a fresh rebuild over the same tasks.

use jiff::civil::Date;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DayBucketIndex {
    window: Option<(Date, Date)>,
    counts: BTreeMap<Date, u32>,
    done_counts: BTreeMap<Date, u32>,
}

impl DayBucketIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loaded `[first, next_first)` window, if any month was loaded.
    pub fn window(&self) -> Option<(Date, Date)> {
        self.window
    }

    pub fn covers(&self, day: Date) -> bool {
        self.window
            .map(|(first, end)| day >= first && day < end)
            .unwrap_or(false)
    }

    /// Replaces every counter with the given `(day, is_done)` entries.
    pub fn rebuild(&mut self, window: (Date, Date), entries: impl IntoIterator<Item = (Date, bool)>) {
        self.window = Some(window);
        self.counts.clear();
        self.done_counts.clear();
        for (day, is_done) in entries {
            self.increment(day, is_done);
        }
    }

    /// Overwrites one day's counters with values recounted from the store.
    pub fn set_day(&mut self, day: Date, count: u32, done_count: u32) {
        if !self.covers(day) {
            return;
        }
        store(&mut self.counts, day, count);
        store(&mut self.done_counts, day, done_count);
    }

    pub fn apply_create(&mut self, day: Date, is_done: bool) {
        self.increment(day, is_done);
    }

    /// Moves one task's contribution from `old_day` (if it had one) to
    /// `new_day`.
    pub fn apply_reschedule(&mut self, old_day: Option<Date>, new_day: Date, is_done: bool) {
        if let Some(old_day) = old_day {
            self.decrement(old_day, is_done);
        }
        self.increment(new_day, is_done);
    }

    pub fn apply_delete(&mut self, day: Date, was_done: bool) {
        self.decrement(day, was_done);
    }

    pub fn count_for(&self, day: Date) -> u32 {
        self.counts.get(&day).copied().unwrap_or(0)
    }

    pub fn done_count_for(&self, day: Date) -> u32 {
        self.done_counts.get(&day).copied().unwrap_or(0)
    }

    fn increment(&mut self, day: Date, is_done: bool) {
        if !self.covers(day) {
            return;
        }
        *self.counts.entry(day).or_insert(0) += 1;
        if is_done {
            *self.done_counts.entry(day).or_insert(0) += 1;
        }
    }

    fn decrement(&mut self, day: Date, is_done: bool) {
        if !self.covers(day) {
            return;
        }
        let count = self.count_for(day).saturating_sub(1);
        store(&mut self.counts, day, count);
        if is_done {
            let done = self.done_count_for(day).saturating_sub(1);
            store(&mut self.done_counts, day, done);
        }
    }
}

fn store(map: &mut BTreeMap<Date, u32>, day: Date, value: u32) {
    if value == 0 {
        map.remove(&day);
    } else {
        map.insert(day, value);
    }
}
