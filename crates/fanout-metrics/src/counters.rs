//! Lock-free counters for fan-outs and their children (spec §4.8).

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct Counters {
    fanouts_total: AtomicU64,
    fanouts_active: AtomicU64,
    fanouts_successful: AtomicU64,
    fanouts_failed: AtomicU64,

    children_total: AtomicU64,
    children_active: AtomicU64,
    children_successful: AtomicU64,
    children_failed: AtomicU64,
    children_timed_out: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CounterSnapshot {
    pub fanouts_total: u64,
    pub fanouts_active: u64,
    pub fanouts_successful: u64,
    pub fanouts_failed: u64,
    pub children_total: u64,
    pub children_active: u64,
    pub children_successful: u64,
    pub children_failed: u64,
    pub children_timed_out: u64,
}

impl CounterSnapshot {
    /// `failed / total * 100`, `0.0` when no fan-outs have completed yet.
    #[must_use]
    pub fn fan_out_error_rate(&self) -> f64 {
        error_rate(self.fanouts_failed, self.fanouts_total)
    }

    #[must_use]
    pub fn child_error_rate(&self) -> f64 {
        error_rate(self.children_failed + self.children_timed_out, self.children_total)
    }
}

fn error_rate(failures: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        (failures as f64 / total as f64) * 100.0
    }
}

impl Counters {
    pub fn fan_out_started(&self) {
        self.fanouts_total.fetch_add(1, Ordering::Relaxed);
        self.fanouts_active.fetch_add(1, Ordering::Relaxed);
    }

    pub fn fan_out_succeeded(&self) {
        self.fanouts_active.fetch_sub(1, Ordering::Relaxed);
        self.fanouts_successful.fetch_add(1, Ordering::Relaxed);
    }

    pub fn fan_out_failed(&self) {
        self.fanouts_active.fetch_sub(1, Ordering::Relaxed);
        self.fanouts_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn child_started(&self) {
        self.children_total.fetch_add(1, Ordering::Relaxed);
        self.children_active.fetch_add(1, Ordering::Relaxed);
    }

    pub fn child_succeeded(&self) {
        self.children_active.fetch_sub(1, Ordering::Relaxed);
        self.children_successful.fetch_add(1, Ordering::Relaxed);
    }

    pub fn child_failed(&self) {
        self.children_active.fetch_sub(1, Ordering::Relaxed);
        self.children_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn child_timed_out(&self) {
        self.children_active.fetch_sub(1, Ordering::Relaxed);
        self.children_timed_out.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            fanouts_total: self.fanouts_total.load(Ordering::Relaxed),
            fanouts_active: self.fanouts_active.load(Ordering::Relaxed),
            fanouts_successful: self.fanouts_successful.load(Ordering::Relaxed),
            fanouts_failed: self.fanouts_failed.load(Ordering::Relaxed),
            children_total: self.children_total.load(Ordering::Relaxed),
            children_active: self.children_active.load(Ordering::Relaxed),
            children_successful: self.children_successful.load(Ordering::Relaxed),
            children_failed: self.children_failed.load(Ordering::Relaxed),
            children_timed_out: self.children_timed_out.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fan_out_lifecycle_updates_active_and_terminal_counts() {
        let counters = Counters::default();
        counters.fan_out_started();
        counters.fan_out_started();
        counters.fan_out_succeeded();
        counters.fan_out_failed();

        let snap = counters.snapshot();
        assert_eq!(snap.fanouts_total, 2);
        assert_eq!(snap.fanouts_active, 0);
        assert_eq!(snap.fan_out_error_rate(), 50.0);
    }

    #[test]
    fn error_rate_is_zero_with_no_samples() {
        assert_eq!(Counters::default().snapshot().fan_out_error_rate(), 0.0);
    }
}
