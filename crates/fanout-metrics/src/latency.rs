//! Fixed-size latency sample reservoir, in the spirit of a ring buffer:
//! the newest `capacity` samples are kept and percentiles are computed
//! over that rolling window (spec §4.8 "P50 and P95 over a rolling
//! window").

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

const DEFAULT_CAPACITY: usize = 1024;

#[derive(Debug)]
pub struct LatencyReservoir {
    samples: Mutex<VecDeque<f64>>,
    capacity: usize,
}

impl Default for LatencyReservoir {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl LatencyReservoir {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self { samples: Mutex::new(VecDeque::with_capacity(capacity.min(8192))), capacity: capacity.max(1) }
    }

    pub fn record(&self, duration: Duration) {
        let mut samples = self.samples.lock().expect("latency reservoir poisoned");
        if samples.len() >= self.capacity {
            samples.pop_front();
        }
        samples.push_back(duration.as_secs_f64() * 1000.0);
    }

    #[must_use]
    pub fn p50(&self) -> f64 {
        self.percentile(50.0)
    }

    #[must_use]
    pub fn p95(&self) -> f64 {
        self.percentile(95.0)
    }

    /// Nearest-rank percentile in milliseconds; `0.0` with no samples.
    #[must_use]
    pub fn percentile(&self, p: f64) -> f64 {
        let samples = self.samples.lock().expect("latency reservoir poisoned");
        if samples.is_empty() {
            return 0.0;
        }
        let mut sorted: Vec<f64> = samples.iter().copied().collect();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let rank = ((p / 100.0) * sorted.len() as f64).ceil() as usize;
        let index = rank.saturating_sub(1).min(sorted.len() - 1);
        sorted[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentile_of_empty_reservoir_is_zero() {
        assert_eq!(LatencyReservoir::default().p95(), 0.0);
    }

    #[test]
    fn p50_of_uniform_samples_matches_median() {
        let reservoir = LatencyReservoir::new(16);
        for ms in [10, 20, 30, 40, 50] {
            reservoir.record(Duration::from_millis(ms));
        }
        assert_eq!(reservoir.p50(), 30.0);
    }

    #[test]
    fn capacity_drops_oldest_samples() {
        let reservoir = LatencyReservoir::new(2);
        reservoir.record(Duration::from_millis(1000));
        reservoir.record(Duration::from_millis(10));
        reservoir.record(Duration::from_millis(20));

        assert_eq!(reservoir.p95(), 20.0);
    }
}
