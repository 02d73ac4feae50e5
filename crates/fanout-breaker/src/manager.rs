//! Endpoint -> breaker map, with bulk/per-endpoint reset and stale-breaker
//! reaping (spec §4.3 "The manager component").

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use fanout_types::BreakerState;

use crate::breaker::CircuitBreaker;
use crate::config::BreakerConfig;

struct Entry {
    breaker: Arc<CircuitBreaker>,
    last_touched: Instant,
}

/// Maps `repo:workflow` endpoint keys to their breaker, handing out the
/// same instance for the same key across concurrent callers.
pub struct BreakerManager {
    config: BreakerConfig,
    breakers: DashMap<String, Entry>,
}

/// Aggregate counts across all tracked endpoints (spec §4.3 "aggregate
/// stats").
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BreakerStats {
    pub closed: usize,
    pub open: usize,
    pub half_open: usize,
}

impl BreakerManager {
    #[must_use]
    pub fn new(config: BreakerConfig) -> Self {
        Self { config, breakers: DashMap::new() }
    }

    /// Return the breaker for `endpoint`, creating one on first use.
    pub fn get(&self, endpoint: &str) -> Arc<CircuitBreaker> {
        if let Some(mut entry) = self.breakers.get_mut(endpoint) {
            entry.last_touched = Instant::now();
            return Arc::clone(&entry.breaker);
        }
        let breaker = Arc::new(CircuitBreaker::new(endpoint, self.config));
        self.breakers.insert(endpoint.to_string(), Entry { breaker: Arc::clone(&breaker), last_touched: Instant::now() });
        breaker
    }

    pub fn reset(&self, endpoint: &str) {
        if let Some(entry) = self.breakers.get(endpoint) {
            entry.breaker.reset();
        }
    }

    pub fn reset_all(&self) {
        for entry in self.breakers.iter() {
            entry.breaker.reset();
        }
    }

    #[must_use]
    pub fn stats(&self) -> BreakerStats {
        let mut stats = BreakerStats::default();
        for entry in self.breakers.iter() {
            match entry.breaker.snapshot().state {
                BreakerState::Closed => stats.closed += 1,
                BreakerState::Open => stats.open += 1,
                BreakerState::HalfOpen => stats.half_open += 1,
            }
        }
        stats
    }

    /// Endpoints currently in the `open` state (spec §4.8 "Any open
    /// circuit breaker yields at least degraded").
    #[must_use]
    pub fn open_endpoints(&self) -> Vec<String> {
        self.breakers
            .iter()
            .filter(|entry| entry.breaker.snapshot().state == BreakerState::Open)
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Drop breakers that are `closed` (i.e. healthy) and haven't been
    /// touched in `max_age` (spec §4.9 "stale closed breakers are
    /// reaped"). Returns the number removed.
    pub fn reap_stale(&self, max_age: Duration) -> usize {
        let now = Instant::now();
        let stale: Vec<String> = self
            .breakers
            .iter()
            .filter(|entry| {
                entry.breaker.snapshot().state == BreakerState::Closed
                    && now.duration_since(entry.last_touched) >= max_age
            })
            .map(|entry| entry.key().clone())
            .collect();
        for key in &stale {
            self.breakers.remove(key);
        }
        stale.len()
    }
}
