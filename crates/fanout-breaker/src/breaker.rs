//! Single per-endpoint circuit breaker (spec §4.3 state machine).

use std::sync::Mutex;

use chrono::Utc;
use fanout_types::{BreakerState, CircuitBreakerRecord};
use tracing::{debug, warn};

use crate::config::BreakerConfig;
use crate::error::BreakerError;

/// A guard returned by [`CircuitBreaker::admit`]. Dropping it without
/// calling [`Admission::success`]/[`Admission::failure`] is a caller bug,
/// but harmless: the breaker simply never learns the outcome of that call.
pub struct Admission<'a> {
    breaker: &'a CircuitBreaker,
}

impl Admission<'_> {
    pub fn success(self) {
        self.breaker.record_success();
    }

    pub fn failure(self) {
        self.breaker.record_failure();
    }
}

/// Three-state guard for a single endpoint (`repo:workflow`). Holds its
/// own lock so the owning [`crate::manager::BreakerManager`] can hand out
/// `Arc<CircuitBreaker>` clones freely.
pub struct CircuitBreaker {
    endpoint: String,
    config: BreakerConfig,
    record: Mutex<CircuitBreakerRecord>,
}

impl CircuitBreaker {
    #[must_use]
    pub fn new(endpoint: impl Into<String>, config: BreakerConfig) -> Self {
        Self { endpoint: endpoint.into(), config, record: Mutex::new(CircuitBreakerRecord::new()) }
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    #[must_use]
    pub fn snapshot(&self) -> CircuitBreakerRecord {
        self.record.lock().expect("breaker mutex poisoned").clone()
    }

    /// Request admission. `Ok` carries an [`Admission`] the caller must
    /// resolve with the call's outcome; `Err` means the breaker is open
    /// and the call must not be attempted.
    pub fn admit(&self) -> Result<Admission<'_>, BreakerError> {
        let mut record = self.record.lock().expect("breaker mutex poisoned");
        match record.state {
            BreakerState::Closed => Ok(()),
            BreakerState::Open => {
                let elapsed = record
                    .last_failure_time
                    .map(|t| Utc::now().signed_duration_since(t).to_std().unwrap_or_default())
                    .unwrap_or_default();
                if elapsed >= self.config.timeout {
                    record.state = BreakerState::HalfOpen;
                    record.half_open_in_flight = 0;
                    debug!(endpoint = %self.endpoint, "breaker transitioning open -> half_open");
                    Ok(())
                } else {
                    Err(())
                }
            }
            BreakerState::HalfOpen => {
                if record.half_open_in_flight < self.config.max_requests {
                    record.half_open_in_flight += 1;
                    Ok(())
                } else {
                    Err(())
                }
            }
        }
        .map(|()| Admission { breaker: self })
        .map_err(|()| BreakerError::CircuitOpen { endpoint: self.endpoint.clone() })
    }

    fn record_success(&self) {
        let mut record = self.record.lock().expect("breaker mutex poisoned");
        match record.state {
            BreakerState::Closed => record.failures = 0,
            BreakerState::HalfOpen => {
                record.successes += 1;
                if record.successes >= self.config.success_threshold {
                    debug!(endpoint = %self.endpoint, "breaker closing after half_open successes");
                    *record = CircuitBreakerRecord::new();
                }
            }
            BreakerState::Open => {}
        }
    }

    fn record_failure(&self) {
        let mut record = self.record.lock().expect("breaker mutex poisoned");
        match record.state {
            BreakerState::Closed => {
                record.failures += 1;
                if record.failures >= self.config.failure_threshold {
                    warn!(endpoint = %self.endpoint, failures = record.failures, "breaker opening");
                    record.state = BreakerState::Open;
                    record.last_failure_time = Some(Utc::now());
                }
            }
            BreakerState::HalfOpen => {
                warn!(endpoint = %self.endpoint, "breaker reopening after half_open failure");
                record.state = BreakerState::Open;
                record.last_failure_time = Some(Utc::now());
                record.failures = self.config.failure_threshold;
                record.successes = 0;
                record.half_open_in_flight = 0;
            }
            BreakerState::Open => {}
        }
    }

    pub fn reset(&self) {
        *self.record.lock().expect("breaker mutex poisoned") = CircuitBreakerRecord::new();
    }
}
