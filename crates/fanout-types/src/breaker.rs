//! Circuit-breaker record shape (spec §3, §4.3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Three-state breaker status (spec §4.9 state machine:
/// `closed ⇄ open ⇄ halfOpen ⇄ closed`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// Per-endpoint breaker bookkeeping, keyed externally by `repo:workflow`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerRecord {
    pub state: BreakerState,
    pub failures: u32,
    pub successes: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_failure_time: Option<DateTime<Utc>>,
    pub half_open_in_flight: u32,
}

impl CircuitBreakerRecord {
    #[must_use]
    pub fn new() -> Self {
        Self { state: BreakerState::Closed, failures: 0, successes: 0, last_failure_time: None, half_open_in_flight: 0 }
    }
}

impl Default for CircuitBreakerRecord {
    fn default() -> Self {
        Self::new()
    }
}
