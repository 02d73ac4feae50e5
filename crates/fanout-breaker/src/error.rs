//! Circuit breaker errors (spec §4.3, §7 "Dispatch").

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BreakerError {
    #[error("circuit breaker for {endpoint} is open")]
    CircuitOpen { endpoint: String },
}
