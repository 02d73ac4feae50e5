//! Retry executor errors and the error classification it acts on
//! (spec §4.4, §7 "Dispatch").

use thiserror::Error;

/// What a failed call looked like, so [`crate::classify`] can decide
/// whether another attempt is worthwhile.
#[derive(Debug, Clone)]
pub enum CallError {
    /// A transient network/timeout failure — always retryable.
    Transient(String),
    /// An HTTP-shaped failure carrying a status code.
    HttpStatus { status: u16, message: String },
    /// Anything else; retryable only via substring match against the
    /// executor's configured patterns.
    Other(String),
}

impl CallError {
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            CallError::Transient(m) | CallError::Other(m) => m,
            CallError::HttpStatus { message, .. } => message,
        }
    }
}

impl std::fmt::Display for CallError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

/// Outcome of [`crate::executor::RetryExecutor::execute`].
#[derive(Debug, Error)]
pub enum RetryError {
    #[error("retries exhausted after {attempts} attempt(s): {last}")]
    Exhausted { attempts: u32, last: CallError },

    #[error("cancelled after {attempts} attempt(s)")]
    Cancelled { attempts: u32 },
}
