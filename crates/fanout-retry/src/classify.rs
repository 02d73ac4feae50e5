//! Retryable-error classification (spec §4.4 "non-retryable errors").

use crate::error::CallError;

/// HTTP statuses that are always retryable regardless of configured
/// patterns.
const RETRYABLE_HTTP_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

#[must_use]
pub fn is_retryable(error: &CallError, patterns: &[String]) -> bool {
    match error {
        CallError::Transient(_) => true,
        CallError::HttpStatus { status, message } => {
            RETRYABLE_HTTP_STATUSES.contains(status) || matches_pattern(message, patterns)
        }
        CallError::Other(message) => matches_pattern(message, patterns),
    }
}

fn matches_pattern(message: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|pattern| message.contains(pattern.as_str()))
}
