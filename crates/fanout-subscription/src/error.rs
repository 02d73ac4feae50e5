//! Subscription evaluator errors (spec §4.2, §7).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error("version range operator is not supported: {0:?}")]
    RangeUnsupported(String),

    #[error("not a valid semantic version: {0:?}")]
    VersionInvalid(String),

    #[error("filter {expression:?} failed to compile: {reason}")]
    FilterCompileError { expression: String, reason: String },

    #[error("filter {expression:?} failed to evaluate: {reason}")]
    FilterEvalError { expression: String, reason: String },

    #[error("filter {expression:?} evaluated to a non-boolean result")]
    FilterTypeError { expression: String },

    #[error("input template field {0:?} is missing from the event payload")]
    InputFieldMissing(String),
}
