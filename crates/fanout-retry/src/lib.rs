//! Retrying executor with exponential backoff and retryable-error
//! classification (C4).

pub mod classify;
pub mod config;
pub mod error;
pub mod executor;

pub use classify::is_retryable;
pub use config::RetryConfig;
pub use error::{CallError, RetryError};
pub use executor::RetryExecutor;
