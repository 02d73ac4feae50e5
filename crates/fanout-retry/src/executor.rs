//! Retrying executor (spec §4.4).

use std::future::Future;

use fanout_utils::{delay_for_attempt, CancelToken};
use tracing::debug;

use crate::classify::is_retryable;
use crate::config::RetryConfig;
use crate::error::{CallError, RetryError};

pub struct RetryExecutor {
    config: RetryConfig,
}

impl RetryExecutor {
    #[must_use]
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Run `call` up to `max_retries + 1` times. Cancellation is observed
    /// both before any attempt and while sleeping between attempts (spec
    /// §4.4). `on_retry(attempt, error)` is invoked after each retryable
    /// failure, before the backoff sleep.
    pub async fn execute<T, F, Fut>(
        &self,
        cancel: &CancelToken,
        mut call: F,
        mut on_retry: impl FnMut(u32, &CallError),
    ) -> Result<T, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CallError>>,
    {
        let mut attempt = 0u32;
        loop {
            if cancel.is_cancelled() {
                return Err(RetryError::Cancelled { attempts: attempt });
            }

            match call().await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    attempt += 1;
                    let retryable = is_retryable(&error, &self.config.retryable_patterns);
                    let attempts_left = attempt <= self.config.max_retries && retryable;

                    if !attempts_left {
                        return Err(RetryError::Exhausted { attempts: attempt, last: error });
                    }

                    on_retry(attempt, &error);
                    debug!(attempt, retryable, "retrying after failure");

                    let delay = delay_for_attempt(
                        self.config.initial_delay,
                        self.config.max_delay,
                        self.config.backoff_factor,
                        self.config.jitter_percent,
                        attempt - 1,
                    );

                    tokio::select! {
                        () = tokio::time::sleep(delay) => {}
                        () = cancel.cancelled() => {
                            return Err(RetryError::Cancelled { attempts: attempt });
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn fast_config(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            backoff_factor: 2.0,
            jitter_percent: 0.0,
            retryable_patterns: Vec::new(),
        }
    }

    #[tokio::test]
    async fn succeeds_without_retrying_on_first_success() {
        let executor = RetryExecutor::new(fast_config(3));
        let attempts = AtomicU32::new(0);

        let result = executor
            .execute(
                &CancelToken::new(),
                || {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    async { Ok::<_, CallError>(42) }
                },
                |_, _| {},
            )
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_up_to_max_then_exhausts() {
        let executor = RetryExecutor::new(fast_config(2));
        let attempts = AtomicU32::new(0);

        let result = executor
            .execute(
                &CancelToken::new(),
                || {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    async { Err::<i32, _>(CallError::Transient("timeout".to_string())) }
                },
                |_, _| {},
            )
            .await;

        assert!(matches!(result, Err(RetryError::Exhausted { attempts: 3, .. })));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_error_stops_immediately() {
        let executor = RetryExecutor::new(fast_config(5));
        let attempts = AtomicU32::new(0);

        let result = executor
            .execute(
                &CancelToken::new(),
                || {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    async { Err::<i32, _>(CallError::HttpStatus { status: 404, message: "not found".to_string() }) }
                },
                |_, _| {},
            )
            .await;

        assert!(matches!(result, Err(RetryError::Exhausted { attempts: 1, .. })));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn already_cancelled_context_short_circuits() {
        let executor = RetryExecutor::new(fast_config(5));
        let cancel = CancelToken::new();
        cancel.cancel();

        let result = executor
            .execute(&cancel, || async { Ok::<_, CallError>(1) }, |_, _| {})
            .await;

        assert!(matches!(result, Err(RetryError::Cancelled { attempts: 0 })));
    }

    #[tokio::test]
    async fn max_retries_zero_is_a_single_attempt() {
        let executor = RetryExecutor::new(fast_config(0));
        let attempts = AtomicU32::new(0);

        let _ = executor
            .execute(
                &CancelToken::new(),
                || {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    async { Err::<i32, _>(CallError::Transient("timeout".to_string())) }
                },
                |_, _| {},
            )
            .await;

        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    proptest::proptest! {
        #[test]
        fn attempt_count_never_exceeds_max_retries_plus_one(max_retries in 0u32..8) {
            let rt = tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap();
            let attempts = AtomicU32::new(0);
            rt.block_on(async {
                let executor = RetryExecutor::new(fast_config(max_retries));
                let _ = executor
                    .execute(
                        &CancelToken::new(),
                        || {
                            attempts.fetch_add(1, Ordering::SeqCst);
                            async { Err::<i32, _>(CallError::Transient("timeout".to_string())) }
                        },
                        |_, _| {},
                    )
                    .await;
            });
            proptest::prop_assert!(attempts.load(Ordering::SeqCst) <= max_retries + 1);
        }
    }
}
