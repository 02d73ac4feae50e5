//! The fan-out algorithm itself (spec §4.6): parse params, fingerprint and
//! dedup, discover and filter subscribers, resolve diamonds, dispatch with
//! bounded concurrency through a breaker and a retrying executor, and
//! optionally wait for every child to settle.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::info;

use fanout_breaker::BreakerManager;
use fanout_event::SchemaRegistry;
use fanout_metrics::FanOutMetrics;
use fanout_retry::{RetryError, RetryExecutor};
use fanout_state::StateStore;
use fanout_subscription::FilterCache;
use fanout_types::{ChildWorkflowStatus, DetailedError, ErrorType, Event, FanOutResult, FanOutStatus, SubscriptionMatch, Value};
use fanout_utils::{poll_delay, CancelToken};

use crate::diamond;
use crate::discoverer::SubscriptionDiscoverer;
use crate::error::OrchestratorError;
use crate::params;
use crate::runner::{WorkflowInput, WorkflowRunner};

/// The step `uses:` identifier that selects this behavior (spec §4.6
/// "Step invocation surface").
pub const STEP_USES: &str = "tako/fan-out@v1";

/// Orchestrator-wide knobs that are not part of a single step's `with:`
/// block (spec §9 "dry_run is an explicit flag the caller sets, not a
/// heuristic the runner infers").
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub idempotency_enabled: bool,
    pub default_timeout: Duration,
    pub dry_run: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self { idempotency_enabled: true, default_timeout: Duration::from_secs(300), dry_run: false }
    }
}

/// Ties together the five collaborator crates (C1-C5) plus the two
/// injected seams (discovery, execution) into the single entry point a
/// workflow engine calls for a `tako/fan-out@v1` step.
pub struct FanOutOrchestrator {
    discoverer: Arc<dyn SubscriptionDiscoverer>,
    runner: Arc<dyn WorkflowRunner>,
    schema_registry: Arc<SchemaRegistry>,
    filter_cache: Arc<FilterCache>,
    state_store: Arc<StateStore>,
    breakers: Arc<BreakerManager>,
    retry: Arc<RetryExecutor>,
    metrics: Arc<FanOutMetrics>,
    config: OrchestratorConfig,
    /// Dispatch tasks are spawned here rather than into a call-local
    /// `JoinSet`: when a call doesn't wait for its children, those tasks
    /// must keep running after `call` returns, and a `JoinSet` aborts
    /// everything still in it when dropped. Living on `self` instead
    /// means they survive any single call and get reaped opportunistically.
    dispatch_tasks: Mutex<JoinSet<()>>,
}

impl FanOutOrchestrator {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        discoverer: Arc<dyn SubscriptionDiscoverer>,
        runner: Arc<dyn WorkflowRunner>,
        schema_registry: Arc<SchemaRegistry>,
        filter_cache: Arc<FilterCache>,
        state_store: Arc<StateStore>,
        breakers: Arc<BreakerManager>,
        retry: Arc<RetryExecutor>,
        metrics: Arc<FanOutMetrics>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            discoverer,
            runner,
            schema_registry,
            filter_cache,
            state_store,
            breakers,
            retry,
            metrics,
            config,
            dispatch_tasks: Mutex::new(JoinSet::new()),
        }
    }

    /// Run a `tako/fan-out@v1` step (spec §4.6, steps 1-11).
    ///
    /// `pre_discovered`, when set, is used in place of calling the
    /// discoverer (spec §4.6 step 6 "using the pre-discovered list if
    /// provided").
    pub async fn call(
        &self,
        with: &BTreeMap<String, Value>,
        source_repo: &str,
        parent_run_id: Option<String>,
        pre_discovered: Option<Vec<SubscriptionMatch>>,
    ) -> Result<FanOutResult, OrchestratorError> {
        self.reap_finished_dispatch_tasks();

        // 1. Parse params.
        let parsed = params::parse(with)?;

        // 2. Build the event.
        let mut event = Event::new(parsed.event_type.clone(), parsed.payload.clone());
        event.metadata.source = Some(source_repo.to_string());
        event.schema = parsed.schema_version.as_ref().map(|v| format!("{}@{}", parsed.event_type, v));
        if !self.config.idempotency_enabled {
            event = event.with_fresh_identity(fresh_event_id());
        }

        let fingerprint = fanout_event::fingerprint(&event);
        let effective_timeout = parsed.timeout.unwrap_or(self.config.default_timeout);

        // 3. + 4. Fingerprint, dedup, create state atomically.
        let (handle, newly_created) = if self.config.idempotency_enabled {
            let id = format!("fanout-{fingerprint}");
            self.state_store.create_atomic(
                id,
                parent_run_id.clone(),
                source_repo,
                parsed.event_type.clone(),
                parsed.wait_for_children,
                effective_timeout.as_secs(),
                fingerprint.clone(),
            )?
        } else {
            let id = timestamp_fan_out_id(&fingerprint);
            let handle = self.state_store.create(
                id,
                parent_run_id.clone(),
                source_repo,
                parsed.event_type.clone(),
                parsed.wait_for_children,
                effective_timeout.as_secs(),
                fingerprint.clone(),
            )?;
            (handle, true)
        };

        if !newly_created {
            // Either a prior call already finished, or one is still in
            // flight (this call lost the creation race). Either way,
            // short-circuit onto its outcome (spec §4.6 step 3, §8
            // "duplicate fan-out with idempotency on").
            let final_state = self.poll_until_terminal(&handle, effective_timeout).await;
            let subscribers_found = final_state.children.len();
            let timed_out = !final_state.status.is_terminal();
            return Ok(FanOutResult::from_state(&final_state, 0, subscribers_found, timed_out));
        }

        handle.start()?;
        self.metrics.fan_out_started();
        let call_start = Instant::now();

        // 5. Validate the event against its declared schema, if any.
        if event.schema.is_some() {
            let validated = self
                .schema_registry
                .apply_defaults(&mut event)
                .and_then(|()| fanout_event::validate(&self.schema_registry, &event));
            if let Err(e) = validated {
                handle.fail(e.to_string())?;
                self.metrics.fan_out_failed(call_start.elapsed());
                return Ok(FanOutResult::from_state(&handle.snapshot(), 0, 0, false));
            }
        }

        // 6. Discover subscribers.
        let discovered = match pre_discovered {
            Some(list) => list,
            None => {
                let artifact = format!("{source_repo}:default");
                match self.discoverer.find_subscribers(&artifact, &parsed.event_type).await {
                    Ok(list) => list,
                    Err(e) => {
                        handle.fail(e.to_string())?;
                        self.metrics.fan_out_failed(call_start.elapsed());
                        return Ok(FanOutResult::from_state(&handle.snapshot(), 0, 0, false));
                    }
                }
            }
        };
        let subscribers_found = discovered.len();

        // 7. Filter each candidate (event-type/version/filter match, then
        // input templating). Evaluation and templating errors are
        // recorded per-subscriber and the candidate is dropped rather
        // than failing the whole call.
        let mut survivors: Vec<SubscriptionMatch> = Vec::with_capacity(discovered.len());
        let mut inputs_by_endpoint: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
        let mut errors: Vec<String> = Vec::new();

        for candidate in discovered {
            match fanout_subscription::evaluate(&self.filter_cache, &candidate.subscription, &event) {
                Ok(true) => match fanout_subscription::process_inputs(&event, &candidate.subscription) {
                    Ok(inputs) => {
                        inputs_by_endpoint.insert(candidate.endpoint_key(), inputs);
                        survivors.push(candidate);
                    }
                    Err(e) => errors.push(format!("{}: {e}", candidate.endpoint_key())),
                },
                Ok(false) => {}
                Err(e) => errors.push(format!("{}: {e}", candidate.endpoint_key())),
            }
        }
        let filter_rejected = subscribers_found - survivors.len();

        // 8. Diamond resolution.
        let (dispatched, skipped) = diamond::resolve(survivors);
        for skip in &skipped {
            info!(
                repository = %skip.repository,
                workflow = %skip.workflow,
                winner = %format!("{}/{}", skip.winner_repository, skip.winner_workflow),
                "subscriber skipped by diamond resolution"
            );
        }
        debug_assert!(subscribers_found >= dispatched.len() + skipped.len() + filter_rejected);

        // 9. Dispatch with bounded concurrency.
        let triggered_count = dispatched.len();
        let concurrency = if parsed.concurrency_limit == 0 { triggered_count.max(1) } else { parsed.concurrency_limit };
        let semaphore = Arc::new(Semaphore::new(concurrency));
        let cancel = CancelToken::new();
        let deadline = Instant::now() + effective_timeout;
        let detailed_errors: Arc<Mutex<Vec<DetailedError>>> = Arc::new(Mutex::new(Vec::new()));

        for m in &dispatched {
            let inputs = inputs_by_endpoint.get(&m.endpoint_key()).cloned().unwrap_or_default();
            handle.add_child(m.repository.clone(), m.subscription.workflow.clone(), inputs)?;
        }

        for m in dispatched {
            let repository = m.repository.clone();
            let workflow = m.subscription.workflow.clone();
            let endpoint_key = m.endpoint_key();
            let inputs = inputs_by_endpoint.remove(&endpoint_key).unwrap_or_default();

            let task = Self::dispatch_one(
                repository,
                workflow,
                endpoint_key,
                inputs,
                self.config.dry_run,
                Arc::clone(&self.runner),
                Arc::clone(&self.breakers),
                Arc::clone(&self.retry),
                Arc::clone(&self.metrics),
                handle.clone(),
                Arc::clone(&semaphore),
                cancel.clone(),
                Arc::clone(&detailed_errors),
            );
            self.dispatch_tasks.lock().expect("dispatch join set mutex poisoned").spawn(task);
        }

        // 10. Wait, or complete immediately if there is nothing to wait on.
        if parsed.wait_for_children && triggered_count > 0 {
            handle.start_waiting()?;
            let mut attempt = 0u32;
            loop {
                if handle.is_complete() {
                    break;
                }
                let now = Instant::now();
                if now >= deadline {
                    // Persist the terminal status before waking cancelled
                    // children: `time_out` and a child's own
                    // `resolve_waiting_status` race for the same sticky
                    // field, and a hung child cannot reach that call until
                    // `cancel` fires below.
                    handle.time_out()?;
                    cancel.cancel();
                    break;
                }
                let remaining = deadline.saturating_duration_since(now);
                tokio::time::sleep(poll_delay(attempt).min(remaining)).await;
                attempt += 1;
            }
        } else {
            handle.complete()?;
        }

        // 11. Return the result.
        let final_state = handle.snapshot();
        match &final_state.status {
            FanOutStatus::Completed { .. } => self.metrics.fan_out_succeeded(call_start.elapsed()),
            _ => self.metrics.fan_out_failed(call_start.elapsed()),
        }

        let timeout_exceeded = matches!(final_state.status, FanOutStatus::TimedOut { .. });
        let mut result = FanOutResult::from_state(&final_state, triggered_count, subscribers_found, timeout_exceeded);
        result.errors.extend(errors);
        result.detailed_errors = detailed_errors.lock().expect("detailed error mutex poisoned").clone();
        // `from_state` only saw the state-level failure (if any); step 7's
        // per-subscriber filter/templating errors just got appended above
        // and must also gate success (spec §7: "success is true iff errors
        // is empty and every child reached completed").
        result.success = result.success && result.errors.is_empty();
        Ok(result)
    }

    /// Poll C5 every `poll_delay(attempt)` (100ms -> 1s) until `handle`
    /// reaches a terminal status or `timeout` elapses (spec §4.6 steps 3
    /// and 10). Returns whatever snapshot was last observed; the caller
    /// distinguishes "reached terminal" from "timed out waiting" by
    /// checking `status.is_terminal()`.
    async fn poll_until_terminal(&self, handle: &fanout_state::StateHandle, timeout: Duration) -> fanout_types::FanOutState {
        let deadline = Instant::now() + timeout;
        let mut attempt = 0u32;
        loop {
            let snapshot = handle.snapshot();
            if snapshot.status.is_terminal() {
                return snapshot;
            }
            let now = Instant::now();
            if now >= deadline {
                return snapshot;
            }
            let remaining = deadline.saturating_duration_since(now);
            tokio::time::sleep(poll_delay(attempt).min(remaining)).await;
            attempt += 1;
        }
    }

    fn reap_finished_dispatch_tasks(&self) {
        let mut tasks = self.dispatch_tasks.lock().expect("dispatch join set mutex poisoned");
        while tasks.try_join_next().is_some() {}
    }

    /// Execute (and classify) a single dispatched child. Runs under the
    /// endpoint's breaker, through the retrying executor, and is cut short
    /// the moment `cancel` fires — which the caller does the instant its
    /// own wait deadline elapses, covering a child that hangs and never
    /// returns (spec §8 "wait timeout").
    #[allow(clippy::too_many_arguments)]
    async fn dispatch_one(
        repository: String,
        workflow: String,
        endpoint_key: String,
        inputs: BTreeMap<String, String>,
        dry_run: bool,
        runner: Arc<dyn WorkflowRunner>,
        breakers: Arc<BreakerManager>,
        retry: Arc<RetryExecutor>,
        metrics: Arc<FanOutMetrics>,
        handle: fanout_state::StateHandle,
        semaphore: Arc<Semaphore>,
        cancel: CancelToken,
        detailed_errors: Arc<Mutex<Vec<DetailedError>>>,
    ) {
        let Ok(_permit) = semaphore.acquire_owned().await else { return };

        let start_time = Utc::now();
        let call_instant = Instant::now();
        let _ = handle.update_child(&repository, &workflow, ChildWorkflowStatus::Running { start_time });
        metrics.child_started();

        let breaker = breakers.get(&endpoint_key);
        let admission = match breaker.admit() {
            Ok(admission) => admission,
            Err(_) => {
                let end_time = Utc::now();
                let _ = handle.update_child(&repository, &workflow, ChildWorkflowStatus::Failed {
                    start_time,
                    end_time,
                    error_message: "circuit breaker open".to_string(),
                });
                let _ = handle.resolve_waiting_status();
                metrics.child_failed(call_instant.elapsed());
                detailed_errors.lock().expect("detailed error mutex poisoned").push(DetailedError {
                    repository,
                    workflow,
                    run_id: None,
                    error_type: ErrorType::CircuitBreaker,
                    message: "circuit breaker open".to_string(),
                    start_time,
                    duration_ms: 0,
                    retry_count: 0,
                });
                return;
            }
        };

        let input = WorkflowInput { repository: repository.clone(), workflow: workflow.clone(), inputs, dry_run };
        let retries = AtomicU32::new(0);

        // `retry.execute` only races its inter-attempt sleep against
        // cancellation; a single hanging call to `runner` never gets a
        // chance to observe `cancel`. Race the whole attempt loop against
        // cancellation here instead, so a deadline-triggered `cancel.cancel()`
        // always cuts a stuck child short (spec §8 "wait timeout").
        let outcome = tokio::select! {
            res = retry.execute(
                &cancel,
                || {
                    let input = input.clone();
                    let runner = Arc::clone(&runner);
                    async move { runner.execute_workflow(input).await }
                },
                |attempt, _error| retries.store(attempt, Ordering::Relaxed),
            ) => Some(res),
            () = cancel.cancelled() => None,
        };

        let end_time = Utc::now();
        let duration_ms = u64::try_from(call_instant.elapsed().as_millis()).unwrap_or(u64::MAX);
        let retry_count = retries.load(Ordering::Relaxed);

        match outcome {
            None | Some(Err(RetryError::Cancelled { .. })) => {
                admission.failure();
                let _ = handle.update_child(&repository, &workflow, ChildWorkflowStatus::TimedOut { start_time, end_time });
                metrics.child_timed_out(call_instant.elapsed());
                detailed_errors.lock().expect("detailed error mutex poisoned").push(DetailedError {
                    repository,
                    workflow,
                    run_id: None,
                    error_type: ErrorType::Timeout,
                    message: "child workflow exceeded the fan-out timeout".to_string(),
                    start_time,
                    duration_ms,
                    retry_count,
                });
            }
            Some(Ok(Ok(exec))) if exec.success => {
                admission.success();
                let _ = handle.update_child(&repository, &workflow, ChildWorkflowStatus::Completed {
                    start_time,
                    end_time,
                    run_id: Some(exec.run_id),
                });
                metrics.child_succeeded(call_instant.elapsed());
            }
            Some(Ok(Ok(exec))) => {
                admission.success();
                let message = exec.message.unwrap_or_else(|| "workflow reported failure".to_string());
                let _ = handle.update_child(&repository, &workflow, ChildWorkflowStatus::Failed {
                    start_time,
                    end_time,
                    error_message: message.clone(),
                });
                metrics.child_failed(call_instant.elapsed());
                detailed_errors.lock().expect("detailed error mutex poisoned").push(DetailedError {
                    repository,
                    workflow,
                    run_id: Some(exec.run_id),
                    error_type: ErrorType::WorkflowFailed,
                    message,
                    start_time,
                    duration_ms,
                    retry_count,
                });
            }
            Some(Ok(Err(RetryError::Exhausted { last, .. }))) => {
                admission.failure();
                let message = last.message().to_string();
                let _ = handle.update_child(&repository, &workflow, ChildWorkflowStatus::Failed {
                    start_time,
                    end_time,
                    error_message: message.clone(),
                });
                metrics.child_failed(call_instant.elapsed());
                detailed_errors.lock().expect("detailed error mutex poisoned").push(DetailedError {
                    repository,
                    workflow,
                    run_id: None,
                    error_type: ErrorType::ExecutionFailed,
                    message,
                    start_time,
                    duration_ms,
                    retry_count,
                });
            }
        }

        let _ = handle.resolve_waiting_status();
    }
}

fn fresh_event_id() -> String {
    format!("evt-{:x}-{:016x}", Utc::now().timestamp_nanos_opt().unwrap_or_default(), rand::random::<u64>())
}

fn timestamp_fan_out_id(fingerprint: &str) -> String {
    let short = &fingerprint[..fingerprint.len().min(16)];
    format!("fanout-run-{:x}-{short}", Utc::now().timestamp_nanos_opt().unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_event_ids_are_unique() {
        assert_ne!(fresh_event_id(), fresh_event_id());
    }

    #[test]
    fn timestamp_ids_are_not_mistaken_for_idempotent_ids() {
        let id = timestamp_fan_out_id(&"a".repeat(64));
        assert!(!fanout_types::is_idempotent_id(&id));
    }
}
