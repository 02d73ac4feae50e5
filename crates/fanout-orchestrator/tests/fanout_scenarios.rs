//! End-to-end exercises of the six concrete fan-out scenarios: happy
//! path, filter rejection, diamond resolution, duplicate-event
//! idempotency, breaker-open-after-retries-exhausted, and wait timeout.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use fanout_breaker::{BreakerConfig, BreakerManager};
use fanout_event::SchemaRegistry;
use fanout_metrics::FanOutMetrics;
use fanout_orchestrator::{
    discoverer::{DiscoveryError, SubscriptionDiscoverer},
    runner::{ExecutionResult, WorkflowInput, WorkflowRunner},
    FanOutOrchestrator, OrchestratorConfig,
};
use fanout_retry::{CallError, RetryConfig, RetryExecutor};
use fanout_state::StateStore;
use fanout_subscription::FilterCache;
use fanout_types::{Subscription, SubscriptionMatch, Value};

/// A discoverer that hands back a fixed candidate list, the harness's
/// stand-in for the pluggable discovery backend (spec §6).
struct FixedDiscoverer(Vec<SubscriptionMatch>);

#[async_trait]
impl SubscriptionDiscoverer for FixedDiscoverer {
    async fn find_subscribers(&self, _artifact: &str, _event_type: &str) -> Result<Vec<SubscriptionMatch>, DiscoveryError> {
        Ok(self.0.clone())
    }
}

/// What [`ScriptedRunner`] should do for one `repo:workflow` endpoint.
#[derive(Clone)]
enum Script {
    Succeed,
    Fail(String),
    Hang,
}

/// A workflow runner whose behavior per endpoint is fixed up front, plus
/// a call counter so tests can assert how many times each endpoint was
/// actually invoked (idempotency, circuit breaking).
struct ScriptedRunner {
    scripts: BTreeMap<String, Script>,
    calls: Mutex<BTreeMap<String, u32>>,
}

impl ScriptedRunner {
    fn new(scripts: &[(&str, Script)]) -> Self {
        Self {
            scripts: scripts.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
            calls: Mutex::new(BTreeMap::new()),
        }
    }

    fn call_count(&self, endpoint: &str) -> u32 {
        *self.calls.lock().unwrap().get(endpoint).unwrap_or(&0)
    }
}

#[async_trait]
impl WorkflowRunner for ScriptedRunner {
    async fn execute_workflow(&self, input: WorkflowInput) -> Result<ExecutionResult, CallError> {
        let endpoint = format!("{}:{}", input.repository, input.workflow);
        *self.calls.lock().unwrap().entry(endpoint.clone()).or_insert(0) += 1;

        match self.scripts.get(&endpoint) {
            Some(Script::Fail(message)) => Err(CallError::Transient(message.clone())),
            Some(Script::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                unreachable!("cancellation should cut this short before it wakes")
            }
            _ => Ok(ExecutionResult { run_id: format!("run-{}", next_run_id()), success: true, message: None }),
        }
    }
}

fn next_run_id() -> u32 {
    static COUNTER: AtomicU32 = AtomicU32::new(0);
    COUNTER.fetch_add(1, Ordering::Relaxed)
}

fn subscription(artifact: &str, workflow: &str, filters: &[&str]) -> Subscription {
    Subscription {
        artifact: artifact.to_string(),
        events: vec!["release.published".to_string()],
        workflow: workflow.to_string(),
        schema_version: None,
        filters: filters.iter().map(|f| f.to_string()).collect(),
        inputs: BTreeMap::new(),
    }
}

fn matched(repository: &str, workflow: &str, filters: &[&str]) -> SubscriptionMatch {
    SubscriptionMatch {
        subscription: subscription(&format!("{repository}:default"), workflow, filters),
        repository: repository.to_string(),
        local_path: format!("/tmp/{repository}"),
    }
}

fn payload(pairs: &[(&str, Value)]) -> Value {
    Value::Object(pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect())
}

fn with(event_type: &str, wait: bool, timeout: Option<&str>, payload: Value) -> BTreeMap<String, Value> {
    let mut map = BTreeMap::new();
    map.insert("event_type".to_string(), Value::String(event_type.to_string()));
    map.insert("wait_for_children".to_string(), Value::Bool(wait));
    map.insert("payload".to_string(), payload);
    if let Some(t) = timeout {
        map.insert("timeout".to_string(), Value::String(t.to_string()));
    }
    map
}

fn build_orchestrator(
    discoverer: FixedDiscoverer,
    runner: Arc<ScriptedRunner>,
    state_dir: &camino::Utf8Path,
    breaker: BreakerConfig,
    retry: RetryConfig,
) -> FanOutOrchestrator {
    FanOutOrchestrator::new(
        Arc::new(discoverer),
        runner,
        Arc::new(SchemaRegistry::new()),
        Arc::new(FilterCache::new(100)),
        Arc::new(StateStore::new(state_dir.to_owned()).unwrap()),
        Arc::new(BreakerManager::new(breaker)),
        Arc::new(RetryExecutor::new(retry)),
        Arc::new(FanOutMetrics::new()),
        OrchestratorConfig { idempotency_enabled: true, default_timeout: Duration::from_secs(30), dry_run: true },
    )
}

fn tempdir() -> (tempfile::TempDir, camino::Utf8PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = camino::Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
    (dir, path)
}

#[tokio::test]
async fn happy_path_two_subscribers() {
    let (_dir, state_dir) = tempdir();
    let discoverer = FixedDiscoverer(vec![matched("org/a", "build", &[]), matched("org/b", "build", &[])]);
    let runner = Arc::new(ScriptedRunner::new(&[]));
    let orchestrator = build_orchestrator(discoverer, runner, &state_dir, BreakerConfig::default(), RetryConfig::default());

    let with = with("release.published", true, None, payload(&[]));
    let result = orchestrator.call(&with, "org/source", None, None).await.unwrap();

    assert_eq!(result.triggered_count, 2);
    assert_eq!(result.subscribers_found, 2);
    assert!(result.errors.is_empty());
    assert!(result.success);
}

#[tokio::test]
async fn filter_rejects_a_subscriber_missing_its_required_field() {
    let (_dir, state_dir) = tempdir();
    let discoverer = FixedDiscoverer(vec![matched("org/a", "build", &["payload.version != null"])]);
    let runner = Arc::new(ScriptedRunner::new(&[]));
    let orchestrator = build_orchestrator(discoverer, runner, &state_dir, BreakerConfig::default(), RetryConfig::default());

    let with = with("release.published", true, None, payload(&[]));
    let result = orchestrator.call(&with, "org/source", None, None).await.unwrap();

    assert_eq!(result.triggered_count, 0);
    assert!(result.success);
}

#[tokio::test]
async fn diamond_resolution_picks_the_lexicographically_first_repository() {
    let (_dir, state_dir) = tempdir();
    let filters = ["payload.version != null"];
    let discoverer = FixedDiscoverer(vec![matched("org/r2", "build", &filters), matched("org/r1", "build", &filters)]);
    let runner = Arc::new(ScriptedRunner::new(&[]));
    let orchestrator = build_orchestrator(discoverer, runner, &state_dir, BreakerConfig::default(), RetryConfig::default());

    let with = with("release.published", true, None, payload(&[("version", Value::String("2.1.0".to_string()))]));
    let result = orchestrator.call(&with, "org/source", None, None).await.unwrap();

    assert_eq!(result.triggered_count, 1);
    assert_eq!(result.children_summary.len(), 1);
    assert_eq!(result.children_summary[0].repository, "org/r1");
}

#[tokio::test]
async fn duplicate_event_with_idempotency_on_skips_the_second_dispatch() {
    let (_dir, state_dir) = tempdir();
    let discoverer = FixedDiscoverer(vec![matched("org/a", "build", &[])]);
    let runner = Arc::new(ScriptedRunner::new(&[]));
    let orchestrator = build_orchestrator(discoverer, runner.clone(), &state_dir, BreakerConfig::default(), RetryConfig::default());

    let params = with("release.published", true, None, payload(&[("version", Value::String("2.1.0".to_string()))]));

    let first = orchestrator.call(&params, "org/source", None, None).await.unwrap();
    let second = orchestrator.call(&params, "org/source", None, None).await.unwrap();

    assert_eq!(first.fan_out_id, second.fan_out_id);
    assert_eq!(second.triggered_count, 0);
    assert_eq!(runner.call_count("org/a:build"), 1);
}

#[tokio::test]
async fn breaker_opens_once_failures_exhaust_retries() {
    let (_dir, state_dir) = tempdir();
    let discoverer = FixedDiscoverer(vec![matched("org/x", "build", &[])]);
    let runner = Arc::new(ScriptedRunner::new(&[("org/x:build", Script::Fail("boom".to_string()))]));
    let breaker = BreakerConfig { failure_threshold: 2, success_threshold: 2, timeout: Duration::from_secs(30), max_requests: 1 };
    let retry = RetryConfig {
        max_retries: 1,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        backoff_factor: 2.0,
        jitter_percent: 0.0,
        retryable_patterns: Vec::new(),
    };
    let orchestrator = build_orchestrator(discoverer, runner.clone(), &state_dir, breaker, retry);

    // First call: two attempts (maxRetries = 1), both fail, tripping the
    // endpoint's breaker open (failureThreshold = 2).
    let first_params = with("release.published", true, None, payload(&[("run", Value::String("first".to_string()))]));
    let first = orchestrator.call(&first_params, "org/source", None, None).await.unwrap();
    assert_eq!(first.children_summary[0].status, "failed");
    assert_eq!(runner.call_count("org/x:build"), 2);

    // Second call, same endpoint, same orchestrator (breaker state is
    // shared across calls within a process): rejected by the now-open
    // breaker without ever reaching the runner again.
    let second_params = with("release.published", true, None, payload(&[("run", Value::String("second".to_string()))]));
    let second = orchestrator.call(&second_params, "org/source", None, None).await.unwrap();
    assert_eq!(second.children_summary[0].status, "failed");
    assert_eq!(runner.call_count("org/x:build"), 2, "breaker should have rejected without calling the runner again");
}

#[tokio::test]
async fn a_malformed_filter_on_one_subscriber_fails_the_result_even_though_its_child_completes() {
    let (_dir, state_dir) = tempdir();
    // `org/bad`'s filter does not parse; `org/good` has no filter and
    // should still run and succeed. Step 7 records the compile error
    // per-subscriber and drops only that candidate (spec §4.2, §7) — but
    // the overall result must not report `success = true` while `errors`
    // is non-empty (spec §7).
    let discoverer = FixedDiscoverer(vec![matched("org/bad", "build", &["("]), matched("org/good", "build", &[])]);
    let runner = Arc::new(ScriptedRunner::new(&[]));
    let orchestrator = build_orchestrator(discoverer, runner.clone(), &state_dir, BreakerConfig::default(), RetryConfig::default());

    let with = with("release.published", true, None, payload(&[]));
    let result = orchestrator.call(&with, "org/source", None, None).await.unwrap();

    assert_eq!(result.triggered_count, 1);
    assert_eq!(runner.call_count("org/good:build"), 1);
    assert_eq!(result.children_summary[0].status, "completed");
    assert!(!result.errors.is_empty());
    assert!(!result.success, "a non-empty errors list must not coexist with success = true");
}

#[tokio::test]
async fn wait_timeout_leaves_a_hung_child_timed_out() {
    let (_dir, state_dir) = tempdir();
    let discoverer = FixedDiscoverer(vec![matched("org/slow", "build", &[])]);
    let runner = Arc::new(ScriptedRunner::new(&[("org/slow:build", Script::Hang)]));
    let orchestrator = build_orchestrator(discoverer, runner, &state_dir, BreakerConfig::default(), RetryConfig::default());

    let params = with("release.published", true, Some("100ms"), payload(&[]));
    let result = orchestrator.call(&params, "org/source", None, None).await.unwrap();

    assert!(result.timeout_exceeded);
}
