//! The `tako-fanout fan-out run` command: build every C1-C9 collaborator
//! from a [`FanOutConfig`], wire the bundled discoverer/runner, and call
//! the orchestrator.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use camino::Utf8PathBuf;

use fanout_breaker::BreakerManager;
use fanout_config::FanOutConfig;
use fanout_event::SchemaRegistry;
use fanout_metrics::FanOutMetrics;
use fanout_orchestrator::{FanOutOrchestrator, OrchestratorConfig};
use fanout_retry::RetryExecutor;
use fanout_state::StateStore;
use fanout_subscription::FilterCache;
use fanout_types::{FanOutResult, Value};

use crate::discoverer::FileSystemDiscoverer;
use crate::error::CliError;
use crate::runner::SimulatedWorkflowRunner;

/// The shared collaborators a CLI invocation needs, kept alive for the
/// whole process so dispatch tasks spawned by `run` can outlive a single
/// command when `--wait` isn't passed.
pub struct Runtime {
    pub state_store: Arc<StateStore>,
    pub breakers: Arc<BreakerManager>,
    pub metrics: Arc<FanOutMetrics>,
    orchestrator: FanOutOrchestrator,
}

impl Runtime {
    pub fn build(config: &FanOutConfig, dry_run: bool) -> Result<Self, CliError> {
        let schema_registry = Arc::new(SchemaRegistry::new());
        let filter_cache = Arc::new(FilterCache::new(config.filter_cache_capacity));
        let state_store = Arc::new(StateStore::new(config.state_dir.clone())?);
        let breakers = Arc::new(BreakerManager::new(config.breaker));
        let retry = Arc::new(RetryExecutor::new(config.retry.clone()));
        let metrics = Arc::new(FanOutMetrics::new());

        let discoverer = Arc::new(FileSystemDiscoverer::new(config.subscriptions_root.clone()));
        let runner = Arc::new(SimulatedWorkflowRunner::new());

        let orchestrator_config = OrchestratorConfig {
            idempotency_enabled: config.idempotency_enabled,
            default_timeout: config.default_child_timeout,
            dry_run,
        };

        let orchestrator = FanOutOrchestrator::new(
            discoverer,
            runner,
            schema_registry,
            filter_cache,
            Arc::clone(&state_store),
            Arc::clone(&breakers),
            retry,
            Arc::clone(&metrics),
            orchestrator_config,
        );

        Ok(Self { state_store, breakers, metrics, orchestrator })
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn run(
        &self,
        event_type: String,
        source_repo: String,
        payload: Value,
        wait: bool,
        timeout: Option<Duration>,
        concurrency: Option<usize>,
        schema_version: Option<String>,
    ) -> Result<FanOutResult, CliError> {
        let mut with = BTreeMap::new();
        with.insert("event_type".to_string(), Value::String(event_type));
        with.insert("wait_for_children".to_string(), Value::Bool(wait));
        with.insert("payload".to_string(), payload);
        if let Some(timeout) = timeout {
            with.insert("timeout".to_string(), Value::String(format!("{}ms", timeout.as_millis())));
        }
        if let Some(concurrency) = concurrency {
            #[allow(clippy::cast_precision_loss)]
            with.insert("concurrency_limit".to_string(), Value::Number(concurrency as f64));
        }
        if let Some(schema_version) = schema_version {
            with.insert("schema_version".to_string(), Value::String(schema_version));
        }

        let result = self.orchestrator.call(&with, &source_repo, None, None).await?;
        Ok(result)
    }
}

/// Load a JSON payload file into a [`Value`], defaulting to an empty
/// object when no path is given (spec SPEC_FULL.md §A3 `--payload-file`).
pub fn load_payload(path: Option<&Utf8PathBuf>) -> Result<Value, CliError> {
    let Some(path) = path else { return Ok(Value::Object(BTreeMap::new())) };
    let raw = std::fs::read_to_string(path.as_std_path())
        .map_err(|e| CliError::PayloadRead { path: path.to_string(), source: e })?;
    let json: serde_json::Value =
        serde_json::from_str(&raw).map_err(|e| CliError::PayloadParse { path: path.to_string(), source: e })?;
    Ok(json_to_value(&json))
}

fn json_to_value(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or_default()),
        serde_json::Value::String(s) => Value::String(s.clone()),
        serde_json::Value::Array(items) => Value::Array(items.iter().map(json_to_value).collect()),
        serde_json::Value::Object(map) => {
            Value::Object(map.iter().map(|(k, v)| (k.clone(), json_to_value(v))).collect())
        }
    }
}

/// Parse the same Go-style duration grammar the orchestrator's step
/// parameters use (spec §4.6 step 1), for the CLI's own `--timeout`/
/// `--older-than` flags.
pub fn parse_duration_flag(s: &str) -> Result<Duration, CliError> {
    let trimmed = s.trim();
    if trimmed == "0" {
        return Ok(Duration::ZERO);
    }

    let mut total = Duration::ZERO;
    let mut rest = trimmed;
    let mut matched_any = false;

    while !rest.is_empty() {
        let digits_end = rest.find(|c: char| !c.is_ascii_digit() && c != '.').unwrap_or(rest.len());
        if digits_end == 0 {
            return Err(CliError::InvalidArgument(format!("invalid duration '{s}'")));
        }
        let (number, after_number) = rest.split_at(digits_end);
        let unit_end = after_number.find(|c: char| c.is_ascii_digit()).unwrap_or(after_number.len());
        let (unit, after_unit) = after_number.split_at(unit_end);

        let value: f64 = number.parse().map_err(|_| CliError::InvalidArgument(format!("invalid duration '{s}'")))?;
        let unit_secs = match unit {
            "ms" => 0.001,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            _ => return Err(CliError::InvalidArgument(format!("invalid duration unit '{unit}' in '{s}'"))),
        };
        total += Duration::from_secs_f64(value * unit_secs);
        matched_any = true;
        rest = after_unit;
    }

    if !matched_any {
        return Err(CliError::InvalidArgument(format!("invalid duration '{s}'")));
    }
    Ok(total)
}
