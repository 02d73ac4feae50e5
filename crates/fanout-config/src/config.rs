//! `FanOutConfig`: the layered configuration model for the fan-out core
//! (spec SPEC_FULL.md §A1). Precedence, lowest to highest:
//! built-in defaults -> `tako.toml` `[fanout]` table -> `TAKO_FANOUT_*`
//! environment variables -> CLI flags. Every resolved field records which
//! layer set it, following the `Config::discover`/`ConfigSource`
//! reporting convention in `config.rs`/`status.rs`.

use std::collections::BTreeMap;
use std::env;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;

use fanout_breaker::BreakerConfig;
use fanout_cleanup::CleanupConfig;
use fanout_lock::LockConfig;
use fanout_metrics::health::HealthThresholds;
use fanout_retry::RetryConfig;

use crate::error::ConfigError;
use crate::source::ConfigSource;

/// The file name searched for upward from the current directory, and the
/// table name within it (`[fanout]`), consistent with the
/// `.xchecker/config.toml` discovery convention in `config.rs`.
pub const CONFIG_FILE_NAME: &str = "tako.toml";
const ENV_PREFIX: &str = "TAKO_FANOUT_";

#[derive(Debug, Clone)]
pub struct FanOutConfig {
    pub state_dir: Utf8PathBuf,
    pub lock_dir: Utf8PathBuf,
    pub workspace_root: Utf8PathBuf,
    pub subscriptions_root: Utf8PathBuf,
    pub idempotency_enabled: bool,
    pub default_concurrency_limit: usize,
    pub default_child_timeout: Duration,
    pub filter_cache_capacity: usize,
    pub breaker: BreakerConfig,
    pub retry: RetryConfig,
    pub lock: LockConfig,
    pub cleanup: CleanupConfig,
    pub health: HealthThresholds,
    pub source_attribution: BTreeMap<String, ConfigSource>,
}

impl Default for FanOutConfig {
    fn default() -> Self {
        let mut source_attribution = BTreeMap::new();
        for field in FIELD_NAMES {
            source_attribution.insert((*field).to_string(), ConfigSource::Default);
        }
        Self {
            state_dir: Utf8PathBuf::from(".tako/fanout-states"),
            lock_dir: Utf8PathBuf::from(".tako/locks"),
            workspace_root: Utf8PathBuf::from(".tako/workspaces"),
            subscriptions_root: Utf8PathBuf::from(".tako/subscriptions"),
            idempotency_enabled: true,
            default_concurrency_limit: 0,
            default_child_timeout: Duration::from_secs(300),
            filter_cache_capacity: 500,
            breaker: BreakerConfig::default(),
            retry: RetryConfig::default(),
            lock: LockConfig::default(),
            cleanup: CleanupConfig::default(),
            health: HealthThresholds::default(),
            source_attribution,
        }
    }
}

const FIELD_NAMES: &[&str] = &[
    "state_dir",
    "lock_dir",
    "workspace_root",
    "subscriptions_root",
    "idempotency_enabled",
    "default_concurrency_limit",
    "default_child_timeout_secs",
    "filter_cache_capacity",
    "breaker_failure_threshold",
    "breaker_success_threshold",
    "breaker_timeout_secs",
    "breaker_max_requests",
    "retry_max_retries",
    "retry_initial_delay_ms",
    "retry_max_delay_ms",
    "retry_backoff_factor",
    "retry_jitter_percent",
    "lock_max_retries",
    "lock_ttl_secs",
    "cleanup_workspace_max_age_secs",
    "cleanup_idempotent_state_retention_secs",
    "cleanup_other_state_retention_secs",
    "health_degraded_error_rate_percent",
    "health_unhealthy_error_rate_percent",
    "health_degraded_p95_latency_ms",
    "health_unhealthy_p95_latency_ms",
];

/// The `[fanout]` table shape in `tako.toml`. Every field is optional:
/// only keys present in the file override the running default.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    #[serde(default)]
    fanout: FanoutTable,
}

#[derive(Debug, Default, Deserialize)]
struct FanoutTable {
    state_dir: Option<Utf8PathBuf>,
    lock_dir: Option<Utf8PathBuf>,
    workspace_root: Option<Utf8PathBuf>,
    subscriptions_root: Option<Utf8PathBuf>,
    idempotency_enabled: Option<bool>,
    default_concurrency_limit: Option<usize>,
    default_child_timeout_secs: Option<u64>,
    filter_cache_capacity: Option<usize>,
    breaker_failure_threshold: Option<u32>,
    breaker_success_threshold: Option<u32>,
    breaker_timeout_secs: Option<u64>,
    breaker_max_requests: Option<u32>,
    retry_max_retries: Option<u32>,
    retry_initial_delay_ms: Option<u64>,
    retry_max_delay_ms: Option<u64>,
    retry_backoff_factor: Option<f64>,
    retry_jitter_percent: Option<f64>,
    lock_max_retries: Option<u32>,
    lock_ttl_secs: Option<u64>,
    cleanup_workspace_max_age_secs: Option<u64>,
    cleanup_idempotent_state_retention_secs: Option<u64>,
    cleanup_other_state_retention_secs: Option<u64>,
    health_degraded_error_rate_percent: Option<f64>,
    health_unhealthy_error_rate_percent: Option<f64>,
    health_degraded_p95_latency_ms: Option<f64>,
    health_unhealthy_p95_latency_ms: Option<f64>,
}

/// CLI-sourced overrides, highest precedence. Every field mirrors one in
/// [`FanOutConfig`]; only `Some` fields override anything (spec SPEC_FULL.md
/// §A3 `tako fan-out run` flags plus top-level `--state-dir`/`--lock-dir`
/// style global flags).
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub config_path: Option<Utf8PathBuf>,
    pub state_dir: Option<Utf8PathBuf>,
    pub lock_dir: Option<Utf8PathBuf>,
    pub workspace_root: Option<Utf8PathBuf>,
    pub subscriptions_root: Option<Utf8PathBuf>,
    pub idempotency_enabled: Option<bool>,
    pub default_concurrency_limit: Option<usize>,
    pub default_child_timeout_secs: Option<u64>,
}

impl FanOutConfig {
    /// Discover and load configuration starting from the process's
    /// current directory (spec SPEC_FULL.md §A1). See [`Self::discover_from`]
    /// for the path-driven variant used by tests.
    pub fn discover(cli: &CliOverrides) -> Result<Self, ConfigError> {
        let start_dir = env::current_dir().map_err(ConfigError::CurrentDir)?;
        let start_dir = Utf8PathBuf::from_path_buf(start_dir).unwrap_or_else(|p| Utf8PathBuf::from(p.to_string_lossy().into_owned()));
        Self::discover_from(&start_dir, cli)
    }

    /// Path-driven discovery: avoids depending on the process's real
    /// current directory so tests can exercise discovery in an isolated
    /// temp tree (`discover_from` alongside `discover`).
    pub fn discover_from(start_dir: &Utf8Path, cli: &CliOverrides) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        let config_path = match &cli.config_path {
            Some(path) => Some(path.clone()),
            None => find_config_file(start_dir),
        };

        if let Some(path) = &config_path {
            let raw = std::fs::read_to_string(path.as_std_path()).map_err(|e| ConfigError::Read { path: path.clone(), source: e })?;
            let file: FileConfig = toml::from_str(&raw).map_err(|e| ConfigError::Parse { path: path.clone(), source: e })?;
            config.apply_file(file.fanout, ConfigSource::File(path.clone()));
        }

        config.apply_env()?;
        config.apply_cli(cli);
        Ok(config)
    }

    fn set_source(&mut self, field: &str, source: ConfigSource) {
        self.source_attribution.insert(field.to_string(), source);
    }

    fn apply_file(&mut self, t: FanoutTable, source: ConfigSource) {
        macro_rules! take {
            ($field:ident) => {
                if let Some(v) = t.$field {
                    self.$field = v;
                    self.set_source(stringify!($field), source.clone());
                }
            };
        }
        if let Some(v) = t.state_dir {
            self.state_dir = v;
            self.set_source("state_dir", source.clone());
        }
        if let Some(v) = t.lock_dir {
            self.lock_dir = v;
            self.set_source("lock_dir", source.clone());
        }
        if let Some(v) = t.workspace_root {
            self.workspace_root = v;
            self.set_source("workspace_root", source.clone());
        }
        if let Some(v) = t.subscriptions_root {
            self.subscriptions_root = v;
            self.set_source("subscriptions_root", source.clone());
        }
        take!(idempotency_enabled);
        take!(default_concurrency_limit);
        if let Some(v) = t.default_child_timeout_secs {
            self.default_child_timeout = Duration::from_secs(v);
            self.set_source("default_child_timeout_secs", source.clone());
        }
        take!(filter_cache_capacity);
        if let Some(v) = t.breaker_failure_threshold {
            self.breaker.failure_threshold = v;
            self.set_source("breaker_failure_threshold", source.clone());
        }
        if let Some(v) = t.breaker_success_threshold {
            self.breaker.success_threshold = v;
            self.set_source("breaker_success_threshold", source.clone());
        }
        if let Some(v) = t.breaker_timeout_secs {
            self.breaker.timeout = Duration::from_secs(v);
            self.set_source("breaker_timeout_secs", source.clone());
        }
        if let Some(v) = t.breaker_max_requests {
            self.breaker.max_requests = v;
            self.set_source("breaker_max_requests", source.clone());
        }
        if let Some(v) = t.retry_max_retries {
            self.retry.max_retries = v;
            self.set_source("retry_max_retries", source.clone());
        }
        if let Some(v) = t.retry_initial_delay_ms {
            self.retry.initial_delay = Duration::from_millis(v);
            self.set_source("retry_initial_delay_ms", source.clone());
        }
        if let Some(v) = t.retry_max_delay_ms {
            self.retry.max_delay = Duration::from_millis(v);
            self.set_source("retry_max_delay_ms", source.clone());
        }
        if let Some(v) = t.retry_backoff_factor {
            self.retry.backoff_factor = v;
            self.set_source("retry_backoff_factor", source.clone());
        }
        if let Some(v) = t.retry_jitter_percent {
            self.retry.jitter_percent = v;
            self.set_source("retry_jitter_percent", source.clone());
        }
        if let Some(v) = t.lock_max_retries {
            self.lock.max_retries = v;
            self.set_source("lock_max_retries", source.clone());
        }
        if let Some(v) = t.lock_ttl_secs {
            self.lock.ttl = Duration::from_secs(v);
            self.set_source("lock_ttl_secs", source.clone());
        }
        if let Some(v) = t.cleanup_workspace_max_age_secs {
            self.cleanup.workspace_max_age = Duration::from_secs(v);
            self.set_source("cleanup_workspace_max_age_secs", source.clone());
        }
        if let Some(v) = t.cleanup_idempotent_state_retention_secs {
            self.cleanup.idempotent_state_retention = Duration::from_secs(v);
            self.set_source("cleanup_idempotent_state_retention_secs", source.clone());
        }
        if let Some(v) = t.cleanup_other_state_retention_secs {
            self.cleanup.other_state_retention = Duration::from_secs(v);
            self.set_source("cleanup_other_state_retention_secs", source.clone());
        }
        if let Some(v) = t.health_degraded_error_rate_percent {
            self.health.degraded_error_rate_percent = v;
            self.set_source("health_degraded_error_rate_percent", source.clone());
        }
        if let Some(v) = t.health_unhealthy_error_rate_percent {
            self.health.unhealthy_error_rate_percent = v;
            self.set_source("health_unhealthy_error_rate_percent", source.clone());
        }
        if let Some(v) = t.health_degraded_p95_latency_ms {
            self.health.degraded_p95_latency_ms = v;
            self.set_source("health_degraded_p95_latency_ms", source.clone());
        }
        if let Some(v) = t.health_unhealthy_p95_latency_ms {
            self.health.unhealthy_p95_latency_ms = v;
            self.set_source("health_unhealthy_p95_latency_ms", source);
        }
    }

    /// `TAKO_FANOUT_*` environment overrides. Only the fields most likely
    /// to vary per-deployment (directories, concurrency, idempotency) are
    /// exposed this way; the rest are file/CLI-only.
    fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(v) = env::var(format!("{ENV_PREFIX}STATE_DIR")) {
            self.state_dir = Utf8PathBuf::from(v);
            self.set_source("state_dir", ConfigSource::Env);
        }
        if let Ok(v) = env::var(format!("{ENV_PREFIX}LOCK_DIR")) {
            self.lock_dir = Utf8PathBuf::from(v);
            self.set_source("lock_dir", ConfigSource::Env);
        }
        if let Ok(v) = env::var(format!("{ENV_PREFIX}WORKSPACE_ROOT")) {
            self.workspace_root = Utf8PathBuf::from(v);
            self.set_source("workspace_root", ConfigSource::Env);
        }
        if let Ok(v) = env::var(format!("{ENV_PREFIX}SUBSCRIPTIONS_ROOT")) {
            self.subscriptions_root = Utf8PathBuf::from(v);
            self.set_source("subscriptions_root", ConfigSource::Env);
        }
        if let Ok(v) = env::var(format!("{ENV_PREFIX}IDEMPOTENCY_ENABLED")) {
            let parsed = parse_bool(&v).ok_or_else(|| ConfigError::InvalidValue {
                field: "idempotency_enabled".to_string(),
                reason: format!("expected a boolean, got '{v}'"),
            })?;
            self.idempotency_enabled = parsed;
            self.set_source("idempotency_enabled", ConfigSource::Env);
        }
        if let Ok(v) = env::var(format!("{ENV_PREFIX}CONCURRENCY_LIMIT")) {
            let parsed = v.parse().map_err(|_| ConfigError::InvalidValue {
                field: "default_concurrency_limit".to_string(),
                reason: format!("expected a non-negative integer, got '{v}'"),
            })?;
            self.default_concurrency_limit = parsed;
            self.set_source("default_concurrency_limit", ConfigSource::Env);
        }
        Ok(())
    }

    fn apply_cli(&mut self, cli: &CliOverrides) {
        if let Some(v) = &cli.state_dir {
            self.state_dir = v.clone();
            self.set_source("state_dir", ConfigSource::Cli);
        }
        if let Some(v) = &cli.lock_dir {
            self.lock_dir = v.clone();
            self.set_source("lock_dir", ConfigSource::Cli);
        }
        if let Some(v) = &cli.workspace_root {
            self.workspace_root = v.clone();
            self.set_source("workspace_root", ConfigSource::Cli);
        }
        if let Some(v) = &cli.subscriptions_root {
            self.subscriptions_root = v.clone();
            self.set_source("subscriptions_root", ConfigSource::Cli);
        }
        if let Some(v) = cli.idempotency_enabled {
            self.idempotency_enabled = v;
            self.set_source("idempotency_enabled", ConfigSource::Cli);
        }
        if let Some(v) = cli.default_concurrency_limit {
            self.default_concurrency_limit = v;
            self.set_source("default_concurrency_limit", ConfigSource::Cli);
        }
        if let Some(v) = cli.default_child_timeout_secs {
            self.default_child_timeout = Duration::from_secs(v);
            self.set_source("default_child_timeout_secs", ConfigSource::Cli);
        }
    }
}

/// Search upward from `start_dir` for `tako.toml`, the same "search
/// upward from CWD" discovery used for `.xchecker/config.toml`.
fn find_config_file(start_dir: &Utf8Path) -> Option<Utf8PathBuf> {
    let mut dir = Some(start_dir);
    while let Some(d) = dir {
        let candidate = d.join(CONFIG_FILE_NAME);
        if candidate.as_std_path().is_file() {
            return Some(candidate);
        }
        dir = d.parent();
    }
    None
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
