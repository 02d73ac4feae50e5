//! Aggregated CLI error type and exit-code mapping (spec SPEC_FULL.md §A2),
//! following the `XCheckerError` + `exit_codes::codes` pattern: one error
//! enum per crate, `#[from]`-aggregated here, with a small distinct exit
//! code per failure category.

use thiserror::Error;

use fanout_cleanup::CleanupError;
use fanout_config::ConfigError;
use fanout_lock::LockError;
use fanout_orchestrator::OrchestratorError;
use fanout_state::StateError;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Cleanup(#[from] CleanupError),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("no fan-out found for id or fingerprint '{0}'")]
    NotFound(String),

    #[error("failed to read payload file {path}: {source}")]
    PayloadRead { path: String, #[source] source: std::io::Error },

    #[error("failed to parse payload file {path}: {source}")]
    PayloadParse { path: String, #[source] source: serde_json::Error },
}

/// Exit code constants for `tako-fanout`, following the `exit_codes::codes`
/// module convention: distinct small integers per failure category so
/// scripts invoking the CLI can branch on them.
pub mod codes {
    pub const SUCCESS: i32 = 0;
    pub const CLI_ARGS: i32 = 2;
    pub const LOCK_HELD: i32 = 9;
    pub const DISCOVERY_FAILED: i32 = 20;
    pub const DISPATCH_ERROR: i32 = 21;
    pub const TIMEOUT: i32 = 22;
    pub const NOT_FOUND: i32 = 23;
    pub const INTERNAL: i32 = 70;
}

impl CliError {
    #[must_use]
    pub fn to_exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::InvalidArgument(_) | Self::PayloadRead { .. } | Self::PayloadParse { .. } => codes::CLI_ARGS,
            Self::Lock(_) => codes::LOCK_HELD,
            Self::NotFound(_) => codes::NOT_FOUND,
            Self::Orchestrator(OrchestratorError::DiscoveryFailed(_)) => codes::DISCOVERY_FAILED,
            Self::Orchestrator(OrchestratorError::TimeoutParseError(_)) => codes::CLI_ARGS,
            Self::Orchestrator(_) => codes::DISPATCH_ERROR,
            Self::State(_) | Self::Cleanup(_) => codes::INTERNAL,
        }
    }
}
