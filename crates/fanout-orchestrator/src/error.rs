//! Orchestrator-level errors (spec §4.6, §7).

use thiserror::Error;

use fanout_event::EventError;
use fanout_state::StateError;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("missing required parameter {0:?}")]
    ParamMissing(String),

    #[error("parameter {field}: expected {wanted}, got {got}")]
    ParamInvalid { field: String, wanted: String, got: String },

    #[error("could not parse {0:?} as a duration")]
    TimeoutParseError(String),

    #[error(transparent)]
    Schema(#[from] EventError),

    #[error("subscriber discovery failed: {0}")]
    DiscoveryFailed(String),

    #[error(transparent)]
    State(#[from] StateError),
}
