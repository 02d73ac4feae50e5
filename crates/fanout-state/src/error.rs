//! State store errors (spec §7 "Persistence").

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to persist fan-out state: {0}")]
    PersistFailed(#[from] std::io::Error),

    #[error("failed to (de)serialize fan-out state: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("no fan-out state found for id {0:?}")]
    NotFound(String),
}
