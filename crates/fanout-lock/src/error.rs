//! Lock manager errors (spec §4.7, §7 "Persistence").

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("timed out acquiring {mode:?} lock on {repository}")]
    AcquireTimeout { repository: String, mode: fanout_types::LockMode },

    #[error("cancelled while acquiring {mode:?} lock on {repository}")]
    Cancelled { repository: String, mode: fanout_types::LockMode },

    #[error("lock I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("lock record serialization failure: {0}")]
    Serde(#[from] serde_json::Error),
}
