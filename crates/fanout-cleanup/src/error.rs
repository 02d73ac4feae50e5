//! Cleanup errors (spec §4.9).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CleanupError {
    #[error("cleanup I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("state store failure during cleanup: {0}")]
    State(#[from] fanout_state::StateError),

    #[error("lock manager failure during cleanup: {0}")]
    Lock(#[from] fanout_lock::LockError),
}
