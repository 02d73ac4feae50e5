//! Cleanup retention configuration (spec §4.5 "Classification", §4.9).

use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct CleanupConfig {
    /// How long a child workspace may sit idle before it's eligible for
    /// removal, provided nothing still locks or references it.
    pub workspace_max_age: Duration,
    /// Retention for terminal states whose id is fingerprint-derived
    /// (`fanout-<64-hex>`). Default: 24h.
    pub idempotent_state_retention: Duration,
    /// Retention for terminal states with any other id shape. Defaults
    /// shorter than the idempotent window since non-idempotent runs have
    /// no dedup value once terminal.
    pub other_state_retention: Duration,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            workspace_max_age: Duration::from_secs(24 * 3600),
            idempotent_state_retention: Duration::from_secs(24 * 3600),
            other_state_retention: Duration::from_secs(3600),
        }
    }
}
