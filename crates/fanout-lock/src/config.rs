//! Lock manager configuration (spec §4.7).

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct LockConfig {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub ttl: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            max_retries: 50,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            ttl: Duration::from_secs(300),
        }
    }
}
