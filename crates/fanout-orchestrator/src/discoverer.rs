//! `SubscriptionDiscoverer`: the pluggable component that, given an
//! artifact and event type, returns candidate subscribers (spec §6).

use async_trait::async_trait;
use thiserror::Error;

use fanout_types::SubscriptionMatch;

#[derive(Debug, Error)]
#[error("{0}")]
pub struct DiscoveryError(pub String);

/// Injected discovery backend. The orchestrator never scans repositories
/// itself — it only asks this trait for candidates, the single seam
/// between the fan-out algorithm and any concrete provider.
#[async_trait]
pub trait SubscriptionDiscoverer: Send + Sync {
    async fn find_subscribers(
        &self,
        artifact: &str,
        event_type: &str,
    ) -> Result<Vec<SubscriptionMatch>, DiscoveryError>;
}

/// A discoverer that hands back a fixed, pre-computed list regardless of
/// its arguments — used when the caller already has the subscriber set
/// (spec §4.6 "using the pre-discovered list if provided").
pub struct StaticDiscoverer {
    matches: Vec<SubscriptionMatch>,
}

impl StaticDiscoverer {
    #[must_use]
    pub fn new(matches: Vec<SubscriptionMatch>) -> Self {
        Self { matches }
    }
}

#[async_trait]
impl SubscriptionDiscoverer for StaticDiscoverer {
    async fn find_subscribers(
        &self,
        _artifact: &str,
        _event_type: &str,
    ) -> Result<Vec<SubscriptionMatch>, DiscoveryError> {
        Ok(self.matches.clone())
    }
}
