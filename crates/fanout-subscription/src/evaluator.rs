//! Subscription matching (spec §4.2 "Matching order").

use fanout_types::{Event, Subscription};

use crate::error::SubscriptionError;
use crate::filter::FilterCache;
use crate::version_range::check_compatibility;

/// `evaluate(subscription, event) -> bool`: (a) event type membership,
/// (b) schema version compatibility, (c) every filter is true.
pub fn evaluate(
    cache: &FilterCache,
    subscription: &Subscription,
    event: &Event,
) -> Result<bool, SubscriptionError> {
    if !subscription.events.iter().any(|e| e == &event.event_type) {
        return Ok(false);
    }

    if subscription.schema_version.is_some() {
        let (compatible, _reason) =
            check_compatibility(event.schema_version(), subscription.schema_version.as_deref())?;
        if !compatible {
            return Ok(false);
        }
    }

    for filter in &subscription.filters {
        let program = cache.get_or_compile(filter)?;
        if !crate::filter::evaluate(&program, event)? {
            return Ok(false);
        }
    }

    Ok(true)
}
