//! Exponential backoff with jitter, shared by the retry executor (C4),
//! the orchestrator's state-poll wait loop (C6), and lock acquisition (C7).

use std::time::Duration;

use rand::Rng;

/// `min(initial * factor^attempt, max)`, then perturbed by `±jitter_percent`
/// (spec §4.4). `attempt` is zero-based (the delay before the *second*
/// attempt uses `attempt = 0`).
#[must_use]
pub fn delay_for_attempt(
    initial: Duration,
    max: Duration,
    factor: f64,
    jitter_percent: f64,
    attempt: u32,
) -> Duration {
    let base = (initial.as_secs_f64() * factor.powi(attempt as i32)).min(max.as_secs_f64());
    apply_jitter(Duration::from_secs_f64(base.max(0.0)), jitter_percent)
}

/// Perturb `base` by a uniform random factor in `[1 - jitter, 1 + jitter]`.
#[must_use]
pub fn apply_jitter(base: Duration, jitter_percent: f64) -> Duration {
    if jitter_percent <= 0.0 {
        return base;
    }
    let jitter = jitter_percent.clamp(0.0, 1.0);
    let factor = rand::thread_rng().gen_range((1.0 - jitter)..=(1.0 + jitter));
    Duration::from_secs_f64((base.as_secs_f64() * factor).max(0.0))
}

/// The 100ms-to-1s capped backoff used by the orchestrator's wait loops
/// when polling persisted state for a terminal status (spec §4.6 steps 3
/// and 10).
#[must_use]
pub fn poll_delay(attempt: u32) -> Duration {
    delay_for_attempt(Duration::from_millis(100), Duration::from_secs(1), 2.0, 0.0, attempt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_caps_at_max() {
        let d = delay_for_attempt(Duration::from_millis(100), Duration::from_secs(1), 2.0, 0.0, 10);
        assert!(d <= Duration::from_secs(1));
    }

    #[test]
    fn delay_grows_geometrically_before_cap() {
        let d0 = delay_for_attempt(Duration::from_millis(100), Duration::from_secs(10), 2.0, 0.0, 0);
        let d1 = delay_for_attempt(Duration::from_millis(100), Duration::from_secs(10), 2.0, 0.0, 1);
        assert_eq!(d0, Duration::from_millis(100));
        assert_eq!(d1, Duration::from_millis(200));
    }

    #[test]
    fn poll_delay_climbs_to_one_second() {
        assert!(poll_delay(0) <= Duration::from_secs(1));
        assert!(poll_delay(20) <= Duration::from_secs(1));
    }
}
