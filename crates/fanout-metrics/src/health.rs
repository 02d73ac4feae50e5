//! Health classification from counters, latency, and breaker state (spec
//! §4.8 "Health classifier").

use fanout_breaker::BreakerManager;

use crate::counters::CounterSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct HealthThresholds {
    pub degraded_error_rate_percent: f64,
    pub unhealthy_error_rate_percent: f64,
    pub degraded_p95_latency_ms: f64,
    pub unhealthy_p95_latency_ms: f64,
    pub max_active_operations: u64,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            degraded_error_rate_percent: 10.0,
            unhealthy_error_rate_percent: 50.0,
            degraded_p95_latency_ms: 5_000.0,
            unhealthy_p95_latency_ms: 30_000.0,
            max_active_operations: 1_000,
        }
    }
}

/// Worst status wins: any open breaker is at least `Degraded`; breaching
/// an `unhealthy` threshold outranks a merely `degraded` one.
#[must_use]
pub fn classify(
    counters: CounterSnapshot,
    fan_out_p95_ms: f64,
    breakers: &BreakerManager,
    thresholds: HealthThresholds,
) -> HealthReport {
    let mut status = HealthStatus::Healthy;
    let mut reasons = Vec::new();

    let error_rate = counters.fan_out_error_rate();
    if error_rate >= thresholds.unhealthy_error_rate_percent {
        status = status.max(HealthStatus::Unhealthy);
        reasons.push(format!("fan-out error rate {error_rate:.1}% >= unhealthy threshold {:.1}%", thresholds.unhealthy_error_rate_percent));
    } else if error_rate >= thresholds.degraded_error_rate_percent {
        status = status.max(HealthStatus::Degraded);
        reasons.push(format!("fan-out error rate {error_rate:.1}% >= degraded threshold {:.1}%", thresholds.degraded_error_rate_percent));
    }

    if fan_out_p95_ms >= thresholds.unhealthy_p95_latency_ms {
        status = status.max(HealthStatus::Unhealthy);
        reasons.push(format!("fan-out P95 latency {fan_out_p95_ms:.0}ms >= unhealthy threshold {:.0}ms", thresholds.unhealthy_p95_latency_ms));
    } else if fan_out_p95_ms >= thresholds.degraded_p95_latency_ms {
        status = status.max(HealthStatus::Degraded);
        reasons.push(format!("fan-out P95 latency {fan_out_p95_ms:.0}ms >= degraded threshold {:.0}ms", thresholds.degraded_p95_latency_ms));
    }

    if counters.fanouts_active > thresholds.max_active_operations {
        status = status.max(HealthStatus::Degraded);
        reasons.push(format!("{} active fan-outs exceeds configured ceiling {}", counters.fanouts_active, thresholds.max_active_operations));
    }

    let open = breakers.open_endpoints();
    if !open.is_empty() {
        status = status.max(HealthStatus::Degraded);
        reasons.push(format!("{} circuit breaker(s) open: {}", open.len(), open.join(", ")));
    }

    if reasons.is_empty() {
        reasons.push("all signals within thresholds".to_string());
    }

    HealthReport { status, reasons }
}
