//! Facade combining counters and latency reservoirs for both fan-outs and
//! their children (spec §4.8). Recording is lock-free on the counter path
//! and mutex-guarded but O(1) on the latency path.

use std::time::Duration;

use crate::counters::{CounterSnapshot, Counters};
use crate::latency::LatencyReservoir;

#[derive(Debug, Default)]
pub struct FanOutMetrics {
    counters: Counters,
    fan_out_latency: LatencyReservoir,
    child_latency: LatencyReservoir,
}

#[derive(Debug, Clone, Copy)]
pub struct MetricsSnapshot {
    pub counters: CounterSnapshot,
    pub fan_out_p50_ms: f64,
    pub fan_out_p95_ms: f64,
    pub child_p50_ms: f64,
    pub child_p95_ms: f64,
}

impl FanOutMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fan_out_started(&self) {
        self.counters.fan_out_started();
    }

    pub fn fan_out_succeeded(&self, elapsed: Duration) {
        self.counters.fan_out_succeeded();
        self.fan_out_latency.record(elapsed);
    }

    pub fn fan_out_failed(&self, elapsed: Duration) {
        self.counters.fan_out_failed();
        self.fan_out_latency.record(elapsed);
    }

    pub fn child_started(&self) {
        self.counters.child_started();
    }

    pub fn child_succeeded(&self, elapsed: Duration) {
        self.counters.child_succeeded();
        self.child_latency.record(elapsed);
    }

    pub fn child_failed(&self, elapsed: Duration) {
        self.counters.child_failed();
        self.child_latency.record(elapsed);
    }

    pub fn child_timed_out(&self, elapsed: Duration) {
        self.counters.child_timed_out();
        self.child_latency.record(elapsed);
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            counters: self.counters.snapshot(),
            fan_out_p50_ms: self.fan_out_latency.p50(),
            fan_out_p95_ms: self.fan_out_latency.p95(),
            child_p50_ms: self.child_latency.p50(),
            child_p95_ms: self.child_latency.p95(),
        }
    }
}
