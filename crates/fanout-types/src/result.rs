//! Fan-out call result shape (spec §4.6, §4.9, §7).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state::FanOutState;

/// Classification of a per-child dispatch failure (spec §4.6 step 11).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    ExecutionFailed,
    WorkflowFailed,
    CircuitBreaker,
    Timeout,
}

/// One entry in `FanOutResult::detailed_errors`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailedError {
    pub repository: String,
    pub workflow: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    pub error_type: ErrorType,
    pub message: String,
    pub start_time: DateTime<Utc>,
    pub duration_ms: u64,
    pub retry_count: u32,
}

/// Per-child summary exposed on [`FanOutResult`] and status reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChildSummary {
    pub repository: String,
    pub workflow: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
}

/// Output of a fan-out call (spec §4.6 "Output").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FanOutResult {
    pub success: bool,
    pub event_emitted: bool,
    pub subscribers_found: usize,
    pub triggered_count: usize,
    pub errors: Vec<String>,
    pub detailed_errors: Vec<DetailedError>,
    pub start_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    pub fan_out_id: String,
    pub timeout_exceeded: bool,
    pub children_summary: Vec<ChildSummary>,
}

impl FanOutResult {
    /// Build a result from persisted state, as done when a duplicate call
    /// short-circuits onto a prior outcome (spec §4.6 step 3) or when the
    /// dispatch loop has finished (step 11).
    #[must_use]
    pub fn from_state(state: &FanOutState, triggered_count: usize, subscribers_found: usize, timeout_exceeded: bool) -> Self {
        let children_summary = state
            .children
            .values()
            .map(|child| ChildSummary {
                repository: child.repository.clone(),
                workflow: child.workflow.clone(),
                status: child.status.label().to_string(),
                run_id: match &child.status {
                    crate::state::ChildWorkflowStatus::Completed { run_id, .. } => run_id.clone(),
                    _ => None,
                },
            })
            .collect();

        let errors: Vec<String> = match &state.status {
            crate::state::FanOutStatus::Failed { error_message, .. } => vec![error_message.clone()],
            _ => Vec::new(),
        };

        Self {
            success: errors.is_empty() && matches!(state.status, crate::state::FanOutStatus::Completed { .. }),
            event_emitted: true,
            subscribers_found,
            triggered_count,
            errors,
            detailed_errors: Vec::new(),
            start_time: state.start_time,
            end_time: state.status.end_time(),
            fan_out_id: state.id.clone(),
            timeout_exceeded,
            children_summary,
        }
    }
}
