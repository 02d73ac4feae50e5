//! Persisted fan-out and child workflow state (spec §3, §4.5).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of a fan-out as a whole. Transitions are one-way: `Pending ->
/// Running -> (Waiting ->)? {Completed | Failed | TimedOut}`. Only the
/// terminal variants and `Waiting` carry the fields that are meaningless
/// before the state reaches them, so an illegal field combination (e.g. an
/// `endTime` on a `Pending` state) can't be constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum FanOutStatus {
    Pending,
    Running,
    Waiting,
    Completed { end_time: DateTime<Utc> },
    Failed { end_time: DateTime<Utc>, error_message: String },
    TimedOut { end_time: DateTime<Utc> },
}

impl FanOutStatus {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Failed { .. } | Self::TimedOut { .. })
    }

    #[must_use]
    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Completed { end_time }
            | Self::Failed { end_time, .. }
            | Self::TimedOut { end_time } => Some(*end_time),
            _ => None,
        }
    }

    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Waiting => "waiting",
            Self::Completed { .. } => "completed",
            Self::Failed { .. } => "failed",
            Self::TimedOut { .. } => "timedOut",
        }
    }
}

/// Status of a single child workflow dispatch. Same tagged-terminal
/// discipline as [`FanOutStatus`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ChildWorkflowStatus {
    Pending,
    Running { start_time: DateTime<Utc> },
    Completed { start_time: DateTime<Utc>, end_time: DateTime<Utc>, run_id: Option<String> },
    Failed { start_time: DateTime<Utc>, end_time: DateTime<Utc>, error_message: String },
    TimedOut { start_time: DateTime<Utc>, end_time: DateTime<Utc> },
}

impl ChildWorkflowStatus {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Failed { .. } | Self::TimedOut { .. })
    }

    #[must_use]
    pub fn is_pending_or_running(&self) -> bool {
        matches!(self, Self::Pending | Self::Running { .. })
    }

    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running { .. } => "running",
            Self::Completed { .. } => "completed",
            Self::Failed { .. } => "failed",
            Self::TimedOut { .. } => "timedOut",
        }
    }
}

/// A single dispatched child workflow (spec §3 "Child workflow").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChildWorkflow {
    pub repository: String,
    pub workflow: String,
    pub status: ChildWorkflowStatus,
    #[serde(default)]
    pub inputs: BTreeMap<String, String>,
}

impl ChildWorkflow {
    #[must_use]
    pub fn new(repository: impl Into<String>, workflow: impl Into<String>, inputs: BTreeMap<String, String>) -> Self {
        Self {
            repository: repository.into(),
            workflow: workflow.into(),
            status: ChildWorkflowStatus::Pending,
            inputs,
        }
    }

    /// `"repo#workflow"`, the map key fan-out state keeps children under
    /// (spec §3 "Fan-out state").
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}#{}", self.repository, self.workflow)
    }
}

/// Persistent per-fan-out-call state (spec §3 "Fan-out state", §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FanOutState {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_run_id: Option<String>,
    pub source_repo: String,
    pub event_type: String,
    pub status: FanOutStatus,
    pub start_time: DateTime<Utc>,
    pub children: BTreeMap<String, ChildWorkflow>,
    pub waiting_for_all: bool,
    pub timeout_seconds: u64,
    pub fingerprint: String,
}

impl FanOutState {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        parent_run_id: Option<String>,
        source_repo: impl Into<String>,
        event_type: impl Into<String>,
        waiting_for_all: bool,
        timeout_seconds: u64,
        fingerprint: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            parent_run_id,
            source_repo: source_repo.into(),
            event_type: event_type.into(),
            status: FanOutStatus::Pending,
            start_time: Utc::now(),
            children: BTreeMap::new(),
            waiting_for_all,
            timeout_seconds,
            fingerprint: fingerprint.into(),
        }
    }

    /// Classification used by the cleanup reaper (spec §4.5 "Classification").
    #[must_use]
    pub fn is_idempotent(&self) -> bool {
        is_idempotent_id(&self.id)
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn start(&mut self) {
        if self.status == FanOutStatus::Pending {
            self.status = FanOutStatus::Running;
        }
    }

    pub fn start_waiting(&mut self) {
        if self.status == FanOutStatus::Running {
            self.status = FanOutStatus::Waiting;
        }
    }

    pub fn complete(&mut self) {
        if !self.status.is_terminal() {
            self.status = FanOutStatus::Completed { end_time: Utc::now() };
        }
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        if !self.status.is_terminal() {
            self.status = FanOutStatus::Failed { end_time: Utc::now(), error_message: message.into() };
        }
    }

    pub fn time_out(&mut self) {
        if !self.status.is_terminal() {
            self.status = FanOutStatus::TimedOut { end_time: Utc::now() };
        }
    }

    pub fn add_child(&mut self, repository: impl Into<String>, workflow: impl Into<String>, inputs: BTreeMap<String, String>) {
        let child = ChildWorkflow::new(repository, workflow, inputs);
        self.children.insert(child.key(), child);
    }

    /// Update a child's status by its `(repository, workflow)` identity.
    /// No-op when the child is unknown (defensive against races with a
    /// concurrently-persisted snapshot).
    pub fn update_child(&mut self, repository: &str, workflow: &str, status: ChildWorkflowStatus) {
        let key = format!("{repository}#{workflow}");
        if let Some(child) = self.children.get_mut(&key) {
            child.status = status;
        }
    }

    /// Apply the derived-status gating rule from spec §4.5: once every
    /// child is non-pending/non-running, resolve the parent's `Waiting`
    /// status to `Failed` (if any child failed or timed out) or
    /// `Completed`. No-op unless the parent is currently `Waiting`.
    pub fn resolve_waiting_status(&mut self) {
        if self.status != FanOutStatus::Waiting {
            return;
        }
        let all_settled = self.children.values().all(|c| !c.status.is_pending_or_running());
        if !all_settled {
            return;
        }
        let any_failed = self
            .children
            .values()
            .any(|c| matches!(c.status, ChildWorkflowStatus::Failed { .. } | ChildWorkflowStatus::TimedOut { .. }));
        if any_failed {
            self.fail("one or more children did not complete successfully");
        } else {
            self.complete();
        }
    }
}

/// `fanout-<64 lowercase hex>` — the id shape C5 uses to distinguish
/// fingerprint-derived states from timestamp-keyed ones.
#[must_use]
pub fn is_idempotent_id(id: &str) -> bool {
    match id.strip_prefix("fanout-") {
        Some(rest) => rest.len() == 64 && rest.bytes().all(|b| b.is_ascii_hexdigit()),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idempotent_id_shape() {
        let fp = "a".repeat(64);
        assert!(is_idempotent_id(&format!("fanout-{fp}")));
        assert!(!is_idempotent_id("fanout-short"));
        assert!(!is_idempotent_id("other-prefix"));
    }

    #[test]
    fn waiting_resolves_to_completed_when_all_children_succeed() {
        let mut state = FanOutState::new("id", None, "org/src", "release.published", true, 0, "fp");
        state.add_child("org/r1", "build", BTreeMap::new());
        state.start();
        state.start_waiting();
        state.update_child(
            "org/r1",
            "build",
            ChildWorkflowStatus::Completed { start_time: Utc::now(), end_time: Utc::now(), run_id: Some("run-1".to_string()) },
        );
        state.resolve_waiting_status();

        assert!(matches!(state.status, FanOutStatus::Completed { .. }));
    }

    #[test]
    fn waiting_resolves_to_failed_when_any_child_fails() {
        let mut state = FanOutState::new("id", None, "org/src", "release.published", true, 0, "fp");
        state.add_child("org/r1", "build", BTreeMap::new());
        state.add_child("org/r2", "build", BTreeMap::new());
        state.start();
        state.start_waiting();
        state.update_child(
            "org/r1",
            "build",
            ChildWorkflowStatus::Completed { start_time: Utc::now(), end_time: Utc::now(), run_id: None },
        );
        state.update_child(
            "org/r2",
            "build",
            ChildWorkflowStatus::Failed { start_time: Utc::now(), end_time: Utc::now(), error_message: "boom".to_string() },
        );
        state.resolve_waiting_status();

        assert!(matches!(state.status, FanOutStatus::Failed { .. }));
    }

    #[test]
    fn resolve_waiting_status_is_noop_while_children_in_flight() {
        let mut state = FanOutState::new("id", None, "org/src", "release.published", true, 0, "fp");
        state.add_child("org/r1", "build", BTreeMap::new());
        state.start();
        state.start_waiting();
        state.resolve_waiting_status();

        assert_eq!(state.status, FanOutStatus::Waiting);
    }

    #[test]
    fn terminal_transitions_are_sticky() {
        let mut state = FanOutState::new("id", None, "org/src", "x", false, 0, "fp");
        state.complete();
        let first = state.status.clone();
        state.fail("late failure");
        assert_eq!(state.status, first);
    }
}
