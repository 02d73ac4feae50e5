//! `WorkflowRunner`: the pluggable component that executes a triggered
//! child workflow (spec §6).

use std::collections::BTreeMap;

use async_trait::async_trait;

use fanout_retry::CallError;

/// What the orchestrator asks a [`WorkflowRunner`] to do. `dry_run` is the
/// explicit flag spec §9 Open Question (a) calls for in place of inferring
/// simulation from whether the repository path happens to be missing on
/// disk: callers decide up front whether a run is real or simulated rather
/// than the runner guessing from filesystem state.
#[derive(Debug, Clone)]
pub struct WorkflowInput {
    pub repository: String,
    pub workflow: String,
    pub inputs: BTreeMap<String, String>,
    pub dry_run: bool,
}

/// Outcome of a workflow execution. `success = false` means the workflow
/// ran to completion but reported failure (`WorkflowRanButFailed`), as
/// distinct from the call itself erroring out (`ChildExecutionFailed`,
/// surfaced as `Err(CallError)`).
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub run_id: String,
    pub success: bool,
    pub message: Option<String>,
}

/// Injected child-workflow execution backend.
#[async_trait]
pub trait WorkflowRunner: Send + Sync {
    async fn execute_workflow(&self, input: WorkflowInput) -> Result<ExecutionResult, CallError>;
}
