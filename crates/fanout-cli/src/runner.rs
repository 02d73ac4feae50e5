//! `SimulatedWorkflowRunner`: records a synthetic run id and succeeds
//! immediately, or fails/hangs when directed by test fixtures — the
//! explicit `dry_run` flag spec.md §9 Open Question (a) calls for, in
//! place of inferring simulation from whether the repository path
//! happens to be missing on disk.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use fanout_orchestrator::{ExecutionResult, WorkflowInput, WorkflowRunner};
use fanout_retry::CallError;

/// A directive fixtures attach to a `(repository, workflow)` pair so
/// tests can script failures, hangs, and transient errors without a real
/// child-workflow backend.
#[derive(Debug, Clone)]
pub enum Directive {
    Succeed,
    Fail(String),
    Hang,
    /// Fail `remaining` more times with a retryable error, then succeed.
    FailThenSucceed { remaining: u32 },
}

/// Always-simulated `WorkflowRunner`. In dry-run mode (the default for
/// the bundled CLI) it never contacts anything real: it records a
/// synthetic run id and reports success, or follows a configured
/// [`Directive`] when a fixture has one for the endpoint.
pub struct SimulatedWorkflowRunner {
    directives: std::collections::HashMap<(String, String), std::sync::Mutex<Directive>>,
    counter: AtomicU64,
}

impl Default for SimulatedWorkflowRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedWorkflowRunner {
    #[must_use]
    pub fn new() -> Self {
        Self { directives: std::collections::HashMap::new(), counter: AtomicU64::new(0) }
    }

    #[must_use]
    pub fn with_directive(mut self, repository: impl Into<String>, workflow: impl Into<String>, directive: Directive) -> Self {
        self.directives.insert((repository.into(), workflow.into()), std::sync::Mutex::new(directive));
        self
    }

    fn next_run_id(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("sim-run-{n:08x}")
    }
}

#[async_trait]
impl WorkflowRunner for SimulatedWorkflowRunner {
    async fn execute_workflow(&self, input: WorkflowInput) -> Result<ExecutionResult, CallError> {
        let key = (input.repository.clone(), input.workflow.clone());
        let run_id = self.next_run_id();

        let Some(directive) = self.directives.get(&key) else {
            return Ok(ExecutionResult { run_id, success: true, message: None });
        };

        let mut guard = directive.lock().expect("simulated runner directive mutex poisoned");
        match &mut *guard {
            Directive::Succeed => Ok(ExecutionResult { run_id, success: true, message: None }),
            Directive::Fail(message) => Ok(ExecutionResult { run_id, success: false, message: Some(message.clone()) }),
            Directive::Hang => {
                // Sleeps well past any sane test timeout; the orchestrator's
                // cancellation races this future rather than waiting it out.
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(ExecutionResult { run_id, success: true, message: None })
            }
            Directive::FailThenSucceed { remaining } => {
                if *remaining > 0 {
                    *remaining -= 1;
                    Err(CallError::Transient("simulated transient failure".to_string()))
                } else {
                    Ok(ExecutionResult { run_id, success: true, message: None })
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn input(repo: &str, workflow: &str) -> WorkflowInput {
        WorkflowInput { repository: repo.to_string(), workflow: workflow.to_string(), inputs: BTreeMap::new(), dry_run: true }
    }

    #[tokio::test]
    async fn undirected_endpoint_succeeds_with_a_synthetic_run_id() {
        let runner = SimulatedWorkflowRunner::new();
        let result = runner.execute_workflow(input("org/r1", "build")).await.unwrap();
        assert!(result.success);
        assert!(result.run_id.starts_with("sim-run-"));
    }

    #[tokio::test]
    async fn directed_failure_reports_workflow_failure_not_a_call_error() {
        let runner = SimulatedWorkflowRunner::new().with_directive("org/r1", "build", Directive::Fail("boom".to_string()));
        let result = runner.execute_workflow(input("org/r1", "build")).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.message.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn fail_then_succeed_exhausts_before_succeeding() {
        let runner = SimulatedWorkflowRunner::new().with_directive("org/r1", "build", Directive::FailThenSucceed { remaining: 2 });
        assert!(runner.execute_workflow(input("org/r1", "build")).await.is_err());
        assert!(runner.execute_workflow(input("org/r1", "build")).await.is_err());
        assert!(runner.execute_workflow(input("org/r1", "build")).await.unwrap().success);
    }
}
