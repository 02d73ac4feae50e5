//! A live handle over one persisted [`FanOutState`] (spec §4.5 "State-level
//! operations on a handle").

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use camino::Utf8PathBuf;
use fanout_types::{ChildWorkflowStatus, FanOutState};

use crate::error::StateError;

/// Cloning a handle shares the same in-memory state and the same on-disk
/// file; every mutation re-persists the full state after releasing the
/// lock, per spec §4.5 ("the file write happens after release").
#[derive(Clone)]
pub struct StateHandle {
    id: String,
    path: Utf8PathBuf,
    inner: Arc<RwLock<FanOutState>>,
}

impl StateHandle {
    pub(crate) fn new(path: Utf8PathBuf, state: FanOutState) -> Self {
        Self { id: state.id.clone(), path, inner: Arc::new(RwLock::new(state)) }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn path(&self) -> &Utf8PathBuf {
        &self.path
    }

    #[must_use]
    pub fn snapshot(&self) -> FanOutState {
        self.inner.read().expect("state rwlock poisoned").clone()
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.inner.read().expect("state rwlock poisoned").is_complete()
    }

    pub fn start(&self) -> Result<(), StateError> {
        self.mutate(FanOutState::start)
    }

    pub fn start_waiting(&self) -> Result<(), StateError> {
        self.mutate(FanOutState::start_waiting)
    }

    pub fn complete(&self) -> Result<(), StateError> {
        self.mutate(FanOutState::complete)
    }

    pub fn fail(&self, message: impl Into<String>) -> Result<(), StateError> {
        let message = message.into();
        self.mutate(|s| s.fail(message))
    }

    pub fn time_out(&self) -> Result<(), StateError> {
        self.mutate(FanOutState::time_out)
    }

    pub fn add_child(
        &self,
        repository: impl Into<String>,
        workflow: impl Into<String>,
        inputs: BTreeMap<String, String>,
    ) -> Result<(), StateError> {
        let (repository, workflow) = (repository.into(), workflow.into());
        self.mutate(|s| s.add_child(repository, workflow, inputs))
    }

    pub fn update_child(&self, repository: &str, workflow: &str, status: ChildWorkflowStatus) -> Result<(), StateError> {
        self.mutate(|s| s.update_child(repository, workflow, status))
    }

    /// Apply the derived-status gating rule after a child transitions
    /// (spec §4.5 "Derived status").
    pub fn resolve_waiting_status(&self) -> Result<(), StateError> {
        self.mutate(FanOutState::resolve_waiting_status)
    }

    /// Mutate the in-memory state under its write lock, marshal to bytes,
    /// release the lock, then persist. Readers never observe a partial
    /// write because the write is itself atomic (temp file + rename).
    fn mutate(&self, f: impl FnOnce(&mut FanOutState)) -> Result<(), StateError> {
        let bytes = {
            let mut guard = self.inner.write().expect("state rwlock poisoned");
            f(&mut guard);
            serde_json::to_vec_pretty(&*guard)?
        };
        fanout_utils::write_atomic(&self.path, &bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8Path;
    use tempfile::TempDir;

    fn handle(dir: &TempDir) -> StateHandle {
        let path = Utf8Path::from_path(dir.path()).unwrap().join("state.json");
        let state = FanOutState::new("fanout-1", None, "org/src", "release.published", true, 0, "fp");
        StateHandle::new(path, state)
    }

    #[test]
    fn mutations_persist_to_disk() {
        let dir = TempDir::new().unwrap();
        let handle = handle(&dir);

        handle.start().unwrap();
        let raw = std::fs::read_to_string(handle.path().as_std_path()).unwrap();
        let persisted: FanOutState = serde_json::from_str(&raw).unwrap();
        assert_eq!(persisted.status.label(), "running");
    }

    #[test]
    fn add_child_then_complete_it_resolves_waiting() {
        let dir = TempDir::new().unwrap();
        let handle = handle(&dir);

        handle.start().unwrap();
        handle.add_child("org/r1", "build", BTreeMap::new()).unwrap();
        handle.start_waiting().unwrap();
        handle
            .update_child(
                "org/r1",
                "build",
                ChildWorkflowStatus::Completed { start_time: chrono::Utc::now(), end_time: chrono::Utc::now(), run_id: None },
            )
            .unwrap();
        handle.resolve_waiting_status().unwrap();

        assert!(handle.is_complete());
    }
}
