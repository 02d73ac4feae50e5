//! Fan-out state store: per-id files under `<stateDir>/<id>.json`, atomic
//! creation for fingerprint-keyed ids, and an in-memory handle cache so
//! concurrent callers within one process share the same lock (spec §4.5).

use std::fs;
use std::time::Duration;

use camino::Utf8PathBuf;
use chrono::Utc;
use dashmap::DashMap;
use fanout_types::{is_idempotent_id, FanOutState};
use tracing::{debug, warn};

use crate::error::StateError;
use crate::handle::StateHandle;

pub struct StateStore {
    state_dir: Utf8PathBuf,
    handles: DashMap<String, StateHandle>,
}

impl StateStore {
    pub fn new(state_dir: impl Into<Utf8PathBuf>) -> Result<Self, StateError> {
        let state_dir = state_dir.into();
        fs::create_dir_all(state_dir.as_std_path())?;
        Ok(Self { state_dir, handles: DashMap::new() })
    }

    fn path_for(&self, id: &str) -> Utf8PathBuf {
        self.state_dir.join(format!("{id}.json"))
    }

    /// Create fresh state unconditionally (used for non-idempotent,
    /// timestamp-keyed ids where no race needs resolving).
    pub fn create(
        &self,
        id: impl Into<String>,
        parent_run_id: Option<String>,
        source_repo: impl Into<String>,
        event_type: impl Into<String>,
        waiting_for_all: bool,
        timeout_seconds: u64,
        fingerprint: impl Into<String>,
    ) -> Result<StateHandle, StateError> {
        let id = id.into();
        let state = FanOutState::new(id.clone(), parent_run_id, source_repo, event_type, waiting_for_all, timeout_seconds, fingerprint);
        let bytes = serde_json::to_vec_pretty(&state)?;
        let path = self.path_for(&id);
        fanout_utils::write_atomic(&path, &bytes)?;

        let handle = StateHandle::new(path, state);
        self.handles.insert(id, handle.clone());
        Ok(handle)
    }

    /// Create state for a fingerprint-derived id, racing concurrent
    /// callers. Returns `(handle, true)` if this call won the race,
    /// `(handle, false)` if another writer's state was observed instead
    /// (spec §4.5 "Atomic creation", §8 "exactly one file is created").
    pub fn create_atomic(
        &self,
        id: impl Into<String>,
        parent_run_id: Option<String>,
        source_repo: impl Into<String>,
        event_type: impl Into<String>,
        waiting_for_all: bool,
        timeout_seconds: u64,
        fingerprint: impl Into<String>,
    ) -> Result<(StateHandle, bool), StateError> {
        let id = id.into();

        if let Some(cached) = self.handles.get(&id) {
            return Ok((cached.clone(), false));
        }

        let state = FanOutState::new(id.clone(), parent_run_id, source_repo, event_type, waiting_for_all, timeout_seconds, fingerprint);
        let bytes = serde_json::to_vec_pretty(&state)?;
        let path = self.path_for(&id);

        match fanout_utils::create_exclusive(&path, &bytes)? {
            fanout_utils::CreateOutcome::Created => {
                debug!(id = %id, "fan-out state created atomically");
                let handle = StateHandle::new(path, state);
                let handle = self.handles.entry(id).or_insert(handle).clone();
                Ok((handle, true))
            }
            fanout_utils::CreateOutcome::LostRace => {
                debug!(id = %id, "fan-out state creation lost race, loading existing");
                let handle = self.load(&id)?;
                let handle = self.handles.entry(id).or_insert(handle).clone();
                Ok((handle, false))
            }
        }
    }

    pub fn get_by_id(&self, id: &str) -> Result<Option<StateHandle>, StateError> {
        if let Some(cached) = self.handles.get(id) {
            return Ok(Some(cached.clone()));
        }
        let path = self.path_for(id);
        if !path.as_std_path().exists() {
            return Ok(None);
        }
        let handle = self.load(id)?;
        let handle = self.handles.entry(id.to_string()).or_insert(handle).clone();
        Ok(Some(handle))
    }

    pub fn get_by_fingerprint(&self, fingerprint: &str) -> Result<Option<StateHandle>, StateError> {
        self.get_by_id(&format!("fanout-{fingerprint}"))
    }

    /// All non-terminal states currently on disk.
    pub fn list_active(&self) -> Result<Vec<StateHandle>, StateError> {
        let mut active = Vec::new();
        for entry in fs::read_dir(self.state_dir.as_std_path())? {
            let entry = entry?;
            let Some(id) = id_from_filename(&entry.file_name().to_string_lossy()) else { continue };
            if let Some(handle) = self.get_by_id(&id)? {
                if !handle.is_complete() {
                    active.push(handle);
                }
            }
        }
        Ok(active)
    }

    /// Remove terminal states older than their classification's
    /// retention window (spec §4.5 "Classification", §4.9 "Separate
    /// retention applies to idempotent states"). Returns the number of
    /// state files removed.
    pub fn cleanup(&self, idempotent_retention: Duration, other_retention: Duration) -> Result<usize, StateError> {
        let mut removed = 0;
        for entry in fs::read_dir(self.state_dir.as_std_path())? {
            let entry = entry?;
            let Some(id) = id_from_filename(&entry.file_name().to_string_lossy()) else { continue };
            let Some(handle) = self.get_by_id(&id)? else { continue };
            let state = handle.snapshot();

            let Some(end_time) = state.status.end_time() else { continue };
            let age = Utc::now().signed_duration_since(end_time).to_std().unwrap_or_default();
            let retention = if is_idempotent_id(&id) { idempotent_retention } else { other_retention };

            if age >= retention {
                if let Err(e) = fs::remove_file(handle.path().as_std_path()) {
                    warn!(id = %id, error = %e, "failed to remove expired fan-out state");
                    continue;
                }
                self.handles.remove(&id);
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn load(&self, id: &str) -> Result<StateHandle, StateError> {
        let path = self.path_for(id);
        let raw = fs::read(path.as_std_path())?;
        let state: FanOutState = serde_json::from_slice(&raw)?;
        Ok(StateHandle::new(path, state))
    }
}

fn id_from_filename(filename: &str) -> Option<String> {
    filename.strip_suffix(".json").filter(|s| !s.contains(".tmp.")).map(str::to_string)
}
