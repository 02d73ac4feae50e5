//! Periodic, idempotent reaper for orphaned child workspaces and expired
//! fan-out state (C9).

use std::fs;
use std::time::SystemTime;

use camino::Utf8PathBuf;
use fanout_lock::LockManager;
use fanout_state::StateStore;
use tracing::{debug, warn};

use crate::config::CleanupConfig;
use crate::error::CleanupError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub states_removed: usize,
    pub workspaces_removed: usize,
}

pub struct Cleaner<'a> {
    workspace_root: Utf8PathBuf,
    state_store: &'a StateStore,
    lock_manager: &'a LockManager,
    config: CleanupConfig,
}

impl<'a> Cleaner<'a> {
    #[must_use]
    pub fn new(workspace_root: impl Into<Utf8PathBuf>, state_store: &'a StateStore, lock_manager: &'a LockManager, config: CleanupConfig) -> Self {
        Self { workspace_root: workspace_root.into(), state_store, lock_manager, config }
    }

    /// Run one reap cycle. Safe to call repeatedly and concurrently with
    /// in-flight fan-outs: only terminal state and workspaces with no
    /// referencing lock or active state are ever removed.
    pub fn run_once(&self) -> Result<CleanupReport, CleanupError> {
        let states_removed = self.state_store.cleanup(self.config.idempotent_state_retention, self.config.other_state_retention)?;
        let workspaces_removed = self.clean_workspaces()?;
        Ok(CleanupReport { states_removed, workspaces_removed })
    }

    fn clean_workspaces(&self) -> Result<usize, CleanupError> {
        if !self.workspace_root.as_std_path().exists() {
            return Ok(0);
        }

        let active = self.state_store.list_active()?;
        let mut removed = 0;

        for entry in fs::read_dir(self.workspace_root.as_std_path())? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let project = entry.file_name().to_string_lossy().into_owned();

            if self.lock_manager.is_locked(&project)? {
                continue;
            }
            if active.iter().any(|h| {
                let state = h.snapshot();
                state.source_repo == project || state.children.values().any(|c| c.repository == project)
            }) {
                continue;
            }

            let age = entry
                .metadata()?
                .modified()?
                .elapsed()
                .unwrap_or_default();
            if age < self.config.workspace_max_age {
                continue;
            }

            debug!(project, "reaping orphaned workspace");
            if let Err(e) = fs::remove_dir_all(entry.path()) {
                warn!(project, error = %e, "failed to remove workspace");
                continue;
            }
            removed += 1;
        }

        Ok(removed)
    }
}

#[must_use]
pub fn age_of(modified: SystemTime) -> std::time::Duration {
    modified.elapsed().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use fanout_lock::LockConfig;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn removes_only_aged_unlocked_unreferenced_workspaces() {
        let workspace_dir = TempDir::new().unwrap();
        let state_dir = TempDir::new().unwrap();
        let lock_dir = TempDir::new().unwrap();

        fs::create_dir_all(workspace_dir.path().join("org_stale")).unwrap();
        fs::create_dir_all(workspace_dir.path().join("org_fresh")).unwrap();

        let state_store = StateStore::new(camino::Utf8PathBuf::from_path_buf(state_dir.path().to_path_buf()).unwrap()).unwrap();
        let lock_manager = LockManager::new(camino::Utf8PathBuf::from_path_buf(lock_dir.path().to_path_buf()).unwrap(), LockConfig::default()).unwrap();

        let config = CleanupConfig { workspace_max_age: Duration::from_secs(0), idempotent_state_retention: Duration::from_secs(0), other_state_retention: Duration::from_secs(0) };
        let cleaner = Cleaner::new(camino::Utf8PathBuf::from_path_buf(workspace_dir.path().to_path_buf()).unwrap(), &state_store, &lock_manager, config);

        let report = cleaner.run_once().unwrap();
        assert_eq!(report.workspaces_removed, 2);
        assert!(!workspace_dir.path().join("org_stale").exists());
    }

    #[tokio::test]
    async fn does_not_remove_a_locked_workspace() {
        let workspace_dir = TempDir::new().unwrap();
        let state_dir = TempDir::new().unwrap();
        let lock_dir = TempDir::new().unwrap();

        fs::create_dir_all(workspace_dir.path().join("org_locked")).unwrap();

        let state_store = StateStore::new(camino::Utf8PathBuf::from_path_buf(state_dir.path().to_path_buf()).unwrap()).unwrap();
        let lock_manager = LockManager::new(camino::Utf8PathBuf::from_path_buf(lock_dir.path().to_path_buf()).unwrap(), LockConfig::default()).unwrap();
        lock_manager
            .acquire(&fanout_utils::CancelToken::new(), "run-1", "org_locked", fanout_types::LockMode::Write, None)
            .await
            .unwrap();

        let config = CleanupConfig { workspace_max_age: Duration::from_secs(0), idempotent_state_retention: Duration::from_secs(0), other_state_retention: Duration::from_secs(0) };
        let cleaner = Cleaner::new(camino::Utf8PathBuf::from_path_buf(workspace_dir.path().to_path_buf()).unwrap(), &state_store, &lock_manager, config);

        let report = cleaner.run_once().unwrap();
        assert_eq!(report.workspaces_removed, 0);
    }
}
