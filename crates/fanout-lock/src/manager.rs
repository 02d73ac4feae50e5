//! Fine-grained advisory repository locks with stale-lock recovery (C7).

use std::fs;
use std::io::Write as _;
use std::time::{Duration, Instant};

use camino::Utf8PathBuf;
use chrono::Utc;
use dashmap::DashMap;
use fd_lock::RwLock as FdRwLock;
use fanout_types::{LockMode, LockRecord};
use fanout_utils::{is_process_alive, CancelToken};
use tracing::{debug, warn};

use crate::config::LockConfig;
use crate::error::LockError;
use crate::naming;

struct HeldLock {
    repository: String,
    mode: LockMode,
    path: Utf8PathBuf,
    /// OS-level advisory lock asserted once, immediately after the file is
    /// created: an `fd_lock::RwLock::try_write` held just long enough to
    /// write the record, guarding against anything that reopens the same
    /// inode outside this manager's view of the lock directory. The guard
    /// is released once the write completes; file presence (via
    /// `fanout_utils::create_exclusive`'s first-writer-wins rename) is what
    /// actually arbitrates acquisition across processes.
    _fd_lock: Option<Box<FdRwLock<fs::File>>>,
}

/// Tracks locks this manager instance has acquired, and arbitrates
/// acquisition against the on-disk lock files any process (including
/// previous runs of this one) may hold. Conflict checking is by directory
/// scan rather than file-identity collision, since multiple readers of the
/// same repository each get their own file (spec §4.7 "Conflicts"; see
/// [`naming`] for the Open Question this resolves).
pub struct LockManager {
    lock_dir: Utf8PathBuf,
    config: LockConfig,
    held: DashMap<String, Vec<HeldLock>>,
}

impl LockManager {
    pub fn new(lock_dir: impl Into<Utf8PathBuf>, config: LockConfig) -> Result<Self, LockError> {
        let lock_dir = lock_dir.into();
        fs::create_dir_all(lock_dir.as_std_path())?;
        Ok(Self { lock_dir, config, held: DashMap::new() })
    }

    /// Acquire a `(repository, mode)` lock for `run_id`, retrying with
    /// exponential backoff until success, a conflicting lock outlives
    /// `timeout`, or `cancel` fires (spec §4.7).
    pub async fn acquire(
        &self,
        cancel: &CancelToken,
        run_id: &str,
        repository: &str,
        mode: LockMode,
        timeout: Option<Duration>,
    ) -> Result<(), LockError> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut attempt = 0u32;

        loop {
            if cancel.is_cancelled() {
                return Err(LockError::Cancelled { repository: repository.to_string(), mode });
            }

            self.reclaim_stale(repository)?;

            if !self.has_conflict(repository, mode)? {
                let path = self.lock_dir.join(naming::file_name(repository, mode, run_id));
                let now = Utc::now();
                let record = LockRecord {
                    run_id: run_id.to_string(),
                    repository: repository.to_string(),
                    mode,
                    acquired_at: now,
                    expires_at: now + chrono::Duration::from_std(self.config.ttl).unwrap_or_default(),
                    process_id: std::process::id(),
                };
                let bytes = serde_json::to_vec_pretty(&record)?;

                match fanout_utils::create_exclusive(&path, &bytes)? {
                    fanout_utils::CreateOutcome::Created => {
                        let fd_lock = Self::assert_fd_lock(&path, &bytes)?;
                        debug!(run_id, repository, mode = mode.as_str(), "lock acquired");
                        self.held.entry(run_id.to_string()).or_default().push(HeldLock {
                            repository: repository.to_string(),
                            mode,
                            path,
                            _fd_lock: fd_lock,
                        });
                        return Ok(());
                    }
                    fanout_utils::CreateOutcome::LostRace => {}
                }
            }

            attempt += 1;
            if attempt > self.config.max_retries {
                return Err(LockError::AcquireTimeout { repository: repository.to_string(), mode });
            }
            if deadline.is_some_and(|dl| Instant::now() >= dl) {
                return Err(LockError::AcquireTimeout { repository: repository.to_string(), mode });
            }

            let delay = fanout_utils::delay_for_attempt(self.config.initial_delay, self.config.max_delay, 2.0, 0.1, attempt - 1);
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = cancel.cancelled() => {
                    return Err(LockError::Cancelled { repository: repository.to_string(), mode });
                }
            }
        }
    }

    pub fn release(&self, run_id: &str, repository: &str, mode: LockMode) -> Result<(), LockError> {
        let path = self.lock_dir.join(naming::file_name(repository, mode, run_id));
        if path.as_std_path().exists() {
            fs::remove_file(path.as_std_path())?;
        }
        if let Some(mut held) = self.held.get_mut(run_id) {
            held.retain(|l| !(l.repository == repository && l.mode == mode));
        }
        Ok(())
    }

    pub fn release_all(&self, run_id: &str) -> Result<(), LockError> {
        if let Some((_, locks)) = self.held.remove(run_id) {
            for lock in locks {
                if lock.path.as_std_path().exists() {
                    fs::remove_file(lock.path.as_std_path())?;
                }
            }
        }
        Ok(())
    }

    pub fn is_locked(&self, repository: &str) -> Result<bool, LockError> {
        self.reclaim_stale(repository)?;
        Ok(self.has_conflict(repository, LockMode::Write)? || self.has_conflict(repository, LockMode::Read)?)
    }

    /// All currently-valid lock records for `repository`, after reclaiming
    /// anything stale.
    pub fn get_lock_info(&self, repository: &str) -> Result<Vec<LockRecord>, LockError> {
        self.reclaim_stale(repository)?;
        let mut records = Vec::new();
        for mode in [LockMode::Read, LockMode::Write] {
            records.extend(self.matching_records(repository, mode)?);
        }
        Ok(records)
    }

    /// This lock manager never lets one caller hold more than one lock
    /// while waiting on another, so true wait-for cycles cannot form; what
    /// *can* happen is a lock outliving its owner. This surfaces any such
    /// record across the whole lock directory without reclaiming it, so a
    /// caller can alert before the next acquire silently reclaims it.
    pub fn detect_deadlocks(&self) -> Result<Vec<LockRecord>, LockError> {
        let mut suspect = Vec::new();
        for entry in fs::read_dir(self.lock_dir.as_std_path())? {
            let entry = entry?;
            let Ok(bytes) = fs::read(entry.path()) else { continue };
            let Ok(record) = serde_json::from_slice::<LockRecord>(&bytes) else { continue };
            if record.expires_at < Utc::now() || !is_process_alive(record.process_id) {
                suspect.push(record);
            }
        }
        Ok(suspect)
    }

    /// Release every lock this manager instance currently tracks, across
    /// all run ids. Intended for orderly shutdown.
    pub fn close(&self) -> Result<(), LockError> {
        let run_ids: Vec<String> = self.held.iter().map(|e| e.key().clone()).collect();
        for run_id in run_ids {
            self.release_all(&run_id)?;
        }
        Ok(())
    }

    /// Reopen the just-created lock file and take an OS-level `flock`
    /// through `fd_lock::RwLock::try_write`, writing `content` under the
    /// held guard before releasing it (open, lock, write, flush, sync, drop
    /// guard). A contended lock here means another process reopened the
    /// file in the instant after the exclusive-create rename landed, which
    /// is surfaced as an I/O error rather than silently ignored.
    fn assert_fd_lock(path: &Utf8PathBuf, content: &[u8]) -> Result<Option<Box<FdRwLock<fs::File>>>, LockError> {
        let file = fs::OpenOptions::new().read(true).write(true).open(path.as_std_path())?;
        let mut rw_lock = Box::new(FdRwLock::new(file));
        {
            let mut guard = rw_lock.try_write().map_err(|_| {
                LockError::Io(std::io::Error::new(
                    std::io::ErrorKind::WouldBlock,
                    format!("fd lock contended immediately after exclusive create at {path}"),
                ))
            })?;
            let file_ref = &mut *guard;
            file_ref.write_all(content)?;
            file_ref.flush()?;
            file_ref.sync_all()?;
            drop(guard);
        }
        Ok(Some(rw_lock))
    }

    fn has_conflict(&self, repository: &str, mode: LockMode) -> Result<bool, LockError> {
        for existing in [LockMode::Read, LockMode::Write] {
            if !mode.conflicts_with(existing) {
                continue;
            }
            if !self.matching_records(repository, existing)?.is_empty() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn matching_records(&self, repository: &str, mode: LockMode) -> Result<Vec<LockRecord>, LockError> {
        let prefix = naming::key_prefix(repository, mode);
        let mut records = Vec::new();
        for entry in fs::read_dir(self.lock_dir.as_std_path())? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with(&prefix) {
                continue;
            }
            if let Ok(bytes) = fs::read(entry.path()) {
                if let Ok(record) = serde_json::from_slice::<LockRecord>(&bytes) {
                    records.push(record);
                }
            }
        }
        Ok(records)
    }

    /// Remove lock files under `repository` whose expiry has passed, whose
    /// owning process is gone, or that fail to parse (spec §4.7 "Stale
    /// locks are reclaimed").
    fn reclaim_stale(&self, repository: &str) -> Result<(), LockError> {
        for mode in [LockMode::Read, LockMode::Write] {
            let prefix = naming::key_prefix(repository, mode);
            for entry in fs::read_dir(self.lock_dir.as_std_path())? {
                let entry = entry?;
                let name = entry.file_name().to_string_lossy().into_owned();
                if !name.starts_with(&prefix) {
                    continue;
                }
                let path = entry.path();
                let stale = match fs::read(&path) {
                    Ok(bytes) => match serde_json::from_slice::<LockRecord>(&bytes) {
                        Ok(record) => record.expires_at < Utc::now() || !is_process_alive(record.process_id),
                        Err(_) => true,
                    },
                    Err(_) => continue,
                };
                if stale {
                    warn!(repository, file = %name, "reclaiming stale lock");
                    let _ = fs::remove_file(&path);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fanout_utils::CancelToken;
    use tempfile::TempDir;

    fn manager() -> (TempDir, LockManager) {
        let dir = TempDir::new().unwrap();
        let config = LockConfig { max_retries: 2, initial_delay: Duration::from_millis(1), max_delay: Duration::from_millis(5), ttl: Duration::from_secs(60) };
        let manager = LockManager::new(camino::Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap(), config).unwrap();
        (dir, manager)
    }

    #[tokio::test]
    async fn concurrent_reads_do_not_conflict() {
        let (_dir, manager) = manager();
        let cancel = CancelToken::new();

        manager.acquire(&cancel, "run-1", "org/repo", LockMode::Read, None).await.unwrap();
        manager.acquire(&cancel, "run-2", "org/repo", LockMode::Read, None).await.unwrap();

        assert!(manager.is_locked("org/repo").unwrap());
    }

    #[tokio::test]
    async fn write_lock_blocks_a_second_write_until_timeout() {
        let (_dir, manager) = manager();
        let cancel = CancelToken::new();

        manager.acquire(&cancel, "run-1", "org/repo", LockMode::Write, None).await.unwrap();
        let result = manager
            .acquire(&cancel, "run-2", "org/repo", LockMode::Write, Some(Duration::from_millis(10)))
            .await;

        assert!(matches!(result, Err(LockError::AcquireTimeout { .. })));
    }

    #[tokio::test]
    async fn release_unblocks_a_waiting_writer() {
        let (_dir, manager) = manager();
        let cancel = CancelToken::new();

        manager.acquire(&cancel, "run-1", "org/repo", LockMode::Write, None).await.unwrap();
        manager.release("run-1", "org/repo", LockMode::Write).unwrap();

        manager.acquire(&cancel, "run-2", "org/repo", LockMode::Write, None).await.unwrap();
        assert!(manager.is_locked("org/repo").unwrap());
    }

    #[tokio::test]
    async fn release_all_clears_every_lock_for_a_run() {
        let (_dir, manager) = manager();
        let cancel = CancelToken::new();

        manager.acquire(&cancel, "run-1", "org/a", LockMode::Write, None).await.unwrap();
        manager.acquire(&cancel, "run-1", "org/b", LockMode::Read, None).await.unwrap();
        manager.release_all("run-1").unwrap();

        assert!(!manager.is_locked("org/a").unwrap());
        assert!(!manager.is_locked("org/b").unwrap());
    }

    #[tokio::test]
    async fn stale_lock_with_dead_process_is_reclaimed() {
        let (_dir, manager) = manager();
        let cancel = CancelToken::new();

        let stale = LockRecord {
            run_id: "ghost".to_string(),
            repository: "org/repo".to_string(),
            mode: LockMode::Write,
            acquired_at: Utc::now(),
            expires_at: Utc::now() + chrono::Duration::hours(1),
            process_id: 999_999,
        };
        let path = manager.lock_dir.join(naming::file_name("org/repo", LockMode::Write, "ghost"));
        fanout_utils::write_atomic(&path, &serde_json::to_vec(&stale).unwrap()).unwrap();

        manager.acquire(&cancel, "run-1", "org/repo", LockMode::Write, Some(Duration::from_secs(1))).await.unwrap();
        assert!(manager.is_locked("org/repo").unwrap());
    }
}
