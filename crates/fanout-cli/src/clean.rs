//! The `tako-fanout fan-out clean` command: run one reap cycle of C9.

use fanout_cleanup::{Cleaner, CleanupConfig, CleanupReport};
use fanout_config::FanOutConfig;
use fanout_lock::LockManager;
use fanout_state::StateStore;

use crate::error::CliError;

pub fn run_once(config: &FanOutConfig, older_than: Option<std::time::Duration>) -> Result<CleanupReport, CliError> {
    let state_store = StateStore::new(config.state_dir.clone())?;
    let lock_manager = LockManager::new(config.lock_dir.clone(), config.lock.clone())?;

    let mut cleanup_config = config.cleanup;
    if let Some(age) = older_than {
        cleanup_config = CleanupConfig {
            workspace_max_age: age,
            idempotent_state_retention: age,
            other_state_retention: age,
        };
    }

    let cleaner = Cleaner::new(config.workspace_root.clone(), &state_store, &lock_manager, cleanup_config);
    Ok(cleaner.run_once()?)
}
