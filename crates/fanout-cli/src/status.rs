//! The `tako-fanout fan-out status` command: look a fan-out up by id or
//! bare fingerprint and print its current summary.

use fanout_state::StateStore;
use fanout_types::FanOutResult;

use crate::error::CliError;

/// Resolve `id_or_fingerprint` the way a caller would type it: either the
/// full `fanout-<fingerprint>`/timestamp id, or a bare 64-hex fingerprint.
pub fn lookup(store: &StateStore, id_or_fingerprint: &str) -> Result<FanOutResult, CliError> {
    let handle = store
        .get_by_id(id_or_fingerprint)?
        .or(store.get_by_fingerprint(id_or_fingerprint)?)
        .ok_or_else(|| CliError::NotFound(id_or_fingerprint.to_string()))?;

    let state = handle.snapshot();
    let subscribers_found = state.children.len();
    let timeout_exceeded = matches!(state.status, fanout_types::FanOutStatus::TimedOut { .. });
    Ok(FanOutResult::from_state(&state, subscribers_found, subscribers_found, timeout_exceeded))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_id_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(camino::Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap()).unwrap();
        let err = lookup(&store, "fanout-missing").unwrap_err();
        assert!(matches!(err, CliError::NotFound(_)));
    }

    #[test]
    fn lookup_by_bare_fingerprint_finds_the_fanout_prefixed_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(camino::Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap()).unwrap();
        store.create_atomic("fanout-abc123", None, "org/src", "push", false, 0, "abc123").unwrap();

        let result = lookup(&store, "abc123").unwrap();
        assert_eq!(result.fan_out_id, "fanout-abc123");
    }
}
