//! Lock file naming (spec §6 "`<sanitizedName>_<repoHash>_<mode>.lock`").

use sha2::{Digest, Sha256};

/// Repository names travel through shell-adjacent tooling elsewhere in the
/// stack, so the on-disk name keeps only filesystem-safe characters.
fn sanitize(repository: &str) -> String {
    repository
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

fn repo_hash(repository: &str) -> String {
    let digest = Sha256::digest(repository.as_bytes());
    digest.iter().take(4).map(|b| format!("{b:02x}")).collect()
}

/// The stable `(repository, mode)` prefix two lock files for the same key
/// share; used to scan for conflicts without needing to know a specific
/// run id in advance.
pub fn key_prefix(repository: &str, mode: fanout_types::LockMode) -> String {
    format!("{}_{}_{}", sanitize(repository), repo_hash(repository), mode.as_str())
}

/// The full lock file name for one `(repository, mode, run_id)` holder.
/// Every reader of a given repository gets its own file so concurrent
/// reads don't collide on creation; conflict checking happens by scanning
/// for [`key_prefix`] matches of the conflicting mode, not by filename
/// identity.
pub fn file_name(repository: &str, mode: fanout_types::LockMode, run_id: &str) -> String {
    let sanitized_run_id = sanitize(run_id);
    format!("{}_{}.lock", key_prefix(repository, mode), sanitized_run_id)
}

/// Parse `(repository_prefix, mode)` back out of a lock file's name, where
/// `repository_prefix` is `sanitize(repository)` (the hash prevents two
/// distinct repository names from colliding, but does not let us recover
/// the original string).
pub fn parse_mode(file_name: &str) -> Option<fanout_types::LockMode> {
    let stem = file_name.strip_suffix(".lock")?;
    if stem.contains("_read_") || stem.ends_with("_read") {
        Some(fanout_types::LockMode::Read)
    } else if stem.contains("_write_") || stem.ends_with("_write") {
        Some(fanout_types::LockMode::Write)
    } else {
        None
    }
}
