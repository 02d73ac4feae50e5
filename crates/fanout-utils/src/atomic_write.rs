//! Atomic file writes and first-writer-wins creation (spec §4.5, §4.7, §9).
//!
//! Every persistence layer in the core (state store, lock manager) needs
//! the same two primitives: "replace this file's contents without a reader
//! ever observing a partial write" and "create this file iff nobody else
//! already has". Both are implemented once here via temp-file-then-rename.

use std::fs;
use std::io;
use std::path::Path;

use camino::Utf8Path;
use tempfile::NamedTempFile;

/// Write `content` to `path` by writing a sibling temp file, fsyncing it,
/// then atomically renaming it into place. Readers never observe a
/// partially-written file.
pub fn write_atomic(path: &Utf8Path, content: &[u8]) -> io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Utf8Path::new("."));
    fs::create_dir_all(dir)?;

    let mut temp = NamedTempFile::new_in(dir)?;
    io::Write::write_all(&mut temp, content)?;
    temp.as_file().sync_all()?;
    temp.persist(path.as_std_path()).map_err(|e| e.error)?;
    Ok(())
}

/// Outcome of [`create_exclusive`].
pub enum CreateOutcome {
    /// This call created the file; `content` is now on disk at `path`.
    Created,
    /// Another writer won the race; the file at `path` is theirs.
    LostRace,
}

/// Create `path` with `content` iff it does not already exist, via a
/// per-attempt temp file (`<path>.tmp.<rand>`) renamed into place. If the
/// rename target already exists, the loser leaves the winner's file alone
/// and reports [`CreateOutcome::LostRace`] rather than erroring — this is
/// the "exactly one creation across concurrent writers" guarantee spec §4.5
/// and §8 require for fingerprint-keyed state.
pub fn create_exclusive(path: &Utf8Path, content: &[u8]) -> io::Result<CreateOutcome> {
    let dir = path.parent().unwrap_or_else(|| Utf8Path::new("."));
    fs::create_dir_all(dir)?;

    if path.as_std_path().exists() {
        return Ok(CreateOutcome::LostRace);
    }

    let temp_name = format!(
        ".{}.tmp.{:08x}",
        path.file_name().unwrap_or("state"),
        rand::random::<u32>()
    );
    let temp_path = dir.join(&temp_name);

    fs::write(temp_path.as_std_path(), content)?;
    if let Ok(f) = fs::File::open(temp_path.as_std_path()) {
        let _ = f.sync_all();
    }

    match hard_link_or_rename_exclusive(temp_path.as_std_path(), path.as_std_path()) {
        Ok(()) => Ok(CreateOutcome::Created),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            let _ = fs::remove_file(temp_path.as_std_path());
            Ok(CreateOutcome::LostRace)
        }
        Err(e) => {
            let _ = fs::remove_file(temp_path.as_std_path());
            Err(e)
        }
    }
}

/// Rename `temp` to `target` only if `target` doesn't exist. `fs::rename`
/// would silently clobber an existing target on most platforms, so we
/// create the link exclusively first (Unix `link` is `O_EXCL`-like by
/// construction) and fall back to a plain rename where hard links aren't
/// available (e.g. across filesystems).
fn hard_link_or_rename_exclusive(temp: &Path, target: &Path) -> io::Result<()> {
    match fs::hard_link(temp, target) {
        Ok(()) => {
            let _ = fs::remove_file(temp);
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Err(e),
        Err(_) => {
            // Cross-filesystem or unsupported: fall back to a racy rename,
            // re-checking existence immediately before committing.
            if target.exists() {
                return Err(io::Error::new(io::ErrorKind::AlreadyExists, "target exists"));
            }
            fs::rename(temp, target)
        }
    }
}
