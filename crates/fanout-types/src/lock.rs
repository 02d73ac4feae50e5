//! Advisory lock record shape (spec §3, §4.7).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Read locks may coexist; write locks are exclusive against everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockMode {
    Read,
    Write,
}

impl LockMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }

    /// Whether `self` conflicts with an existing lock of `other`'s mode on
    /// the same repository (spec §4.7 "Conflicts").
    #[must_use]
    pub fn conflicts_with(self, other: LockMode) -> bool {
        matches!((self, other), (LockMode::Write, _) | (_, LockMode::Write))
    }
}

/// The JSON body written to `<lockDir>/<repoHash>_<mode>.lock`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockRecord {
    pub run_id: String,
    pub repository: String,
    pub mode: LockMode,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub process_id: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_conflicts_with_everything() {
        assert!(LockMode::Write.conflicts_with(LockMode::Read));
        assert!(LockMode::Write.conflicts_with(LockMode::Write));
        assert!(LockMode::Read.conflicts_with(LockMode::Write));
    }

    #[test]
    fn read_does_not_conflict_with_read() {
        assert!(!LockMode::Read.conflicts_with(LockMode::Read));
    }
}
