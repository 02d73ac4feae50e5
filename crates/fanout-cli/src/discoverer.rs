//! `FileSystemDiscoverer`: reads `*.tako.toml` subscription declarations
//! under a configured root (spec SPEC_FULL.md §A3) — a stand-in discovery
//! backend suitable for exercising the core locally/offline, in place of
//! the real git-clone-based repository scanner named out of scope by
//! spec.md §1.

use std::fs;

use async_trait::async_trait;
use camino::Utf8PathBuf;
use serde::Deserialize;

use fanout_orchestrator::{DiscoveryError, SubscriptionDiscoverer};
use fanout_types::{Subscription, SubscriptionMatch};

/// On-disk shape of a single `*.tako.toml` subscription declaration.
#[derive(Debug, Deserialize)]
struct SubscriptionFile {
    repository: String,
    #[serde(default)]
    local_path: Option<String>,
    subscription: Subscription,
}

pub struct FileSystemDiscoverer {
    root: Utf8PathBuf,
}

impl FileSystemDiscoverer {
    #[must_use]
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn scan(&self) -> Result<Vec<SubscriptionMatch>, DiscoveryError> {
        let mut matches = Vec::new();
        if !self.root.as_std_path().exists() {
            return Ok(matches);
        }

        let entries = fs::read_dir(self.root.as_std_path()).map_err(|e| DiscoveryError(e.to_string()))?;
        for entry in entries {
            let entry = entry.map_err(|e| DiscoveryError(e.to_string()))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("toml") {
                continue;
            }
            if !path.to_string_lossy().ends_with(".tako.toml") {
                continue;
            }

            let raw = fs::read_to_string(&path).map_err(|e| DiscoveryError(format!("{}: {e}", path.display())))?;
            let file: SubscriptionFile =
                toml::from_str(&raw).map_err(|e| DiscoveryError(format!("{}: {e}", path.display())))?;

            let local_path = file.local_path.unwrap_or_else(|| file.repository.clone());
            matches.push(SubscriptionMatch { subscription: file.subscription, repository: file.repository, local_path });
        }
        Ok(matches)
    }
}

#[async_trait]
impl SubscriptionDiscoverer for FileSystemDiscoverer {
    async fn find_subscribers(
        &self,
        artifact: &str,
        event_type: &str,
    ) -> Result<Vec<SubscriptionMatch>, DiscoveryError> {
        let all = self.scan()?;
        Ok(all
            .into_iter()
            .filter(|m| m.subscription.artifact == artifact && m.subscription.events.iter().any(|e| e == event_type))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scans_matching_subscription_files_only() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();

        fs::write(
            root.join("build.tako.toml").as_std_path(),
            r#"
repository = "org/r1"

[subscription]
artifact = "org/src:default"
events = ["release.published"]
workflow = "build"
"#,
        )
        .unwrap();
        fs::write(
            root.join("other.tako.toml").as_std_path(),
            r#"
repository = "org/r2"

[subscription]
artifact = "org/src:default"
events = ["push"]
workflow = "build"
"#,
        )
        .unwrap();
        fs::write(root.join("ignored.txt").as_std_path(), "not toml").unwrap();

        let discoverer = FileSystemDiscoverer::new(root);
        let matches = discoverer.find_subscribers("org/src:default", "release.published").await.unwrap();

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].repository, "org/r1");
    }

    #[tokio::test]
    async fn missing_root_yields_no_candidates() {
        let discoverer = FileSystemDiscoverer::new(Utf8PathBuf::from("/no/such/dir"));
        let matches = discoverer.find_subscribers("org/src:default", "push").await.unwrap();
        assert!(matches.is_empty());
    }
}
