//! Subscription declarations and discovered matches (spec §3).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A subscriber's declaration: which events it wants, what workflow to run,
/// and how to build that workflow's inputs from the triggering event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub artifact: String,
    pub events: Vec<String>,
    pub workflow: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<String>,
    #[serde(default)]
    pub filters: Vec<String>,
    #[serde(default)]
    pub inputs: BTreeMap<String, String>,
}

impl Subscription {
    /// Filters normalized for diamond-dependency comparison: whitespace
    /// collapsed, sorted so order in the source declaration doesn't matter.
    #[must_use]
    pub fn normalized_filters(&self) -> Vec<String> {
        let mut normalized: Vec<String> =
            self.filters.iter().map(|f| normalize_whitespace(f)).collect();
        normalized.sort();
        normalized
    }

    /// The `(workflow, sorted_filters, sorted_inputs)` key used to group
    /// diamond-equivalent subscriptions within a repository (spec §4.6 step
    /// 8). Inputs are compared by key set and template text, not by their
    /// rendered values.
    #[must_use]
    pub fn diamond_key(&self) -> (String, Vec<String>, Vec<(String, String)>) {
        let inputs: Vec<(String, String)> = self
            .inputs
            .iter()
            .map(|(k, v)| (k.clone(), normalize_whitespace(v)))
            .collect();
        (self.workflow.clone(), self.normalized_filters(), inputs)
    }
}

/// Collapse runs of whitespace to a single space and trim the ends, the
/// normalization used throughout §4.2/§4.6 for "equivalent after whitespace
/// normalization" comparisons.
#[must_use]
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// A subscription bundled with the repository identity and local checkout
/// path the discoverer found it at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionMatch {
    pub subscription: Subscription,
    pub repository: String,
    pub local_path: String,
}

impl SubscriptionMatch {
    /// The `repo:workflow` key circuit breakers and child maps are keyed by.
    #[must_use]
    pub fn endpoint_key(&self) -> String {
        format!("{}:{}", self.repository, self.subscription.workflow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diamond_key_ignores_filter_order_and_whitespace() {
        let a = Subscription {
            artifact: "org/r1:default".to_string(),
            events: vec!["release.published".to_string()],
            workflow: "build".to_string(),
            schema_version: None,
            filters: vec!["payload.version  !=   null".to_string()],
            inputs: BTreeMap::new(),
        };
        let b = Subscription {
            filters: vec!["payload.version != null".to_string()],
            ..a.clone()
        };

        assert_eq!(a.diamond_key(), b.diamond_key());
    }

    #[test]
    fn diamond_key_differs_on_workflow() {
        let a = Subscription {
            artifact: "org/r1:default".to_string(),
            events: vec!["release.published".to_string()],
            workflow: "build".to_string(),
            schema_version: None,
            filters: vec![],
            inputs: BTreeMap::new(),
        };
        let b = Subscription { workflow: "deploy".to_string(), ..a.clone() };

        assert_ne!(a.diamond_key(), b.diamond_key());
    }

    #[test]
    fn endpoint_key_joins_repo_and_workflow() {
        let m = SubscriptionMatch {
            subscription: Subscription {
                artifact: "org/r1:default".to_string(),
                events: vec![],
                workflow: "build".to_string(),
                schema_version: None,
                filters: vec![],
                inputs: BTreeMap::new(),
            },
            repository: "org/r1".to_string(),
            local_path: "/tmp/org/r1".to_string(),
        };
        assert_eq!(m.endpoint_key(), "org/r1:build");
    }
}
