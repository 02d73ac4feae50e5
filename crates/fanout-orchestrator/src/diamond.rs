//! Diamond-dependency resolution (spec §4.6 step 8, §8 scenario 3).
//!
//! Two subscriptions — in the same repository or different ones — that
//! would trigger equivalent work (same workflow, same filters, same
//! inputs once whitespace-normalized) collapse to a single winner. The
//! winner is the lexicographically smallest `(repository, workflow)` pair;
//! every other member of the equivalence class is reported as skipped,
//! naming the winner it deferred to.

use std::collections::BTreeMap;

use fanout_types::SubscriptionMatch;

/// One survivor that lost its diamond-equivalence class to another.
#[derive(Debug, Clone)]
pub struct SkippedByDiamond {
    pub repository: String,
    pub workflow: String,
    pub winner_repository: String,
    pub winner_workflow: String,
}

/// Split `survivors` into the subset that should actually dispatch and the
/// subset skipped in favor of an equivalent winner. Order of `survivors`
/// does not affect which member wins (spec §8 "stable under input
/// permutation").
#[must_use]
pub fn resolve(survivors: Vec<SubscriptionMatch>) -> (Vec<SubscriptionMatch>, Vec<SkippedByDiamond>) {
    let mut classes: BTreeMap<(String, Vec<String>, Vec<(String, String)>), Vec<SubscriptionMatch>> = BTreeMap::new();
    for m in survivors {
        classes.entry(m.subscription.diamond_key()).or_default().push(m);
    }

    let mut dispatched = Vec::new();
    let mut skipped = Vec::new();

    for (_key, mut members) in classes {
        members.sort_by(|a, b| (&a.repository, &a.subscription.workflow).cmp(&(&b.repository, &b.subscription.workflow)));
        let mut members = members.into_iter();
        let winner = members.next().expect("equivalence class is never empty");
        for loser in members {
            skipped.push(SkippedByDiamond {
                repository: loser.repository.clone(),
                workflow: loser.subscription.workflow.clone(),
                winner_repository: winner.repository.clone(),
                winner_workflow: winner.subscription.workflow.clone(),
            });
        }
        dispatched.push(winner);
    }

    dispatched.sort_by(|a, b| a.repository.cmp(&b.repository));
    (dispatched, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fanout_types::Subscription;
    use std::collections::BTreeMap as Map;

    fn subscription_match(repo: &str, workflow: &str, filters: &[&str]) -> SubscriptionMatch {
        SubscriptionMatch {
            subscription: Subscription {
                artifact: format!("{repo}:default"),
                events: vec!["release.published".to_string()],
                workflow: workflow.to_string(),
                schema_version: None,
                filters: filters.iter().map(|s| s.to_string()).collect(),
                inputs: Map::new(),
            },
            repository: repo.to_string(),
            local_path: format!("/tmp/{repo}"),
        }
    }

    #[test]
    fn equivalent_subscriptions_across_repos_collapse_to_one_winner() {
        let survivors = vec![
            subscription_match("org/r2", "build", &["v != null"]),
            subscription_match("org/r1", "build", &["v != null"]),
        ];

        let (dispatched, skipped) = resolve(survivors);

        assert_eq!(dispatched.len(), 1);
        assert_eq!(dispatched[0].repository, "org/r1");
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].repository, "org/r2");
        assert_eq!(skipped[0].winner_repository, "org/r1");
    }

    #[test]
    fn different_workflows_in_same_repo_are_not_skipped() {
        let survivors = vec![subscription_match("org/r1", "build", &[]), subscription_match("org/r1", "deploy", &[])];

        let (dispatched, skipped) = resolve(survivors);

        assert_eq!(dispatched.len(), 2);
        assert!(skipped.is_empty());
    }

    #[test]
    fn winner_is_stable_under_input_permutation() {
        let a = vec![
            subscription_match("org/r1", "build", &["v != null"]),
            subscription_match("org/r2", "build", &["v != null"]),
        ];
        let b = vec![
            subscription_match("org/r2", "build", &["v != null"]),
            subscription_match("org/r1", "build", &["v != null"]),
        ];

        let (dispatched_a, _) = resolve(a);
        let (dispatched_b, _) = resolve(b);
        assert_eq!(dispatched_a[0].repository, dispatched_b[0].repository);
    }
}
