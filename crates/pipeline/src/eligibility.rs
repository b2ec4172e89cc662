//! The Eligibility Filter (spec.md §4.D): open, labeled, not known
//! unmergeable, green. Any forge error during the checks drops the
//! candidate silently.

use std::sync::Arc;

use forge::{Forge, ForgeError, Mergeable, PullRequest};
use tokio::sync::mpsc;

use crate::translate::is_open;

/// §9 Open Questions: the `WIP`-label side effect is configurable and
/// default-off.
#[derive(Debug, Clone)]
pub struct EligibilityConfig {
    pub merge_label: String,
    pub attach_wip_label: bool,
}

impl Default for EligibilityConfig {
    fn default() -> Self {
        Self {
            merge_label: "LGTM".to_string(),
            attach_wip_label: false,
        }
    }
}

pub async fn eligibility_filter(
    mut input: mpsc::Receiver<PullRequest>,
    output: mpsc::Sender<PullRequest>,
    forge: Arc<dyn Forge>,
    config: EligibilityConfig,
) {
    while let Some(pr) = input.recv().await {
        match is_eligible(&pr, forge.as_ref(), &config).await {
            Ok(true) => {
                if output.send(pr).await.is_err() {
                    return;
                }
            }
            Ok(false) => {}
            Err(err) => {
                tracing::debug!(pr = pr.id, error = %err, "dropping candidate: forge error during eligibility check");
            }
        }
    }
}

async fn is_eligible(
    pr: &PullRequest,
    forge: &dyn Forge,
    config: &EligibilityConfig,
) -> Result<bool, ForgeError> {
    if !is_open(pr) {
        return Ok(false);
    }

    let issue = forge.get_issue(&pr.repo, pr.id).await?;

    if issue.labels.is_empty() {
        if config.attach_wip_label {
            // Best-effort, idempotent: `add_label` itself de-dupes, so a
            // concurrent re-evaluation of the same PR cannot attach a
            // second `WIP` label.
            if let Err(err) = forge.add_label(&pr.repo, pr.id, "WIP").await {
                tracing::debug!(pr = pr.id, error = %err, "failed to attach WIP label");
            }
        }
        return Ok(false);
    }

    if !issue.has_label_ci(&config.merge_label) {
        return Ok(false);
    }

    if matches!(pr.mergeable, Mergeable::False) {
        return Ok(false);
    }

    let status = forge.get_combined_status(&pr.repo, &pr.head_sha).await?;
    Ok(status.is_success())
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge::{Branch, CombinedState, PullRequestState, RepoId, Sha, testing::FakeForge};

    fn pr(repo: &RepoId, id: u64, mergeable: Mergeable) -> PullRequest {
        PullRequest {
            id,
            repo: repo.clone(),
            state: PullRequestState::Open,
            head_branch: Branch::from("feat-x"),
            head_sha: Sha::from("sha"),
            mergeable,
        }
    }

    #[tokio::test]
    async fn unlabeled_pr_is_dropped_and_optionally_gets_wip() {
        let repo = RepoId::new("acme", "widget");
        let forge = FakeForge::new();
        forge.seed_issue(&repo, 1, vec![]);
        let forge = Arc::new(forge);
        let config = EligibilityConfig {
            merge_label: "LGTM".into(),
            attach_wip_label: true,
        };

        let (tx, rx) = mpsc::channel(8);
        let (out_tx, mut out_rx) = mpsc::channel(8);
        tokio::spawn(eligibility_filter(rx, out_tx, forge.clone(), config));

        tx.send(pr(&repo, 1, Mergeable::Unknown)).await.unwrap();
        drop(tx);

        assert!(out_rx.recv().await.is_none());
        assert_eq!(forge.labels_of(&repo, 1), vec!["WIP".to_string()]);
    }

    #[tokio::test]
    async fn mergeable_false_is_dropped_unknown_is_accepted() {
        let repo = RepoId::new("acme", "widget");
        let forge = FakeForge::new();
        forge.seed_issue(&repo, 1, vec!["LGTM".into()]);
        forge.seed_issue(&repo, 2, vec!["LGTM".into()]);
        forge.seed_status(&repo, &Sha::from("sha"), CombinedState::Success);
        let forge = Arc::new(forge);
        let config = EligibilityConfig::default();

        let (tx, rx) = mpsc::channel(8);
        let (out_tx, mut out_rx) = mpsc::channel(8);
        tokio::spawn(eligibility_filter(rx, out_tx, forge.clone(), config));

        tx.send(pr(&repo, 1, Mergeable::False)).await.unwrap();
        tx.send(pr(&repo, 2, Mergeable::Unknown)).await.unwrap();
        drop(tx);

        let emitted = out_rx.recv().await.unwrap();
        assert_eq!(emitted.id, 2);
        assert!(out_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn label_match_is_case_insensitive() {
        let repo = RepoId::new("acme", "widget");
        let forge = FakeForge::new();
        forge.seed_issue(&repo, 1, vec!["lgtm".into()]);
        forge.seed_status(&repo, &Sha::from("sha"), CombinedState::Success);
        let forge = Arc::new(forge);

        let (tx, rx) = mpsc::channel(8);
        let (out_tx, mut out_rx) = mpsc::channel(8);
        tokio::spawn(eligibility_filter(
            rx,
            out_tx,
            forge.clone(),
            EligibilityConfig::default(),
        ));

        tx.send(pr(&repo, 1, Mergeable::True)).await.unwrap();
        drop(tx);

        assert!(out_rx.recv().await.is_some());
    }
}
