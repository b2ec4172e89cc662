//! The Merge Stage (spec.md §4.F): merge, delete the head ref, emit, then
//! re-seed the pipeline with every remaining open pull request so cascading
//! rebases trigger.

use std::sync::Arc;

use forge::{Forge, PullRequest, list_open_pull_requests_or_drop};
use tokio::sync::mpsc;

/// Fixed commit message identifier for merges (spec.md §4.F step 1).
pub const MERGE_COMMIT_MESSAGE: &str = "rebase-bot: merge";

pub async fn merge_stage(
    mut input: mpsc::Receiver<PullRequest>,
    merged_output: mpsc::Sender<PullRequest>,
    reseed_output: mpsc::Sender<PullRequest>,
    forge: Arc<dyn Forge>,
) {
    while let Some(pr) = input.recv().await {
        if let Err(err) = forge
            .merge_pull_request(&pr.repo, pr.id, MERGE_COMMIT_MESSAGE)
            .await
        {
            tracing::warn!(pr = pr.id, error = %err, "merge rejected, dropping pull request");
            continue;
        }

        let head_ref = format!("heads/{}", pr.head_branch);
        if let Err(err) = forge.delete_ref(&pr.repo, &head_ref).await {
            tracing::warn!(pr = pr.id, error = %err, "failed to delete head ref after merge");
        }

        let repo = pr.repo.clone();
        if merged_output.send(pr).await.is_err() {
            return;
        }

        for open_pr in list_open_pull_requests_or_drop(forge.as_ref(), &repo).await {
            if reseed_output.send(open_pr).await.is_err() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge::{Branch, Mergeable, PullRequestState, RepoId, Sha, testing::FakeForge};

    fn pr(repo: &RepoId, id: u64, branch: &str) -> PullRequest {
        PullRequest {
            id,
            repo: repo.clone(),
            state: PullRequestState::Open,
            head_branch: Branch::from(branch),
            head_sha: Sha::from("sha"),
            mergeable: Mergeable::True,
        }
    }

    #[tokio::test]
    async fn merge_then_delete_then_reseed_remaining_open_prs() {
        let repo = RepoId::new("acme", "widget");
        let forge = FakeForge::new();
        forge.seed_pull_request(pr(&repo, 1, "feat-x"));
        forge.seed_pull_request(pr(&repo, 2, "feat-y"));
        let forge = Arc::new(forge);

        let (tx, rx) = mpsc::channel(8);
        let (merged_tx, mut merged_rx) = mpsc::channel(8);
        let (reseed_tx, mut reseed_rx) = mpsc::channel(8);
        tokio::spawn(merge_stage(rx, merged_tx, reseed_tx, forge.clone()));

        tx.send(pr(&repo, 1, "feat-x")).await.unwrap();
        drop(tx);

        let merged = merged_rx.recv().await.unwrap();
        assert_eq!(merged.id, 1);
        assert_eq!(forge.merge_calls(), vec![(repo.clone(), 1)]);
        assert_eq!(
            forge.deleted_refs(),
            vec![(repo.clone(), "heads/feat-x".to_string())]
        );

        // PR 1 is now closed in the fake, so the reseed sees only PR 2.
        let reseeded = reseed_rx.recv().await.unwrap();
        assert_eq!(reseeded.id, 2);
    }

    #[tokio::test]
    async fn failed_merge_drops_pull_request_without_delete_or_reseed() {
        let repo = RepoId::new("acme", "widget");
        let forge = FakeForge::new();
        forge.seed_pull_request(pr(&repo, 1, "feat-x"));
        forge.fail_merge();
        let forge = Arc::new(forge);

        let (tx, rx) = mpsc::channel(8);
        let (merged_tx, mut merged_rx) = mpsc::channel(8);
        let (reseed_tx, _reseed_rx) = mpsc::channel(8);
        tokio::spawn(merge_stage(rx, merged_tx, reseed_tx, forge.clone()));

        tx.send(pr(&repo, 1, "feat-x")).await.unwrap();
        drop(tx);

        assert!(merged_rx.recv().await.is_none());
        assert!(forge.deleted_refs().is_empty());
    }
}
