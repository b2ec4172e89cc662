//! Event Translators (spec.md §4.B): one per event kind, each consuming its
//! typed input queue to exhaustion and closing its output when the input
//! closes. Transient forge errors are swallowed — the current event is
//! simply dropped, per spec.md §4.B / §7.

use forge::{
    Forge, IssueEvent, PullRequest, PullRequestEvent, PullRequestState, PushEvent, RepoId,
    ReviewEvent, StatusEvent, list_open_pull_requests_or_drop,
};
use tokio::sync::mpsc;

/// §9 Open Questions: later source revisions store status `state` as an
/// optional pointer; treat absence as non-success, same as any other
/// non-`success` state.
fn is_success(state: Option<forge::CombinedState>) -> bool {
    matches!(state, Some(s) if s.is_success())
}

/// Pass the embedded pull request through unchanged.
pub async fn pull_request_translator(
    mut input: mpsc::Receiver<PullRequestEvent>,
    output: mpsc::Sender<PullRequest>,
) {
    while let Some(event) = input.recv().await {
        if output.send(event.pull_request).await.is_err() {
            return;
        }
    }
}

/// Emit the pull request referenced by the review.
pub async fn review_translator(
    mut input: mpsc::Receiver<ReviewEvent>,
    output: mpsc::Sender<PullRequest>,
    forge: std::sync::Arc<dyn Forge>,
) {
    while let Some(event) = input.recv().await {
        match forge
            .get_pull_request(&event.repo, event.pull_request_number)
            .await
        {
            Ok(pr) => {
                if output.send(pr).await.is_err() {
                    return;
                }
            }
            Err(err) => {
                tracing::debug!(error = %err, "dropping review event: forge lookup failed");
            }
        }
    }
}

/// Query the forge for the issue's corresponding pull request (the forge
/// shares numbering between issues and pull requests); drop if the issue
/// is not actually a pull request.
pub async fn issue_translator(
    mut input: mpsc::Receiver<IssueEvent>,
    output: mpsc::Sender<PullRequest>,
    forge: std::sync::Arc<dyn Forge>,
) {
    while let Some(event) = input.recv().await {
        match forge.get_pull_request(&event.repo, event.issue_number).await {
            Ok(pr) => {
                if output.send(pr).await.is_err() {
                    return;
                }
            }
            Err(err) => {
                tracing::debug!(error = %err, "dropping issue event: not a pull request");
            }
        }
    }
}

/// Drop unless the combined state is `success`; then list open pull
/// requests and emit the first one whose head ref matches any branch
/// named in the status event.
pub async fn per_pr_status_translator(
    mut input: mpsc::Receiver<StatusEvent>,
    output: mpsc::Sender<PullRequest>,
    forge: std::sync::Arc<dyn Forge>,
) {
    while let Some(event) = input.recv().await {
        if !is_success(event.state) {
            continue;
        }
        let open = list_open_pull_requests_or_drop(forge.as_ref(), &event.repo).await;
        if let Some(pr) = open
            .into_iter()
            .find(|pr| event.branches.contains(&pr.head_branch))
            && output.send(pr).await.is_err()
        {
            return;
        }
    }
}

/// Drop unless the combined state is `success` AND one of the named
/// branches equals the repository mainline; then list and emit every open
/// pull request (a mainline green build can unblock any of them).
pub async fn mainline_status_translator(
    mut input: mpsc::Receiver<StatusEvent>,
    output: mpsc::Sender<PullRequest>,
    forge: std::sync::Arc<dyn Forge>,
    mainline: String,
) {
    while let Some(event) = input.recv().await {
        if !is_success(event.state) {
            continue;
        }
        if !event.branches.iter().any(|b| b.0 == mainline) {
            continue;
        }
        let open = list_open_pull_requests_or_drop(forge.as_ref(), &event.repo).await;
        for pr in open {
            if output.send(pr).await.is_err() {
                return;
            }
        }
    }
}

/// Drop unless the push ref equals `refs/heads/<mainline>`; then list and
/// emit every open pull request so a mainline advance re-triggers every
/// rebase.
pub async fn push_translator(
    mut input: mpsc::Receiver<PushEvent>,
    output: mpsc::Sender<PullRequest>,
    forge: std::sync::Arc<dyn Forge>,
    mainline: String,
) {
    let mainline_ref = format!("refs/heads/{mainline}");
    while let Some(event) = input.recv().await {
        if event.ref_name != mainline_ref {
            continue;
        }
        let open = list_open_pull_requests_or_drop(forge.as_ref(), &event.repo).await;
        for pr in open {
            if output.send(pr).await.is_err() {
                return;
            }
        }
    }
}

/// Only used for `list_pull_requests` filtering convenience in tests in
/// this module and in the eligibility filter.
pub(crate) fn is_open(pr: &PullRequest) -> bool {
    matches!(pr.state, PullRequestState::Open)
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge::{Branch, CombinedState, Mergeable, RepoId, Sha, testing::FakeForge};

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
    async fn status_translators_drop_non_success_states() {
        let repo = RepoId::new("acme", "widget");
        let forge = std::sync::Arc::new(FakeForge::new());
        let (tx, rx) = mpsc::channel(8);
        let (out_tx, mut out_rx) = mpsc::channel(8);

        tokio::spawn(per_pr_status_translator(rx, out_tx, forge.clone()));

        for state in [
            None,
            Some(CombinedState::Pending),
            Some(CombinedState::Failure),
            Some(CombinedState::Error),
        ] {
            tx.send(StatusEvent {
                repo: repo.clone(),
                sha: Sha::from("sha"),
                state,
                branches: vec!["feat-x".into()],
            })
            .await
            .unwrap();
        }
        drop(tx);

        assert!(out_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn per_pr_status_emits_first_matching_open_pr() {
        let repo = RepoId::new("acme", "widget");
        let forge = std::sync::Arc::new(FakeForge::new());
        forge.seed_pull_request(pr(&repo, 1, "feat-x"));
        forge.seed_pull_request(pr(&repo, 2, "feat-y"));

        let (tx, rx) = mpsc::channel(8);
        let (out_tx, mut out_rx) = mpsc::channel(8);
        tokio::spawn(per_pr_status_translator(rx, out_tx, forge.clone()));

        tx.send(StatusEvent {
            repo: repo.clone(),
            sha: Sha::from("sha"),
            state: Some(CombinedState::Success),
            branches: vec!["feat-x".into()],
        })
        .await
        .unwrap();
        drop(tx);

        let emitted = out_rx.recv().await.unwrap();
        assert_eq!(emitted.id, 1);
    }

    #[tokio::test]
    async fn push_translator_drops_non_mainline_refs() {
        let repo = RepoId::new("acme", "widget");
        let forge = std::sync::Arc::new(FakeForge::new());
        forge.seed_pull_request(pr(&repo, 1, "feat-x"));

        let (tx, rx) = mpsc::channel(8);
        let (out_tx, mut out_rx) = mpsc::channel(8);
        tokio::spawn(push_translator(rx, out_tx, forge.clone(), "master".into()));

        tx.send(PushEvent {
            repo: repo.clone(),
            ref_name: "refs/heads/feature".into(),
        })
        .await
        .unwrap();
        tx.send(PushEvent {
            repo: repo.clone(),
            ref_name: "refs/heads/master".into(),
        })
        .await
        .unwrap();
        drop(tx);

        let emitted = out_rx.recv().await.unwrap();
        assert_eq!(emitted.id, 1);
        assert!(out_rx.recv().await.is_none());
    }
}
