//! The Rebase Stage (spec.md §4.E): owns the Repository Cache and a Worker
//! Registry through the `vcs::Cache` handle. One continuation task per
//! in-flight pull request; the stage's output closes only once every
//! continuation has drained.

use std::sync::Arc;

use forge::PullRequest;
use tokio::{sync::mpsc, task::JoinSet};
use vcs::Cache;

use crate::error::RebaseError;

/// `{pr, error}` from spec.md §4.E: `error == None` means the branch is
/// ready to merge (already up to date, or rebased and pushed).
pub struct RebaseResult {
    pub pr: PullRequest,
    pub error: Option<RebaseError>,
}

pub async fn rebase_stage(
    mut input: mpsc::Receiver<PullRequest>,
    output: mpsc::Sender<RebaseResult>,
    cache: Arc<Cache>,
) {
    let mut in_flight = JoinSet::new();

    while let Some(pr) = input.recv().await {
        let cache = Arc::clone(&cache);
        let output = output.clone();
        in_flight.spawn(async move {
            run_one(pr, cache, output).await;
        });
    }

    // Drain every continuation before our own `output` clone drops, so
    // the stage closes its output only after all in-flight work finishes.
    while in_flight.join_next().await.is_some() {}
}

async fn run_one(pr: PullRequest, cache: Arc<Cache>, output: mpsc::Sender<RebaseResult>) {
    // Step 1: obtain the Worker for this branch, creating it on first use.
    let worker = cache.worker(&pr.head_branch.0).await;

    // Step 2: pre-rebase mainline revision.
    let rev1 = match cache.update().await {
        Ok(rev) => rev,
        Err(err) => {
            let _ = output
                .send(RebaseResult {
                    pr,
                    error: Some(RebaseError::Vcs(err)),
                })
                .await;
            return;
        }
    };

    // Step 3: enqueue a fresh signal channel; the worker rebases
    // asynchronously.
    let (tx, rx) = tokio::sync::oneshot::channel();
    if worker.enqueue(tx).await.is_err() {
        let _ = output
            .send(RebaseResult {
                pr,
                error: Some(RebaseError::Vcs(vcs::VcsError::WorktreeFailure(
                    "worker unavailable".to_string(),
                ))),
            })
            .await;
        return;
    }

    let signal = match rx.await {
        Ok(signal) => signal,
        Err(_) => {
            let _ = output
                .send(RebaseResult {
                    pr,
                    error: Some(RebaseError::Vcs(vcs::VcsError::WorktreeFailure(
                        "worker dropped without replying".to_string(),
                    ))),
                })
                .await;
            return;
        }
    };

    // Step 4: post-rebase mainline revision. A change between rev1 and
    // rev2 means mainline moved during this cycle, so the rebase (if any)
    // may already be stale — recycle rather than trust it.
    let rev2 = match cache.update().await {
        Ok(rev) => rev,
        Err(err) => {
            let _ = output
                .send(RebaseResult {
                    pr,
                    error: Some(RebaseError::Vcs(err)),
                })
                .await;
            return;
        }
    };

    if rev1 != rev2 {
        let _ = output
            .send(RebaseResult {
                pr,
                error: Some(RebaseError::MainlineChanged),
            })
            .await;
        return;
    }

    let error = signal.error.map(RebaseError::Vcs);
    let _ = output.send(RebaseResult { pr, error }).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge::{Branch, Mergeable, PullRequestState, RepoId, Sha};
    use std::process::Command;
    use utils::CancellationToken;

    fn run(dir: &std::path::Path, args: &[&str]) {
        let status = Command::new("git").args(args).current_dir(dir).status().unwrap();
        assert!(status.success(), "git {args:?} failed");
    }

    fn init_origin_with_branch() -> tempfile::TempDir {
        let origin = tempfile::tempdir().unwrap();
        run(origin.path(), &["init", "--quiet", "--initial-branch=master"]);
        run(origin.path(), &["config", "user.email", "test@example.com"]);
        run(origin.path(), &["config", "user.name", "Test"]);
        run(
            origin.path(),
            &["config", "receive.denyCurrentBranch", "updateInstead"],
        );
        std::fs::write(origin.path().join("README.md"), "a\n").unwrap();
        run(origin.path(), &["add", "."]);
        run(origin.path(), &["commit", "-m", "initial"]);
        run(origin.path(), &["branch", "feat-x"]);
        origin
    }

    fn pr(branch: &str) -> PullRequest {
        PullRequest {
            id: 1,
            repo: RepoId::new("acme", "widget"),
            state: PullRequestState::Open,
            head_branch: Branch::from(branch),
            head_sha: Sha::from("sha"),
            mergeable: Mergeable::True,
        }
    }

    #[tokio::test]
    async fn up_to_date_branch_is_emitted_without_error() {
        let origin = init_origin_with_branch();
        let url = origin.path().to_string_lossy().to_string();
        let cache = Cache::prepare(&url, "master", CancellationToken::new())
            .await
            .unwrap();

        let (tx, rx) = mpsc::channel(4);
        let (out_tx, mut out_rx) = mpsc::channel(4);
        tokio::spawn(rebase_stage(rx, out_tx, cache));

        tx.send(pr("feat-x")).await.unwrap();
        drop(tx);

        let result = out_rx.recv().await.unwrap();
        assert!(result.error.is_none());
        assert!(out_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn output_closes_only_after_in_flight_work_completes() {
        let origin = init_origin_with_branch();
        run(origin.path(), &["branch", "feat-y"]);
        let url = origin.path().to_string_lossy().to_string();
        let cache = Cache::prepare(&url, "master", CancellationToken::new())
            .await
            .unwrap();

        let (tx, rx) = mpsc::channel(4);
        let (out_tx, mut out_rx) = mpsc::channel(4);
        tokio::spawn(rebase_stage(rx, out_tx, cache));

        tx.send(pr("feat-x")).await.unwrap();
        tx.send(pr("feat-y")).await.unwrap();
        drop(tx);

        let mut seen = 0;
        while out_rx.recv().await.is_some() {
            seen += 1;
        }
        assert_eq!(seen, 2);
    }
}
