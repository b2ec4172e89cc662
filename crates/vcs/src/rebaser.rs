//! The rebase cycle itself (spec.md §4.H). Built on
//! `utils::shell::CommandPipeline` so the whole cycle shares one combined
//! stdout/stderr buffer per phase and aborts on the first non-zero exit,
//! per spec.md §9's "subprocess composition" design note.

use std::path::PathBuf;

use utils::shell::CommandPipeline;

use crate::{cache::Cache, error::VcsError, worker::RebaseSignal};

const UP_TO_DATE_MARKER: &str = "is up to date";

fn worktree_path(cache: &Cache, branch: &str) -> PathBuf {
    let sanitized = branch.replace('/', "__");
    cache
        .cache_directory()
        .parent()
        .map(|p| p.join("worktrees").join(sanitized.clone()))
        .unwrap_or_else(|| cache.cache_directory().join("..").join("worktrees").join(sanitized))
}

/// Runs one full rebase cycle for `branch` against the Cache's mainline,
/// following spec.md §4.H steps 1–7 exactly. Never panics: every failure
/// becomes `RebaseSignal { error: Some(_), .. }`.
pub async fn run_cycle(cache: &std::sync::Arc<Cache>, branch: &str) -> RebaseSignal {
    let cache = std::sync::Arc::clone(cache);
    let branch = branch.to_string();
    let result = tokio::task::spawn_blocking(move || run_cycle_blocking(&cache, &branch)).await;

    match result {
        Ok(signal) => signal,
        Err(join_err) => RebaseSignal {
            up_to_date: false,
            error: Some(VcsError::WorktreeFailure(format!(
                "rebase cycle task panicked: {join_err}"
            ))),
        },
    }
}

fn run_cycle_blocking(cache: &Cache, branch: &str) -> RebaseSignal {
    // Step 1: remove any lingering worktree for this branch. Tolerate
    // absence — this is best-effort cleanup of a prior cycle.
    let cache_dir = cache.cache_directory().to_path_buf();
    let git = cache.git().clone();
    let _ = git.worktree_prune(&cache_dir);
    if let Ok(entries) = git.list_worktrees(&cache_dir) {
        for entry in entries {
            if entry.branch.as_deref() == Some(branch) {
                let _ = git.worktree_remove(&cache_dir, &entry.path);
            }
        }
    }
    let _ = git.worktree_prune(&cache_dir);

    let wt_path = worktree_path(cache, branch);
    if let Some(parent) = wt_path.parent()
        && let Err(e) = std::fs::create_dir_all(parent)
    {
        return failure(format!("failed to create worktree parent dir: {e}"));
    }

    // Step 2: fresh worktree checked out at remotes/origin/<branch>, then
    // switch to the local branch name.
    let mut setup = CommandPipeline::new(&cache_dir, "git");
    if let Err(e) = setup.step([
        "worktree",
        "add",
        &wt_path.to_string_lossy(),
        &format!("remotes/origin/{branch}"),
    ]) {
        return failure(e.to_string());
    }

    let mut cycle = CommandPipeline::new(&wt_path, "git");
    if let Err(e) = cycle.step(["checkout", branch]) {
        return failure(e.to_string());
    }

    // Step 3: update the worktree to the branch's current remote tip.
    if let Err(e) = cycle.step(["fetch", "origin", branch]) {
        return failure(e.to_string());
    }
    if let Err(e) = cycle.step(["reset", "--hard", &format!("origin/{branch}")]) {
        return failure(e.to_string());
    }

    // Step 4: rebase onto the current mainline tip.
    let rebase_output = match cycle.step(["rebase", &format!("origin/{}", cache.mainline_branch())])
    {
        Ok(stdout) => stdout,
        Err(e) => {
            // Leave the rebase in a clean state for the *next* cycle's
            // step 1 to tear down; do not attempt conflict resolution
            // here (spec.md NON-GOALS: the system never resolves
            // conflicts).
            return RebaseSignal {
                up_to_date: false,
                error: Some(VcsError::RebaseConflict(e.combined)),
            };
        }
    };

    let up_to_date = rebase_output.contains(UP_TO_DATE_MARKER);

    if up_to_date {
        // Step 6.
        return RebaseSignal {
            up_to_date: true,
            error: None,
        };
    }

    // Step 5: not up to date — force-push with upstream tracking.
    match cycle.step(["push", "--set-upstream", "origin", branch, "-f"]) {
        Ok(_) => RebaseSignal {
            up_to_date: false,
            error: None,
        },
        Err(e) => {
            let lower = e.combined.to_ascii_lowercase();
            let vcs_err = if lower.contains("non-fast-forward")
                || lower.contains("failed to push some refs")
                || lower.contains("updates were rejected")
            {
                VcsError::PushRejected(e.combined)
            } else {
                VcsError::WorktreeFailure(e.combined)
            };
            RebaseSignal {
                up_to_date: false,
                error: Some(vcs_err),
            }
        }
    }
}

fn failure(message: String) -> RebaseSignal {
    RebaseSignal {
        up_to_date: false,
        error: Some(VcsError::WorktreeFailure(message)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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
        run(origin.path(), &["config", "receive.denyCurrentBranch", "updateInstead"]);
        std::fs::write(origin.path().join("README.md"), "a\n").unwrap();
        run(origin.path(), &["add", "."]);
        run(origin.path(), &["commit", "-m", "initial"]);
        run(origin.path(), &["branch", "feat-x"]);
        origin
    }

    #[tokio::test]
    async fn up_to_date_branch_reports_no_push() {
        let origin = init_origin_with_branch();
        let url = origin.path().to_string_lossy().to_string();
        let cache = Cache::prepare(&url, "master", CancellationToken::new())
            .await
            .unwrap();

        let signal = run_cycle(&cache, "feat-x").await;
        assert!(signal.error.is_none());
        assert!(signal.up_to_date);
    }

    #[tokio::test]
    async fn branch_behind_mainline_gets_rebased_and_pushed() {
        let origin = init_origin_with_branch();

        // Advance feat-x with its own commit so rebase has work to do,
        // then advance master so feat-x is behind.
        let worker_checkout = tempfile::tempdir().unwrap();
        run(
            worker_checkout.path(),
            &["clone", &origin.path().to_string_lossy(), "."],
        );
        run(worker_checkout.path(), &["config", "user.email", "t@example.com"]);
        run(worker_checkout.path(), &["config", "user.name", "Test"]);
        run(worker_checkout.path(), &["checkout", "feat-x"]);
        std::fs::write(worker_checkout.path().join("feature.txt"), "x\n").unwrap();
        run(worker_checkout.path(), &["add", "."]);
        run(worker_checkout.path(), &["commit", "-m", "feature work"]);
        run(worker_checkout.path(), &["push", "origin", "feat-x"]);

        run(worker_checkout.path(), &["checkout", "master"]);
        std::fs::write(worker_checkout.path().join("mainline.txt"), "y\n").unwrap();
        run(worker_checkout.path(), &["add", "."]);
        run(worker_checkout.path(), &["commit", "-m", "mainline work"]);
        run(worker_checkout.path(), &["push", "origin", "master"]);

        let url = origin.path().to_string_lossy().to_string();
        let cache = Cache::prepare(&url, "master", CancellationToken::new())
            .await
            .unwrap();
        cache.update().await.unwrap();

        let signal = run_cycle(&cache, "feat-x").await;
        assert!(signal.error.is_none(), "{:?}", signal.error);
        assert!(!signal.up_to_date);
    }
}
