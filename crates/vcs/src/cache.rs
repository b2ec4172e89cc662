//! The Repository Cache (spec.md §4.G): one shared local clone of a
//! repository's mainline branch, plus the branch → worker registry.
//! Mainline updates and worker-registry mutations share one mutex, exactly
//! as spec.md §3's invariant requires ("the mainline update operation is
//! mutually exclusive with itself and with worker-registry mutations").

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use tokio::sync::Mutex;
use utils::CancellationToken;

use crate::{
    error::VcsError,
    git_cli::GitCli,
    worker::{Worker, WorkerHandle},
};

struct Registry {
    workers: HashMap<String, WorkerHandle>,
}

/// Owns a shared clone directory for one repository's mainline branch.
/// Lives for the process lifetime (spec.md §3's Cache lifecycle).
pub struct Cache {
    dir: PathBuf,
    mainline: String,
    git: GitCli,
    registry: Mutex<Registry>,
    shutdown: CancellationToken,
}

impl Cache {
    /// `Prepare(url, mainlineBranch) -> Cache`: initial clone into a fresh
    /// temp directory. Failure here is fatal for the repository's startup
    /// (spec.md §4.G).
    pub async fn prepare(
        url: &str,
        mainline_branch: &str,
        shutdown: CancellationToken,
    ) -> Result<Arc<Cache>, VcsError> {
        let tmp = tempfile::Builder::new()
            .prefix("rebase-bot-cache-")
            .tempdir()
            .map_err(|e| VcsError::FatalAtStartup(format!("failed to create temp dir: {e}")))?;
        let dir = tmp.path().join("repo");
        let git = GitCli::new();

        let url = url.to_string();
        let branch = mainline_branch.to_string();
        let dir_clone = dir.clone();
        let git_clone = git.clone();
        tokio::task::spawn_blocking(move || git_clone.clone_branch(&url, &branch, &dir_clone))
            .await
            .map_err(|e| VcsError::FatalAtStartup(format!("clone task panicked: {e}")))?
            .map_err(|e| VcsError::FatalAtStartup(format!("initial clone failed: {e}")))?;

        // Keep the TempDir alive for the process lifetime by leaking it —
        // the Cache directory is meant to live until process exit, and
        // cache directories "may be discarded on exit" per spec.md §6.
        std::mem::forget(tmp);

        Ok(Arc::new(Cache {
            dir,
            mainline: mainline_branch.to_string(),
            git,
            registry: Mutex::new(Registry {
                workers: HashMap::new(),
            }),
            shutdown,
        }))
    }

    pub fn cache_directory(&self) -> &Path {
        &self.dir
    }

    pub fn mainline_branch(&self) -> &str {
        &self.mainline
    }

    pub fn git(&self) -> &GitCli {
        &self.git
    }

    /// `Update() -> revisionId`: fetch all remotes, hard-reset to
    /// `origin/<mainline>`, return the current HEAD revision. Serialized by
    /// the same mutex that guards the worker registry.
    pub async fn update(self: &Arc<Self>) -> Result<String, VcsError> {
        let registry = self.registry.lock().await;
        let result = self.update_locked().await;
        drop(registry);
        result
    }

    async fn update_locked(self: &Arc<Self>) -> Result<String, VcsError> {
        let git = self.git.clone();
        let dir = self.dir.clone();
        let mainline = self.mainline.clone();
        tokio::task::spawn_blocking(move || {
            git.fetch_all(&dir)?;
            git.reset_hard(&dir, &format!("origin/{mainline}"))?;
            git.rev_parse_head(&dir)
        })
        .await
        .map_err(|e| VcsError::WorktreeFailure(format!("update task panicked: {e}")))?
        .map_err(VcsError::from)
    }

    /// `Worker(branch) -> Worker`: return the existing worker, else
    /// create, register, and spawn it.
    pub async fn worker(self: &Arc<Self>, branch: &str) -> WorkerHandle {
        let mut registry = self.registry.lock().await;
        if let Some(existing) = registry.workers.get(branch) {
            return existing.clone();
        }
        let handle = Worker::spawn(Arc::clone(self), branch.to_string());
        registry.workers.insert(branch.to_string(), handle.clone());
        handle
    }

    /// `Cleanup(branch)`: idempotent. Stops the worker if one exists,
    /// removes any worktree for `branch`, and unregisters it.
    pub async fn cleanup(self: &Arc<Self>, branch: &str) {
        let mut registry = self.registry.lock().await;
        if let Some(handle) = registry.workers.remove(branch) {
            handle.cancel();
        }
        let _ = self.prune_worktree_for(branch).await;
    }

    /// Remove any lingering worktree for `branch` from the cache
    /// directory: prune, list, remove the matching path, prune again.
    /// Tolerates absence (spec.md §4.H step 1 and §4.G `Cleanup`).
    pub(crate) async fn prune_worktree_for(&self, branch: &str) -> Result<(), VcsError> {
        let git = self.git.clone();
        let dir = self.dir.clone();
        let branch = branch.to_string();
        tokio::task::spawn_blocking(move || {
            let _ = git.worktree_prune(&dir);
            if let Ok(entries) = git.list_worktrees(&dir) {
                for entry in entries {
                    if entry.branch.as_deref() == Some(branch.as_str()) {
                        let _ = git.worktree_remove(&dir, &entry.path);
                    }
                }
            }
            let _ = git.worktree_prune(&dir);
            Ok(())
        })
        .await
        .map_err(|e| VcsError::WorktreeFailure(format!("prune task panicked: {e}")))?
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;

    fn init_bare_origin() -> tempfile::TempDir {
        let origin = tempfile::tempdir().unwrap();
        let run = |args: &[&str]| {
            let status = Command::new("git")
                .args(args)
                .current_dir(origin.path())
                .status()
                .unwrap();
            assert!(status.success());
        };
        run(&["init", "--quiet", "--initial-branch=master"]);
        run(&["config", "user.email", "test@example.com"]);
        run(&["config", "user.name", "Test"]);
        std::fs::write(origin.path().join("README.md"), "hello\n").unwrap();
        run(&["add", "README.md"]);
        run(&["commit", "-m", "initial"]);
        origin
    }

    #[tokio::test]
    async fn prepare_clones_mainline_and_update_returns_head() {
        let origin = init_bare_origin();
        let url = origin.path().to_string_lossy().to_string();
        let cache = Cache::prepare(&url, "master", CancellationToken::new())
            .await
            .unwrap();

        let rev = cache.update().await.unwrap();
        assert_eq!(rev.len(), 40);
    }

    #[tokio::test]
    async fn cleanup_is_idempotent() {
        let origin = init_bare_origin();
        let url = origin.path().to_string_lossy().to_string();
        let cache = Cache::prepare(&url, "master", CancellationToken::new())
            .await
            .unwrap();

        cache.cleanup("no-such-branch").await;
        cache.cleanup("no-such-branch").await;
    }

    #[tokio::test]
    async fn worker_is_created_once_per_branch() {
        let origin = init_bare_origin();
        let url = origin.path().to_string_lossy().to_string();
        let cache = Cache::prepare(&url, "master", CancellationToken::new())
            .await
            .unwrap();

        let a = cache.worker("feat-x").await;
        let b = cache.worker("feat-x").await;
        assert!(a.same_worker(&b));
    }
}
