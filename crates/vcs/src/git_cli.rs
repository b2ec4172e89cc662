//! Thin `git` CLI wrapper. Grounded in the teacher's
//! `crates/services/src/services/git_cli.rs`: one `git()` helper that
//! shells out and classifies failures, plus a small set of named
//! operations built on top of it so call sites read as intent rather than
//! argv construction. Destructive/working-tree-touching operations go
//! through here rather than `git2`, for the same reasons the teacher
//! documents: the CLI enforces working-tree safety that libgit2 does not.

use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
    process::Command,
};

use thiserror::Error;
use utils::shell::resolve_executable_path;

#[derive(Debug, Error)]
pub enum GitCliError {
    #[error("git executable not found or not runnable")]
    NotAvailable,
    #[error("git command failed: {0}")]
    CommandFailed(String),
    #[error("push rejected: {0}")]
    PushRejected(String),
}

#[derive(Debug, Clone)]
pub struct WorktreeEntry {
    pub path: PathBuf,
    pub branch: Option<String>,
}

#[derive(Clone, Default)]
pub struct GitCli;

impl GitCli {
    pub fn new() -> Self {
        Self
    }

    /// `git clone <url> --branch <mainline> <dir>` — the Cache's initial
    /// clone (spec.md §4.G `Prepare`).
    pub fn clone_branch(&self, url: &str, branch: &str, dir: &Path) -> Result<(), GitCliError> {
        self.git(
            dir.parent().unwrap_or(dir),
            ["clone", url, "--branch", branch, &dir.to_string_lossy()],
        )?;
        Ok(())
    }

    /// `git fetch --all`
    pub fn fetch_all(&self, repo_path: &Path) -> Result<(), GitCliError> {
        self.git(repo_path, ["fetch", "--all"])?;
        Ok(())
    }

    /// `git fetch origin <branch>`
    pub fn fetch_branch(&self, repo_path: &Path, branch: &str) -> Result<(), GitCliError> {
        self.git(repo_path, ["fetch", "origin", branch])?;
        Ok(())
    }

    /// `git reset --hard <target>`
    pub fn reset_hard(&self, repo_path: &Path, target: &str) -> Result<(), GitCliError> {
        self.git(repo_path, ["reset", "--hard", target])?;
        Ok(())
    }

    /// `git rev-parse HEAD`
    pub fn rev_parse_head(&self, repo_path: &Path) -> Result<String, GitCliError> {
        Ok(self.git(repo_path, ["rev-parse", "HEAD"])?.trim().to_string())
    }

    pub fn worktree_add_at(
        &self,
        repo_path: &Path,
        worktree_path: &Path,
        start_point: &str,
    ) -> Result<(), GitCliError> {
        self.git(
            repo_path,
            [
                "worktree",
                "add",
                &worktree_path.to_string_lossy(),
                start_point,
            ],
        )?;
        Ok(())
    }

    pub fn worktree_remove(
        &self,
        repo_path: &Path,
        worktree_path: &Path,
    ) -> Result<(), GitCliError> {
        self.git(
            repo_path,
            ["worktree", "remove", "--force", &worktree_path.to_string_lossy()],
        )?;
        Ok(())
    }

    pub fn worktree_prune(&self, repo_path: &Path) -> Result<(), GitCliError> {
        self.git(repo_path, ["worktree", "prune"])?;
        Ok(())
    }

    pub fn list_worktrees(&self, repo_path: &Path) -> Result<Vec<WorktreeEntry>, GitCliError> {
        let out = self.git(repo_path, ["worktree", "list", "--porcelain"])?;
        let mut entries = Vec::new();
        let mut current_path: Option<PathBuf> = None;
        let mut current_branch: Option<String> = None;
        for line in out.lines() {
            if line.is_empty() {
                if let Some(path) = current_path.take() {
                    entries.push(WorktreeEntry {
                        path,
                        branch: current_branch.take(),
                    });
                }
            } else if let Some(path) = line.strip_prefix("worktree ") {
                current_path = Some(PathBuf::from(path));
            } else if let Some(branch_ref) = line.strip_prefix("branch ") {
                current_branch = branch_ref.strip_prefix("refs/heads/").map(str::to_string);
            }
        }
        if let Some(path) = current_path {
            entries.push(WorktreeEntry {
                path,
                branch: current_branch,
            });
        }
        Ok(entries)
    }

    pub fn checkout(&self, worktree_path: &Path, branch: &str) -> Result<(), GitCliError> {
        self.git(worktree_path, ["checkout", branch])?;
        Ok(())
    }

    pub fn checkout_new(&self, worktree_path: &Path, branch: &str) -> Result<(), GitCliError> {
        self.git(worktree_path, ["checkout", "-b", branch])?;
        Ok(())
    }

    /// `git push --set-upstream origin <branch> -f`
    pub fn force_push_with_upstream(
        &self,
        worktree_path: &Path,
        branch: &str,
    ) -> Result<(), GitCliError> {
        match self.git(
            worktree_path,
            ["push", "--set-upstream", "origin", branch, "-f"],
        ) {
            Ok(_) => Ok(()),
            Err(GitCliError::CommandFailed(msg)) => Err(self.classify(msg)),
            Err(e) => Err(e),
        }
    }

    /// `git config --global user.{name,email}` — set once at startup and
    /// treated as read-only afterward (spec.md §5).
    pub fn configure_global_identity(&self, name: &str, email: &str) -> Result<(), GitCliError> {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        self.git(&cwd, ["config", "--global", "user.name", name])?;
        self.git(&cwd, ["config", "--global", "user.email", email])?;
        Ok(())
    }

    fn classify(&self, msg: String) -> GitCliError {
        let lower = msg.to_ascii_lowercase();
        if lower.contains("non-fast-forward")
            || lower.contains("failed to push some refs")
            || lower.contains("updates were rejected")
        {
            GitCliError::PushRejected(msg)
        } else {
            GitCliError::CommandFailed(msg)
        }
    }

    pub fn git<I, S>(&self, repo_path: &Path, args: I) -> Result<String, GitCliError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let git = resolve_executable_path("git").ok_or(GitCliError::NotAvailable)?;
        let mut cmd = Command::new(git);
        cmd.current_dir(repo_path);
        for a in args {
            cmd.arg(a);
        }
        let out = cmd
            .output()
            .map_err(|e| GitCliError::CommandFailed(e.to_string()))?;
        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr).trim().to_string();
            return Err(GitCliError::CommandFailed(stderr));
        }
        Ok(String::from_utf8_lossy(&out.stdout).to_string())
    }
}
