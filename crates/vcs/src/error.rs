use thiserror::Error;

use crate::git_cli::GitCliError;

/// Error kinds surfaced through the worker signal (spec.md §7). The Rebase
/// Stage drops the pull request and logs on any of these; `MainlineChanged`
/// is not represented here because it is not a worker-level failure — it is
/// computed by the rebase stage itself from two `Cache::update` revisions.
#[derive(Debug, Error)]
pub enum VcsError {
    #[error("rebase conflict: {0}")]
    RebaseConflict(String),

    #[error("push rejected: {0}")]
    PushRejected(String),

    #[error("worktree operation failed: {0}")]
    WorktreeFailure(String),

    #[error("fatal at startup: {0}")]
    FatalAtStartup(String),
}

impl From<GitCliError> for VcsError {
    fn from(err: GitCliError) -> Self {
        match err {
            GitCliError::PushRejected(msg) => VcsError::PushRejected(msg),
            other => VcsError::WorktreeFailure(other.to_string()),
        }
    }
}
