//! Errors surfaced out of the Rebase and Merge stages (spec.md §7).

use forge::ForgeError;
use thiserror::Error;
use vcs::VcsError;

/// The error carried on a `RebaseResult` (spec.md §4.E). `MainlineChanged`
/// is a distinguished sentinel, not a worker-level failure: it is computed
/// by the rebase stage itself by comparing two `Cache::update` revisions,
/// and the stage's own logging never treats it as an ordinary error path —
/// recycling a pull request is the expected outcome, not a failure.
#[derive(Debug, Error)]
pub enum RebaseError {
    #[error("mainline changed during rebase")]
    MainlineChanged,

    #[error(transparent)]
    Vcs(#[from] VcsError),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Forge(#[from] ForgeError),

    #[error(transparent)]
    Vcs(#[from] VcsError),
}
