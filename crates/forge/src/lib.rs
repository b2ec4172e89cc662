//! The forge client: the core's only window onto the hosted source-forge
//! service. `Forge` is the trait the pipeline crate programs against;
//! `github::GitHubForge` is the production implementation over `octocrab`,
//! and `testing::FakeForge` is an in-memory double used by the pipeline
//! crate's own tests (and by this crate's tests of pagination/label
//! behavior).

pub mod error;
pub mod github;
pub mod testing;
pub mod types;

pub use error::ForgeError;
pub use types::*;

use async_trait::async_trait;

/// A repository webhook, as named in spec.md §6 ("list/create/delete
/// repository webhooks").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hook {
    pub id: u64,
    pub url: String,
}

/// Everything the core needs from the forge. Kept intentionally narrow —
/// see spec.md §6's "Forge client" collaborator list.
#[async_trait]
pub trait Forge: Send + Sync {
    async fn get_pull_request(
        &self,
        repo: &RepoId,
        number: u64,
    ) -> Result<PullRequest, ForgeError>;

    /// Lists pull requests in `state`, paginating internally so repos with
    /// more than one page of open PRs are not silently truncated (see
    /// spec.md §9's Open Question about pagination).
    async fn list_pull_requests(
        &self,
        repo: &RepoId,
        state: PullRequestState,
    ) -> Result<Vec<PullRequest>, ForgeError>;

    async fn get_issue(&self, repo: &RepoId, number: u64) -> Result<Issue, ForgeError>;

    async fn get_combined_status(
        &self,
        repo: &RepoId,
        sha: &Sha,
    ) -> Result<CombinedState, ForgeError>;

    async fn add_label(&self, repo: &RepoId, issue_number: u64, label: &str)
    -> Result<(), ForgeError>;

    /// Merge the given pull request. `message` is the fixed commit message
    /// identifier the merge stage passes (spec.md §4.F).
    async fn merge_pull_request(
        &self,
        repo: &RepoId,
        number: u64,
        message: &str,
    ) -> Result<(), ForgeError>;

    /// Delete `refs/<ref_name>`, e.g. `heads/feat-x`.
    async fn delete_ref(&self, repo: &RepoId, ref_name: &str) -> Result<(), ForgeError>;

    async fn list_hooks(&self, repo: &RepoId) -> Result<Vec<Hook>, ForgeError>;

    async fn create_hook(&self, repo: &RepoId, webhook_url: &str) -> Result<Hook, ForgeError>;

    async fn delete_hook(&self, repo: &RepoId, hook_id: u64) -> Result<(), ForgeError>;
}

/// Convenience helper used by translators: "list open PRs, drop on any
/// forge error" — every translator that pages the forge applies this same
/// transient-error policy (spec.md §4.B).
pub async fn list_open_pull_requests_or_drop(
    forge: &dyn Forge,
    repo: &RepoId,
) -> Vec<PullRequest> {
    match forge.list_pull_requests(repo, PullRequestState::Open).await {
        Ok(prs) => prs,
        Err(err) => {
            tracing::warn!(repo = %repo, error = %err, "dropping event: forge list failed");
            Vec::new()
        }
    }
}
