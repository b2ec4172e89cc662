//! Data the core reads from the forge. Deliberately thin — the core only
//! needs the handful of fields spec.md §3 names, not a full mirror of
//! GitHub's API surface.

use std::fmt;

use serde::{Deserialize, Serialize};

/// `(owner, name)` identity of a tracked repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoId {
    pub owner: String,
    pub name: String,
}

impl RepoId {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// A branch name, newtyped so rebase-stage call sites can't transpose it
/// with a commit sha or repo name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Branch(pub String);

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Branch {
    fn from(s: &str) -> Self {
        Branch(s.to_string())
    }
}

impl From<String> for Branch {
    fn from(s: String) -> Self {
        Branch(s)
    }
}

/// A commit id (sha), newtyped for the same reason as [`Branch`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sha(pub String);

impl fmt::Display for Sha {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Sha {
    fn from(s: &str) -> Self {
        Sha(s.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PullRequestState {
    Open,
    Closed,
}

/// Mergeability is a tri-state in the forge API: GitHub computes it
/// asynchronously and reports `null` while the computation is pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mergeable {
    True,
    False,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub id: u64,
    pub repo: RepoId,
    pub state: PullRequestState,
    pub head_branch: Branch,
    pub head_sha: Sha,
    pub mergeable: Mergeable,
}

/// Combined status state for a commit, as returned by the forge's combined
/// status endpoint. `Absent` models a later source revision's pointer that
/// may be missing entirely; it is treated as non-success everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CombinedState {
    Success,
    Pending,
    Failure,
    Error,
    Absent,
}

impl CombinedState {
    pub fn is_success(self) -> bool {
        matches!(self, CombinedState::Success)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub number: u64,
    pub labels: Vec<String>,
}

impl Issue {
    pub fn has_label_ci(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l.eq_ignore_ascii_case(label))
    }
}

/// Event kinds the core consumes, per spec.md §3.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WebhookEvent {
    PullRequest(PullRequestEvent),
    Review(ReviewEvent),
    Issue(IssueEvent),
    Status(StatusEvent),
    Push(PushEvent),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestEvent {
    pub repo: RepoId,
    pub pull_request: PullRequest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewEvent {
    pub repo: RepoId,
    pub pull_request_number: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueEvent {
    pub repo: RepoId,
    pub issue_number: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub repo: RepoId,
    pub sha: Sha,
    /// `None` models the absent-state pointer from §9 Open Questions.
    pub state: Option<CombinedState>,
    pub branches: Vec<Branch>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushEvent {
    pub repo: RepoId,
    /// Full ref, e.g. `refs/heads/master`.
    pub ref_name: String,
}
