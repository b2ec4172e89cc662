//! The webhook transport (spec.md §6): one HTTP endpoint per repository at
//! `/events/:owner/:name` that decodes one event per request based on the
//! `X-GitHub-Event` header and publishes it onto the matching typed queue.
//! A full queue makes this handler block — back-pressure to the forge is
//! intentional (spec.md §4.A).

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
};
use forge::{
    Branch, CombinedState, IssueEvent, PullRequest, PullRequestEvent, PullRequestState, PushEvent,
    RepoId, ReviewEvent, Sha, StatusEvent,
};
use pipeline::Demux;
use serde::Deserialize;

#[derive(Clone)]
pub struct AppState {
    pub repos: Arc<HashMap<(String, String), Demux>>,
}

#[derive(Deserialize)]
struct RepoPayload {
    name: String,
    owner: OwnerPayload,
}

#[derive(Deserialize)]
struct OwnerPayload {
    login: String,
}

impl RepoPayload {
    fn into_repo_id(self) -> RepoId {
        RepoId::new(self.owner.login, self.name)
    }
}

#[derive(Deserialize)]
struct PullRequestPayload {
    number: u64,
    state: String,
    head: HeadPayload,
    mergeable: Option<bool>,
}

#[derive(Deserialize)]
struct HeadPayload {
    #[serde(rename = "ref")]
    ref_field: String,
    sha: String,
}

#[derive(Deserialize)]
struct PullRequestWebhook {
    repository: RepoPayload,
    pull_request: PullRequestPayload,
}

#[derive(Deserialize)]
struct ReviewWebhook {
    repository: RepoPayload,
    pull_request: PullRequestPayload,
}

#[derive(Deserialize)]
struct IssueIdPayload {
    number: u64,
}

#[derive(Deserialize)]
struct IssueWebhook {
    repository: RepoPayload,
    issue: IssueIdPayload,
}

#[derive(Deserialize)]
struct BranchPayload {
    name: String,
}

#[derive(Deserialize)]
struct StatusWebhook {
    repository: RepoPayload,
    sha: String,
    state: String,
    branches: Vec<BranchPayload>,
}

#[derive(Deserialize)]
struct PushWebhook {
    repository: RepoPayload,
    #[serde(rename = "ref")]
    ref_field: String,
}

fn to_pull_request(repo: RepoId, payload: PullRequestPayload) -> PullRequest {
    let state = if payload.state == "open" {
        PullRequestState::Open
    } else {
        PullRequestState::Closed
    };
    PullRequest {
        id: payload.number,
        repo,
        state,
        head_branch: Branch::from(payload.head.ref_field),
        head_sha: Sha::from(payload.head.sha),
        mergeable: match payload.mergeable {
            Some(true) => forge::Mergeable::True,
            Some(false) => forge::Mergeable::False,
            None => forge::Mergeable::Unknown,
        },
    }
}

fn to_combined_state(state: &str) -> CombinedState {
    match state {
        "success" => CombinedState::Success,
        "pending" => CombinedState::Pending,
        "failure" => CombinedState::Failure,
        "error" => CombinedState::Error,
        _ => CombinedState::Absent,
    }
}

pub async fn handle_event(
    Path((owner, name)): Path<(String, String)>,
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let Some(demux) = state.repos.get(&(owner.clone(), name.clone())) else {
        tracing::warn!(%owner, %name, "webhook received for untracked repository");
        return StatusCode::NOT_FOUND;
    };

    let Some(event_kind) = headers
        .get("X-GitHub-Event")
        .and_then(|v| v.to_str().ok())
    else {
        return StatusCode::BAD_REQUEST;
    };

    let sent = match event_kind {
        "pull_request" => match serde_json::from_slice::<PullRequestWebhook>(&body) {
            Ok(payload) => {
                let repo = payload.repository.into_repo_id();
                let event = PullRequestEvent {
                    repo: repo.clone(),
                    pull_request: to_pull_request(repo, payload.pull_request),
                };
                demux.pull_request.send(event).await.is_ok()
            }
            Err(err) => {
                tracing::warn!(error = %err, "malformed pull_request webhook payload");
                return StatusCode::BAD_REQUEST;
            }
        },
        "pull_request_review" => match serde_json::from_slice::<ReviewWebhook>(&body) {
            Ok(payload) => {
                let event = ReviewEvent {
                    repo: payload.repository.into_repo_id(),
                    pull_request_number: payload.pull_request.number,
                };
                demux.review.send(event).await.is_ok()
            }
            Err(err) => {
                tracing::warn!(error = %err, "malformed pull_request_review webhook payload");
                return StatusCode::BAD_REQUEST;
            }
        },
        "issues" => match serde_json::from_slice::<IssueWebhook>(&body) {
            Ok(payload) => {
                let event = IssueEvent {
                    repo: payload.repository.into_repo_id(),
                    issue_number: payload.issue.number,
                };
                demux.issue.send(event).await.is_ok()
            }
            Err(err) => {
                tracing::warn!(error = %err, "malformed issues webhook payload");
                return StatusCode::BAD_REQUEST;
            }
        },
        "status" => match serde_json::from_slice::<StatusWebhook>(&body) {
            Ok(payload) => {
                let event = StatusEvent {
                    repo: payload.repository.into_repo_id(),
                    sha: Sha::from(payload.sha),
                    state: Some(to_combined_state(&payload.state)),
                    branches: payload.branches.into_iter().map(|b| Branch::from(b.name)).collect(),
                };
                demux.status.send(event).await.is_ok()
            }
            Err(err) => {
                tracing::warn!(error = %err, "malformed status webhook payload");
                return StatusCode::BAD_REQUEST;
            }
        },
        "push" => match serde_json::from_slice::<PushWebhook>(&body) {
            Ok(payload) => {
                let event = PushEvent {
                    repo: payload.repository.into_repo_id(),
                    ref_name: payload.ref_field,
                };
                demux.push.send(event).await.is_ok()
            }
            Err(err) => {
                tracing::warn!(error = %err, "malformed push webhook payload");
                return StatusCode::BAD_REQUEST;
            }
        },
        other => {
            tracing::debug!(event_kind = other, "ignoring unhandled webhook event kind");
            return StatusCode::OK;
        }
    };

    if sent {
        StatusCode::OK
    } else {
        tracing::warn!(%owner, %name, %event_kind, "demux queue closed, dropping event");
        StatusCode::SERVICE_UNAVAILABLE
    }
}
