//! Production `Forge` over `octocrab`, the GitHub dependency the teacher
//! workspace already carries (`crates/server`, `crates/services`).

use async_trait::async_trait;
use octocrab::{Octocrab, params};
use serde::Deserialize;

use crate::{
    CombinedState, ForgeError, Hook, Issue, Mergeable, PullRequest, PullRequestState, RepoId, Sha,
    error::ForgeError as Error,
};

pub struct GitHubForge {
    client: Octocrab,
}

impl GitHubForge {
    /// Builds the client and verifies the token by resolving the
    /// authenticated user — a forge-fatal-at-startup failure per spec.md
    /// §7 aborts the whole process, so we fail here rather than on the
    /// first webhook.
    pub async fn connect(token: String) -> Result<Self, Error> {
        let client = Octocrab::builder()
            .personal_token(token)
            .build()
            .map_err(|e| Error::FatalAtStartup(format!("failed to build GitHub client: {e}")))?;

        client
            .current()
            .user()
            .await
            .map_err(|e| Error::FatalAtStartup(format!("unable to resolve forge user: {e}")))?;

        Ok(Self { client })
    }

    fn classify(err: octocrab::Error) -> Error {
        Error::Transient(err.to_string())
    }
}

fn to_mergeable(mergeable: Option<bool>) -> Mergeable {
    match mergeable {
        Some(true) => Mergeable::True,
        Some(false) => Mergeable::False,
        None => Mergeable::Unknown,
    }
}

fn to_pull_request(repo: &RepoId, pr: octocrab::models::pulls::PullRequest) -> PullRequest {
    let state = match pr.state {
        Some(octocrab::models::IssueState::Open) => PullRequestState::Open,
        _ => PullRequestState::Closed,
    };
    let head_branch = pr.head.ref_field;
    let head_sha = pr.head.sha;
    PullRequest {
        id: pr.number,
        repo: repo.clone(),
        state,
        head_branch: head_branch.into(),
        head_sha: head_sha.into(),
        mergeable: to_mergeable(pr.mergeable),
    }
}

#[derive(Debug, Deserialize)]
struct CombinedStatusResponse {
    state: String,
}

#[derive(Debug, Deserialize)]
struct RawHook {
    id: u64,
    config: RawHookConfig,
}

#[derive(Debug, Deserialize)]
struct RawHookConfig {
    url: String,
}

#[async_trait]
impl crate::Forge for GitHubForge {
    async fn get_pull_request(
        &self,
        repo: &RepoId,
        number: u64,
    ) -> Result<PullRequest, ForgeError> {
        let pr = self
            .client
            .pulls(&repo.owner, &repo.name)
            .get(number)
            .await
            .map_err(Self::classify)?;
        Ok(to_pull_request(repo, pr))
    }

    async fn list_pull_requests(
        &self,
        repo: &RepoId,
        state: PullRequestState,
    ) -> Result<Vec<PullRequest>, ForgeError> {
        let gh_state = match state {
            PullRequestState::Open => params::State::Open,
            PullRequestState::Closed => params::State::Closed,
        };

        let mut page = self
            .client
            .pulls(&repo.owner, &repo.name)
            .list()
            .state(gh_state)
            .per_page(100)
            .send()
            .await
            .map_err(Self::classify)?;

        let mut out = Vec::new();
        loop {
            out.extend(page.items.drain(..).map(|pr| to_pull_request(repo, pr)));
            page = match self
                .client
                .get_page(&page.next)
                .await
                .map_err(Self::classify)?
            {
                Some(next) => next,
                None => break,
            };
        }
        Ok(out)
    }

    async fn get_issue(&self, repo: &RepoId, number: u64) -> Result<Issue, ForgeError> {
        let issue = self
            .client
            .issues(&repo.owner, &repo.name)
            .get(number)
            .await
            .map_err(Self::classify)?;
        Ok(Issue {
            number: issue.number,
            labels: issue.labels.into_iter().map(|l| l.name).collect(),
        })
    }

    async fn get_combined_status(
        &self,
        repo: &RepoId,
        sha: &Sha,
    ) -> Result<CombinedState, ForgeError> {
        let route = format!(
            "/repos/{}/{}/commits/{}/status",
            repo.owner, repo.name, sha
        );
        let resp: CombinedStatusResponse = self
            .client
            .get(route, None::<&()>)
            .await
            .map_err(Self::classify)?;

        Ok(match resp.state.as_str() {
            "success" => CombinedState::Success,
            "pending" => CombinedState::Pending,
            "failure" => CombinedState::Failure,
            "error" => CombinedState::Error,
            _ => CombinedState::Absent,
        })
    }

    async fn add_label(
        &self,
        repo: &RepoId,
        issue_number: u64,
        label: &str,
    ) -> Result<(), ForgeError> {
        self.client
            .issues(&repo.owner, &repo.name)
            .add_labels(issue_number, &[label.to_string()])
            .await
            .map_err(Self::classify)?;
        Ok(())
    }

    async fn merge_pull_request(
        &self,
        repo: &RepoId,
        number: u64,
        message: &str,
    ) -> Result<(), ForgeError> {
        self.client
            .pulls(&repo.owner, &repo.name)
            .merge(number)
            .method(octocrab::params::pulls::MergeMethod::Merge)
            .message(message)
            .send()
            .await
            .map_err(|e| Error::MergeRejected(e.to_string()))?;
        Ok(())
    }

    async fn delete_ref(&self, repo: &RepoId, ref_name: &str) -> Result<(), ForgeError> {
        self.client
            .repos(&repo.owner, &repo.name)
            .delete_ref(&octocrab::params::repos::Reference::Branch(
                ref_name
                    .strip_prefix("heads/")
                    .unwrap_or(ref_name)
                    .to_string(),
            ))
            .await
            .map_err(Self::classify)?;
        Ok(())
    }

    async fn list_hooks(&self, repo: &RepoId) -> Result<Vec<Hook>, ForgeError> {
        let route = format!("/repos/{}/{}/hooks", repo.owner, repo.name);
        let raw: Vec<RawHook> = self
            .client
            .get(route, None::<&()>)
            .await
            .map_err(Self::classify)?;
        Ok(raw
            .into_iter()
            .map(|h| Hook {
                id: h.id,
                url: h.config.url,
            })
            .collect())
    }

    async fn create_hook(&self, repo: &RepoId, webhook_url: &str) -> Result<Hook, ForgeError> {
        let route = format!("/repos/{}/{}/hooks", repo.owner, repo.name);
        let body = serde_json::json!({
            "name": "web",
            "active": true,
            "events": ["pull_request", "pull_request_review", "issues", "status", "push"],
            "config": { "url": webhook_url, "content_type": "json" },
        });
        let raw: RawHook = self
            .client
            .post(route, Some(&body))
            .await
            .map_err(Self::classify)?;
        Ok(Hook {
            id: raw.id,
            url: raw.config.url,
        })
    }

    async fn delete_hook(&self, repo: &RepoId, hook_id: u64) -> Result<(), ForgeError> {
        let route = format!("/repos/{}/{}/hooks/{hook_id}", repo.owner, repo.name);
        self.client
            .delete(route, None::<&()>)
            .await
            .map_err(Self::classify)?;
        Ok(())
    }
}
