//! An in-memory `Forge` double. Not `#[cfg(test)]`-gated: the `pipeline`
//! crate's own test suite depends on it (as a dev-dependency) to exercise
//! the event-flow pipeline without a network.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;

use crate::{
    CombinedState, Forge, ForgeError, Hook, Issue, Mergeable, PullRequest, PullRequestState,
    RepoId, Sha,
};

#[derive(Default)]
struct State {
    pull_requests: HashMap<(RepoId, u64), PullRequest>,
    issues: HashMap<(RepoId, u64), Issue>,
    statuses: HashMap<(RepoId, Sha), CombinedState>,
    hooks: HashMap<RepoId, Vec<Hook>>,
    next_hook_id: u64,
    merge_calls: Vec<(RepoId, u64)>,
    merge_should_fail: bool,
    deleted_refs: Vec<(RepoId, String)>,
    delete_ref_should_fail: bool,
    list_calls: u64,
    forced_transient: bool,
}

/// A fully in-memory forge, seeded by the test and then asserted against
/// after driving the pipeline.
#[derive(Clone, Default)]
pub struct FakeForge {
    state: Arc<Mutex<State>>,
}

impl FakeForge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_pull_request(&self, pr: PullRequest) {
        let mut state = self.state.lock().unwrap();
        state.pull_requests.insert((pr.repo.clone(), pr.id), pr);
    }

    pub fn seed_issue(&self, repo: &RepoId, number: u64, labels: Vec<String>) {
        let mut state = self.state.lock().unwrap();
        state
            .issues
            .insert((repo.clone(), number), Issue { number, labels });
    }

    pub fn seed_status(&self, repo: &RepoId, sha: &Sha, state_val: CombinedState) {
        let mut state = self.state.lock().unwrap();
        state.statuses.insert((repo.clone(), sha.clone()), state_val);
    }

    pub fn set_mergeable(&self, repo: &RepoId, number: u64, mergeable: Mergeable) {
        let mut state = self.state.lock().unwrap();
        if let Some(pr) = state.pull_requests.get_mut(&(repo.clone(), number)) {
            pr.mergeable = mergeable;
        }
    }

    pub fn close_pull_request(&self, repo: &RepoId, number: u64) {
        let mut state = self.state.lock().unwrap();
        if let Some(pr) = state.pull_requests.get_mut(&(repo.clone(), number)) {
            pr.state = PullRequestState::Closed;
        }
    }

    pub fn fail_merge(&self) {
        self.state.lock().unwrap().merge_should_fail = true;
    }

    pub fn fail_delete_ref(&self) {
        self.state.lock().unwrap().delete_ref_should_fail = true;
    }

    /// Every call to every method returns a transient error until cleared.
    pub fn force_transient_errors(&self, on: bool) {
        self.state.lock().unwrap().forced_transient = on;
    }

    pub fn merge_calls(&self) -> Vec<(RepoId, u64)> {
        self.state.lock().unwrap().merge_calls.clone()
    }

    pub fn deleted_refs(&self) -> Vec<(RepoId, String)> {
        self.state.lock().unwrap().deleted_refs.clone()
    }

    pub fn list_call_count(&self) -> u64 {
        self.state.lock().unwrap().list_calls
    }

    pub fn labels_of(&self, repo: &RepoId, number: u64) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .issues
            .get(&(repo.clone(), number))
            .map(|i| i.labels.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Forge for FakeForge {
    async fn get_pull_request(
        &self,
        repo: &RepoId,
        number: u64,
    ) -> Result<PullRequest, ForgeError> {
        let state = self.state.lock().unwrap();
        if state.forced_transient {
            return Err(ForgeError::Transient("forced".into()));
        }
        state
            .pull_requests
            .get(&(repo.clone(), number))
            .cloned()
            .ok_or_else(|| ForgeError::Transient(format!("no such pull request #{number}")))
    }

    async fn list_pull_requests(
        &self,
        repo: &RepoId,
        pr_state: PullRequestState,
    ) -> Result<Vec<PullRequest>, ForgeError> {
        let mut state = self.state.lock().unwrap();
        state.list_calls += 1;
        if state.forced_transient {
            return Err(ForgeError::Transient("forced".into()));
        }
        Ok(state
            .pull_requests
            .values()
            .filter(|pr| pr.repo == *repo && pr.state == pr_state)
            .cloned()
            .collect())
    }

    async fn get_issue(&self, repo: &RepoId, number: u64) -> Result<Issue, ForgeError> {
        let state = self.state.lock().unwrap();
        if state.forced_transient {
            return Err(ForgeError::Transient("forced".into()));
        }
        state
            .issues
            .get(&(repo.clone(), number))
            .cloned()
            .ok_or_else(|| ForgeError::Transient(format!("no such issue #{number}")))
    }

    async fn get_combined_status(
        &self,
        repo: &RepoId,
        sha: &Sha,
    ) -> Result<CombinedState, ForgeError> {
        let state = self.state.lock().unwrap();
        if state.forced_transient {
            return Err(ForgeError::Transient("forced".into()));
        }
        Ok(state
            .statuses
            .get(&(repo.clone(), sha.clone()))
            .copied()
            .unwrap_or(CombinedState::Absent))
    }

    async fn add_label(
        &self,
        repo: &RepoId,
        issue_number: u64,
        label: &str,
    ) -> Result<(), ForgeError> {
        let mut state = self.state.lock().unwrap();
        if state.forced_transient {
            return Err(ForgeError::Transient("forced".into()));
        }
        let issue = state
            .issues
            .entry((repo.clone(), issue_number))
            .or_insert_with(|| Issue {
                number: issue_number,
                labels: Vec::new(),
            });
        if !issue.labels.iter().any(|l| l == label) {
            issue.labels.push(label.to_string());
        }
        Ok(())
    }

    async fn merge_pull_request(
        &self,
        repo: &RepoId,
        number: u64,
        _message: &str,
    ) -> Result<(), ForgeError> {
        let mut state = self.state.lock().unwrap();
        state.merge_calls.push((repo.clone(), number));
        if state.merge_should_fail {
            return Err(ForgeError::MergeRejected("forced failure".into()));
        }
        if let Some(pr) = state.pull_requests.get_mut(&(repo.clone(), number)) {
            pr.state = PullRequestState::Closed;
        }
        Ok(())
    }

    async fn delete_ref(&self, repo: &RepoId, ref_name: &str) -> Result<(), ForgeError> {
        let mut state = self.state.lock().unwrap();
        if state.delete_ref_should_fail {
            return Err(ForgeError::Transient("forced delete-ref failure".into()));
        }
        state.deleted_refs.push((repo.clone(), ref_name.to_string()));
        Ok(())
    }

    async fn list_hooks(&self, repo: &RepoId) -> Result<Vec<Hook>, ForgeError> {
        let state = self.state.lock().unwrap();
        Ok(state.hooks.get(repo).cloned().unwrap_or_default())
    }

    async fn create_hook(&self, repo: &RepoId, webhook_url: &str) -> Result<Hook, ForgeError> {
        let mut state = self.state.lock().unwrap();
        state.next_hook_id += 1;
        let hook = Hook {
            id: state.next_hook_id,
            url: webhook_url.to_string(),
        };
        state.hooks.entry(repo.clone()).or_default().push(hook.clone());
        Ok(hook)
    }

    async fn delete_hook(&self, repo: &RepoId, hook_id: u64) -> Result<(), ForgeError> {
        let mut state = self.state.lock().unwrap();
        if let Some(hooks) = state.hooks.get_mut(repo) {
            hooks.retain(|h| h.id != hook_id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Branch, PullRequestState};

    fn pr(repo: &RepoId, id: u64) -> PullRequest {
        PullRequest {
            id,
            repo: repo.clone(),
            state: PullRequestState::Open,
            head_branch: Branch::from("feat-x"),
            head_sha: Sha::from("abc123"),
            mergeable: Mergeable::True,
        }
    }

    #[tokio::test]
    async fn merge_then_delete_ref_are_recorded() {
        let repo = RepoId::new("acme", "widget");
        let forge = FakeForge::new();
        forge.seed_pull_request(pr(&repo, 1));

        forge.merge_pull_request(&repo, 1, "merge").await.unwrap();
        forge.delete_ref(&repo, "heads/feat-x").await.unwrap();

        assert_eq!(forge.merge_calls(), vec![(repo.clone(), 1)]);
        assert_eq!(
            forge.deleted_refs(),
            vec![(repo, "heads/feat-x".to_string())]
        );
    }

    #[tokio::test]
    async fn add_label_is_idempotent() {
        let repo = RepoId::new("acme", "widget");
        let forge = FakeForge::new();
        forge.add_label(&repo, 1, "WIP").await.unwrap();
        forge.add_label(&repo, 1, "WIP").await.unwrap();
        assert_eq!(forge.labels_of(&repo, 1), vec!["WIP".to_string()]);
    }
}
