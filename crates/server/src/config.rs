//! The CLI surface (spec.md §6): "one option per — forge token, list of
//! `owner/name[#mainline]` pairs comma-separated, public DNS for webhook
//! registration, merge label, listen address." Grounded in
//! `wireapp-merge-pr`'s `clap::Parser` usage, the one teacher-pack repo
//! that already solves exactly this problem in Rust.

use std::net::SocketAddr;

use clap::Parser;

const DEFAULT_MAINLINE: &str = "master";

#[derive(Debug, Parser)]
#[command(about = "Keep labeled pull requests rebased onto mainline and merge them when green")]
pub struct Cli {
    /// GitHub personal access token. Falls back to the `GITHUB_TOKEN`
    /// environment variable.
    #[arg(long, env = "GITHUB_TOKEN")]
    pub token: String,

    /// Tracked repositories, comma-separated `owner/name[#mainline]`
    /// pairs (mainline defaults to `master` when omitted).
    #[arg(long, value_delimiter = ',')]
    pub repo: Vec<String>,

    /// Public DNS name this process is reachable at, used when
    /// registering webhooks with the forge.
    #[arg(long)]
    pub public_dns: String,

    /// Label the Eligibility Filter looks for (case-insensitive).
    #[arg(long, default_value = "LGTM")]
    pub merge_label: String,

    /// Address the webhook HTTP server listens on.
    #[arg(long, default_value = "0.0.0.0:8080")]
    pub listen_addr: SocketAddr,

    /// Attach a `WIP` label to unlabeled pull requests (default off; see
    /// the Eligibility Filter's documented Open Question).
    #[arg(long, default_value_t = false)]
    pub attach_wip_label: bool,
}

/// One parsed `owner/name[#mainline]` entry from `--repo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedRepo {
    pub owner: String,
    pub name: String,
    pub mainline: String,
}

#[derive(Debug, thiserror::Error)]
#[error("invalid --repo entry `{0}`, expected owner/name[#mainline]")]
pub struct RepoSpecError(String);

pub fn parse_tracked_repo(spec: &str) -> Result<TrackedRepo, RepoSpecError> {
    let (path, mainline) = match spec.split_once('#') {
        Some((path, mainline)) => (path, mainline.to_string()),
        None => (spec, DEFAULT_MAINLINE.to_string()),
    };
    let (owner, name) = path
        .split_once('/')
        .ok_or_else(|| RepoSpecError(spec.to_string()))?;
    if owner.is_empty() || name.is_empty() {
        return Err(RepoSpecError(spec.to_string()));
    }
    Ok(TrackedRepo {
        owner: owner.to_string(),
        name: name.to_string(),
        mainline,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_owner_name_with_default_mainline() {
        let repo = parse_tracked_repo("acme/widget").unwrap();
        assert_eq!(repo.owner, "acme");
        assert_eq!(repo.name, "widget");
        assert_eq!(repo.mainline, "master");
    }

    #[test]
    fn parses_explicit_mainline() {
        let repo = parse_tracked_repo("acme/widget#main").unwrap();
        assert_eq!(repo.mainline, "main");
    }

    #[test]
    fn rejects_missing_slash() {
        assert!(parse_tracked_repo("widget").is_err());
    }
}
