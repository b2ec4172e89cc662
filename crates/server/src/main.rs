//! Process entry point: parse the CLI, connect to the forge, clone every
//! tracked repository's mainline, spawn each repository's pipeline, and
//! serve the webhook transport until a shutdown signal arrives.

mod config;
mod webhook;

use std::{collections::HashMap, sync::Arc};

use anyhow::Context;
use axum::{Router, routing::post};
use clap::Parser;
use config::{Cli, parse_tracked_repo};
use forge::{Forge, github::GitHubForge};
use pipeline::{PipelineConfig, RepoDescriptor, orchestrator::spawn_repo_pipeline};
use utils::CancellationToken;
use vcs::Cache;
use webhook::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    utils::logging::init();

    let cli = Cli::parse();
    let shutdown = CancellationToken::new();

    let tracked: Vec<config::TrackedRepo> = cli
        .repo
        .iter()
        .map(|spec| parse_tracked_repo(spec))
        .collect::<Result<_, _>>()
        .context("parsing --repo")?;

    if tracked.is_empty() {
        anyhow::bail!("at least one --repo is required");
    }

    // Fatal-at-startup per spec.md §7: an invalid token must abort the
    // whole process rather than fail on the first webhook.
    let forge: Arc<dyn Forge> = Arc::new(
        GitHubForge::connect(cli.token.clone())
            .await
            .context("connecting to GitHub")?,
    );

    let pipeline_config = PipelineConfig {
        merge_label: cli.merge_label.clone(),
        attach_wip_label: cli.attach_wip_label,
    };

    let mut repos = HashMap::new();
    for repo in &tracked {
        let clone_url = format!(
            "https://{}@github.com/{}/{}.git",
            cli.token, repo.owner, repo.name
        );
        tracing::info!(owner = %repo.owner, name = %repo.name, mainline = %repo.mainline, "cloning mainline");
        let cache = Cache::prepare(&clone_url, &repo.mainline, shutdown.child_token())
            .await
            .with_context(|| format!("cloning {}/{}", repo.owner, repo.name))?;

        let repo_id = forge::RepoId::new(repo.owner.clone(), repo.name.clone());

        // Best-effort: a forge that already has a matching hook, or a
        // forge call that fails transiently, should not abort startup.
        let webhook_url = format!(
            "https://{}/events/{}/{}",
            cli.public_dns, repo.owner, repo.name
        );
        if let Err(err) = forge.create_hook(&repo_id, &webhook_url).await {
            tracing::warn!(owner = %repo.owner, name = %repo.name, error = %err, "failed to register webhook");
        }

        let descriptor = RepoDescriptor {
            id: repo_id,
            mainline: repo.mainline.clone(),
            cache,
        };
        let demux = spawn_repo_pipeline(descriptor, forge.clone(), pipeline_config.clone());
        repos.insert((repo.owner.clone(), repo.name.clone()), demux);
    }

    let state = AppState {
        repos: Arc::new(repos),
    };

    let app = Router::new()
        .route("/events/{owner}/{name}", post(webhook::handle_event))
        .with_state(state);

    tracing::info!(addr = %cli.listen_addr, "listening");
    let listener = tokio::net::TcpListener::bind(cli.listen_addr)
        .await
        .context("binding listen address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown(shutdown))
        .await
        .context("serving webhook transport")?;

    Ok(())
}

async fn wait_for_shutdown(shutdown: CancellationToken) {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    tokio::select! {
        _ = ctrl_c => {}
        _ = shutdown.cancelled() => {}
    }
    shutdown.cancel();
    tracing::info!("shutdown signal received, draining in-flight work");
}
