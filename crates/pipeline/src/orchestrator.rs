//! Wires the whole topology together for one repository (spec.md §2):
//! demux → translators → fan-in → eligibility → rebase stage → merge
//! stage, plus the two back-edges the spec calls out — `MainlineChanged`
//! recycles into the eligibility filter's input, and a completed merge
//! re-seeds every remaining open pull request into the same queue.

use std::sync::Arc;

use forge::Forge;
use tokio::sync::mpsc;

use crate::{
    config::PipelineConfig,
    demux::{self, QUEUE_DEPTH},
    eligibility::{self, EligibilityConfig},
    error::RebaseError,
    merge_fan_in, merge_stage,
    rebase_stage::{self, RebaseResult},
    repo::RepoDescriptor,
    translate,
};

/// Spawns every stage of one repository's pipeline and returns the
/// `Demux` the webhook layer publishes decoded events onto. Every spawned
/// task runs for the process lifetime; they exit in turn once the
/// returned `Demux` (and the process-wide shutdown path) drop.
pub fn spawn_repo_pipeline(
    repo: RepoDescriptor,
    forge: Arc<dyn Forge>,
    config: PipelineConfig,
) -> demux::Demux {
    let (demux, streams, _broadcaster) = demux::new_demux();

    // Component B: one translator per typed queue, each feeding the
    // shared candidate queue below.
    let (pr_tx, pr_rx) = mpsc::channel(QUEUE_DEPTH);
    tokio::spawn(translate::pull_request_translator(
        streams.pull_request,
        pr_tx,
    ));

    let (review_tx, review_rx) = mpsc::channel(QUEUE_DEPTH);
    tokio::spawn(translate::review_translator(
        streams.review,
        review_tx,
        forge.clone(),
    ));

    let (issue_tx, issue_rx) = mpsc::channel(QUEUE_DEPTH);
    tokio::spawn(translate::issue_translator(
        streams.issue,
        issue_tx,
        forge.clone(),
    ));

    let (per_pr_status_tx, per_pr_status_rx) = mpsc::channel(QUEUE_DEPTH);
    tokio::spawn(translate::per_pr_status_translator(
        streams.per_pr_status,
        per_pr_status_tx,
        forge.clone(),
    ));

    let (mainline_status_tx, mainline_status_rx) = mpsc::channel(QUEUE_DEPTH);
    tokio::spawn(translate::mainline_status_translator(
        streams.mainline_status,
        mainline_status_tx,
        forge.clone(),
        repo.mainline.clone(),
    ));

    let (push_tx, push_rx) = mpsc::channel(QUEUE_DEPTH);
    tokio::spawn(translate::push_translator(
        streams.push,
        push_tx,
        forge.clone(),
        repo.mainline.clone(),
    ));

    // Component C: fan-in merger. `queue_tx` is the shared candidate queue
    // that the recycle and reseed back-edges also write into, so the
    // eligibility filter re-evaluates recycled and reseeded pull requests
    // exactly like any freshly-translated one.
    let (queue_tx, queue_rx) = mpsc::channel(QUEUE_DEPTH);
    merge_fan_in::merge(
        vec![pr_rx, review_rx, issue_rx, per_pr_status_rx, mainline_status_rx, push_rx],
        queue_tx.clone(),
    );

    // Component D: eligibility filter.
    let (eligible_tx, eligible_rx) = mpsc::channel(QUEUE_DEPTH);
    tokio::spawn(eligibility::eligibility_filter(
        queue_rx,
        eligible_tx,
        forge.clone(),
        EligibilityConfig {
            merge_label: config.merge_label.clone(),
            attach_wip_label: config.attach_wip_label,
        },
    ));

    // Component E: rebase stage.
    let (rebase_out_tx, mut rebase_out_rx) = mpsc::channel(QUEUE_DEPTH);
    tokio::spawn(rebase_stage::rebase_stage(
        eligible_rx,
        rebase_out_tx,
        Arc::clone(&repo.cache),
    ));

    // Split the rebase stage's results: a clean result feeds the merge
    // stage, `MainlineChanged` recycles back onto the shared queue, and
    // any other error is dropped with a log line (spec.md §4.E / §7).
    let (merge_input_tx, merge_input_rx) = mpsc::channel(QUEUE_DEPTH);
    let recycle_tx = queue_tx.clone();
    tokio::spawn(async move {
        while let Some(RebaseResult { pr, error }) = rebase_out_rx.recv().await {
            match error {
                None => {
                    if merge_input_tx.send(pr).await.is_err() {
                        break;
                    }
                }
                Some(RebaseError::MainlineChanged) => {
                    if recycle_tx.send(pr).await.is_err() {
                        break;
                    }
                }
                Some(err) => {
                    tracing::warn!(pr = pr.id, error = %err, "rebase failed, dropping pull request");
                }
            }
        }
    });

    // Component F: merge stage. Its reseed edge writes back onto the same
    // shared queue, so a merge's cascading rebases flow through the
    // eligibility filter exactly like any other candidate.
    let (merged_tx, mut merged_rx) = mpsc::channel(QUEUE_DEPTH);
    let reseed_tx = queue_tx.clone();
    tokio::spawn(merge_stage::merge_stage(
        merge_input_rx,
        merged_tx,
        reseed_tx,
        forge.clone(),
    ));

    // Nothing downstream consumes merged pull requests; drain them so the
    // merge stage is never blocked on a full channel.
    tokio::spawn(async move { while merged_rx.recv().await.is_some() {} });

    drop(queue_tx);

    demux
}
