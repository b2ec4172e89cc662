//! The Event Demultiplexer (spec.md §4.A): per repository, five buffered
//! queues fed by the webhook layer, plus a status broadcaster that fans
//! one status stream to the per-PR-status and mainline-status translators
//! without loss.

use forge::{IssueEvent, PullRequestEvent, PushEvent, ReviewEvent, StatusEvent};
use tokio::{sync::mpsc, task::JoinHandle};

/// Buffer depth per queue (spec.md §4.A): enough to absorb forge bursts;
/// the webhook layer blocks (back-pressure, not drop) once full.
pub const QUEUE_DEPTH: usize = 100;

/// The sending half of each typed queue — handed to the webhook HTTP
/// layer so it can publish decoded events.
pub struct Demux {
    pub pull_request: mpsc::Sender<PullRequestEvent>,
    pub review: mpsc::Sender<ReviewEvent>,
    pub issue: mpsc::Sender<IssueEvent>,
    pub push: mpsc::Sender<PushEvent>,
    pub status: mpsc::Sender<StatusEvent>,
}

/// The receiving half handed to the translators (spec.md §4.B). The single
/// status queue is split into two independent streams by the broadcaster
/// below, so the per-PR-status and mainline-status translators each see
/// every status event exactly once.
pub struct DemuxStreams {
    pub pull_request: mpsc::Receiver<PullRequestEvent>,
    pub review: mpsc::Receiver<ReviewEvent>,
    pub issue: mpsc::Receiver<IssueEvent>,
    pub push: mpsc::Receiver<PushEvent>,
    pub per_pr_status: mpsc::Receiver<StatusEvent>,
    pub mainline_status: mpsc::Receiver<StatusEvent>,
}

/// Builds one repository's demultiplexer. Returns the broadcaster's join
/// handle so the orchestrator can await it at shutdown (it exits once the
/// inbound status queue closes).
pub fn new_demux() -> (Demux, DemuxStreams, JoinHandle<()>) {
    let (pr_tx, pr_rx) = mpsc::channel(QUEUE_DEPTH);
    let (review_tx, review_rx) = mpsc::channel(QUEUE_DEPTH);
    let (issue_tx, issue_rx) = mpsc::channel(QUEUE_DEPTH);
    let (push_tx, push_rx) = mpsc::channel(QUEUE_DEPTH);
    let (status_tx, status_rx) = mpsc::channel(QUEUE_DEPTH);

    let (per_pr_tx, per_pr_rx) = mpsc::channel(QUEUE_DEPTH);
    let (mainline_tx, mainline_rx) = mpsc::channel(QUEUE_DEPTH);

    let broadcaster = tokio::spawn(broadcast_status(status_rx, per_pr_tx, mainline_tx));

    (
        Demux {
            pull_request: pr_tx,
            review: review_tx,
            issue: issue_tx,
            push: push_tx,
            status: status_tx,
        },
        DemuxStreams {
            pull_request: pr_rx,
            review: review_rx,
            issue: issue_rx,
            push: push_rx,
            per_pr_status: per_pr_rx,
            mainline_status: mainline_rx,
        },
        broadcaster,
    )
}

/// One-producer, fixed-two-consumer fan-out: every inbound status event is
/// forwarded to both outputs before the next is read, so neither consumer
/// can observe events out of order relative to the other (spec.md §8
/// "Broadcaster lossless").
async fn broadcast_status(
    mut input: mpsc::Receiver<StatusEvent>,
    per_pr: mpsc::Sender<StatusEvent>,
    mainline: mpsc::Sender<StatusEvent>,
) {
    while let Some(event) = input.recv().await {
        if per_pr.send(event.clone()).await.is_err() {
            tracing::debug!("per-pr-status consumer gone, broadcaster exiting");
            return;
        }
        if mainline.send(event).await.is_err() {
            tracing::debug!("mainline-status consumer gone, broadcaster exiting");
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge::{CombinedState, RepoId, Sha};

    #[tokio::test]
    async fn broadcaster_forwards_each_event_to_both_consumers_exactly_once() {
        let (demux, mut streams, _broadcaster) = new_demux();
        let event = StatusEvent {
            repo: RepoId::new("acme", "widget"),
            sha: Sha::from("deadbeef"),
            state: Some(CombinedState::Success),
            branches: vec!["feat-x".into()],
        };

        demux.status.send(event.clone()).await.unwrap();

        let seen_per_pr = streams.per_pr_status.recv().await.unwrap();
        let seen_mainline = streams.mainline_status.recv().await.unwrap();
        assert_eq!(seen_per_pr, event);
        assert_eq!(seen_mainline, event);

        drop(demux);
        assert!(streams.per_pr_status.recv().await.is_none());
        assert!(streams.mainline_status.recv().await.is_none());
    }
}
