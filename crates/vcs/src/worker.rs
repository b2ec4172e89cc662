//! The per-branch Worker (spec.md §4.H): an actor that owns one branch.
//! `Enqueue` transfers a signal channel onto the worker's inbox; a
//! dedicated loop (the "rebaser") services the inbox strictly FIFO, one
//! cycle at a time. Grounded in spec.md §9's design note: "use an actor
//! (per-branch task + inbox) rather than a mutex".

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use utils::CancellationToken;

use crate::{cache::Cache, error::VcsError, rebaser};

/// `{upToDate: bool, error: maybe Error}` from spec.md §3.
#[derive(Debug)]
pub struct RebaseSignal {
    pub up_to_date: bool,
    pub error: Option<VcsError>,
}

#[derive(Debug)]
pub struct EnqueueError;

/// A cheaply-`Clone`-able reference to a running Worker. Registered once
/// per branch in the Cache; every clone refers to the same actor.
#[derive(Clone)]
pub struct WorkerHandle {
    inbox: mpsc::Sender<oneshot::Sender<RebaseSignal>>,
    cancel: CancellationToken,
}

impl WorkerHandle {
    /// Deposit a fresh signal channel onto this worker's inbox (spec.md
    /// §4.E step 3). Requests are processed strictly FIFO, one at a time;
    /// a full inbox means a cycle is already in flight and this await
    /// suspends until it drains.
    pub async fn enqueue(&self, tx: oneshot::Sender<RebaseSignal>) -> Result<(), EnqueueError> {
        self.inbox.send(tx).await.map_err(|_| EnqueueError)
    }

    /// Stops the worker. Called by `Cache::cleanup`.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    #[cfg(test)]
    pub fn same_worker(&self, other: &WorkerHandle) -> bool {
        self.inbox.same_channel(&other.inbox)
    }
}

pub struct Worker;

impl Worker {
    /// Spawns the rebaser loop and returns a handle to it. The worker's
    /// cancellation token is a child of the Cache's shutdown token, so a
    /// process-wide shutdown stops every worker too, in addition to
    /// per-branch `Cleanup`.
    pub fn spawn(cache: Arc<Cache>, branch: String) -> WorkerHandle {
        let (tx, rx) = mpsc::channel(1);
        let cancel = cache.shutdown_token().child_token();
        let handle = WorkerHandle {
            inbox: tx,
            cancel: cancel.clone(),
        };
        tokio::spawn(run_loop(cache, branch, rx, cancel));
        handle
    }
}

async fn run_loop(
    cache: Arc<Cache>,
    branch: String,
    mut inbox: mpsc::Receiver<oneshot::Sender<RebaseSignal>>,
    cancel: CancellationToken,
) {
    loop {
        let reply_to = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(%branch, "worker cancelled, exiting");
                break;
            }
            maybe = inbox.recv() => match maybe {
                Some(reply_to) => reply_to,
                None => {
                    tracing::debug!(%branch, "worker inbox closed, exiting");
                    break;
                }
            },
        };

        let signal = rebaser::run_cycle(&cache, &branch).await;
        // Closing the signal channel after emission is implicit: sending
        // consumes `reply_to`, and dropping it on the error path below
        // closes it the same way spec.md §4.H step 7 requires.
        let _ = reply_to.send(signal);
    }
}
