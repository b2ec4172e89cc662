//! The Fan-in Merger (spec.md §4.C): merges N candidate-pull-request
//! streams into one. Closes its output once every input has closed, and
//! preserves per-input order while making no promise about interleaving
//! between inputs.

use forge::PullRequest;
use tokio::sync::mpsc;

/// Spawns one forwarder task per input, all writing into a shared output
/// channel; the output closes (its last `Sender` clone drops) once every
/// forwarder has drained its input to exhaustion.
pub fn merge(inputs: Vec<mpsc::Receiver<PullRequest>>, output: mpsc::Sender<PullRequest>) {
    for mut input in inputs {
        let output = output.clone();
        tokio::spawn(async move {
            while let Some(pr) = input.recv().await {
                if output.send(pr).await.is_err() {
                    return;
                }
            }
        });
    }
    // Drop our own clone so the channel closes once every spawned
    // forwarder's clone also drops.
    drop(output);
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge::{Branch, Mergeable, PullRequestState, RepoId, Sha};

    fn pr(id: u64) -> PullRequest {
        PullRequest {
            id,
            repo: RepoId::new("acme", "widget"),
            state: PullRequestState::Open,
            head_branch: Branch::from("feat-x"),
            head_sha: Sha::from("sha"),
            mergeable: Mergeable::True,
        }
    }

    #[tokio::test]
    async fn output_closes_once_all_inputs_close_and_emits_every_item() {
        let (tx_a, rx_a) = mpsc::channel(8);
        let (tx_b, rx_b) = mpsc::channel(8);
        let (out_tx, mut out_rx) = mpsc::channel(8);

        merge(vec![rx_a, rx_b], out_tx);

        tx_a.send(pr(1)).await.unwrap();
        tx_b.send(pr(2)).await.unwrap();
        tx_a.send(pr(3)).await.unwrap();
        drop(tx_a);
        drop(tx_b);

        let mut seen = Vec::new();
        while let Some(pr) = out_rx.recv().await {
            seen.push(pr.id);
        }
        seen.sort_unstable();
        assert_eq!(seen, vec![1, 2, 3]);
    }
}
