//! Fan-in of job return channels.

use super::job::{JobResult, ReturnChannel};
use tokio::sync::mpsc;

/// Merges `channels` into a single stream of results.
///
/// One relay task is spawned per input channel; each forwards its job's single
/// result to the shared output. Every relay owns a clone of the output
/// sender, so the sender count acts as the completion counter: the returned
/// receiver yields `None` only after all relays have delivered and exited.
///
/// Results arrive in completion order, not submission order. For `N` inputs
/// the output yields exactly `N` items: a job dropped without a result shows up
/// as [`bazaar_core::Error::JobAbandoned`] rather than stalling the stream.
///
/// There is no deadline at this layer. A job that never completes keeps the
/// stream open until the worker-side job timeout turns it into an error.
///
/// Must be called within a Tokio runtime.
pub fn merge<I>(channels: I) -> mpsc::Receiver<JobResult>
where
    I: IntoIterator<Item = ReturnChannel>,
{
    let channels: Vec<ReturnChannel> = channels.into_iter().collect();

    // Sized so that relays never wait on a slow consumer.
    let (tx, rx) = mpsc::channel(channels.len().max(1));

    for channel in channels {
        let tx = tx.clone();
        tokio::spawn(async move {
            let result = channel.await;
            if tx.send(result).await.is_err() {
                tracing::trace!("Merged stream dropped before all results arrived");
            }
        });
    }

    rx
}
