//! Zero-capacity job queue.
//!
//! Tokio's channels always buffer at least one message, so the queue is built
//! as a rendezvous instead: an idle worker registers a oneshot slot, and a
//! producer hands its job directly into the oldest registered slot. A
//! [`JobSender::send`] therefore completes only once some worker has actually
//! taken the job. That wait is the engine's backpressure.
//!
//! ```text
//!  producer ──send(job)──► [ idle slots: w3, w1, ... ] ◄──recv()── worker
//!                 └─────────── job ──────────────► w3
//! ```
//!
//! Producers are served in FIFO order through a fair async mutex. Workers that
//! stop waiting (e.g. during shutdown) leave a dead slot behind; a producer
//! that hits one simply offers the job to the next slot, so no job is lost or
//! duplicated.

use super::job::Job;
use bazaar_core::{Error, Result};
use std::{future, sync::Arc};
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio_util::sync::CancellationToken;

type Slot = oneshot::Sender<Job>;

struct Shared {
    /// Slots registered by idle workers, oldest first.
    idle: Mutex<mpsc::UnboundedReceiver<Slot>>,
    closed: CancellationToken,
}

/// Producer half of the job queue.
#[derive(Clone)]
pub struct JobSender {
    shared: Arc<Shared>,
}

/// Consumer half of the job queue, cloned into every worker.
#[derive(Clone)]
pub struct JobReceiver {
    register: mpsc::UnboundedSender<Slot>,
    shared: Arc<Shared>,
}

/// Creates a new zero-capacity job queue.
pub fn job_queue() -> (JobSender, JobReceiver) {
    let (register, idle) = mpsc::unbounded_channel();
    let shared = Arc::new(Shared {
        idle: Mutex::new(idle),
        closed: CancellationToken::new(),
    });

    (
        JobSender {
            shared: Arc::clone(&shared),
        },
        JobReceiver { register, shared },
    )
}

impl JobSender {
    /// Hands `job` to an idle worker, waiting until one is available.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ServiceShutdown`] if the queue is closed before a
    /// worker accepts the job, or if every worker has gone away. The job is
    /// dropped in that case, so its return channel resolves to
    /// [`Error::JobAbandoned`].
    pub async fn send(&self, mut job: Job) -> Result<()> {
        let closed = &self.shared.closed;

        let mut idle = tokio::select! {
            biased;
            () = closed.cancelled() => return Err(Error::ServiceShutdown),
            guard = self.shared.idle.lock() => guard,
        };

        loop {
            let slot = tokio::select! {
                biased;
                () = closed.cancelled() => return Err(Error::ServiceShutdown),
                slot = idle.recv() => slot,
            };

            let Some(slot) = slot else {
                return Err(Error::ServiceShutdown);
            };

            match slot.send(job) {
                Ok(()) => return Ok(()),
                // That worker stopped waiting; try the next one.
                Err(returned) => job = returned,
            }
        }
    }

    /// Closes the queue. Pending and future `send` calls fail with
    /// [`Error::ServiceShutdown`]; idle workers observe `None`.
    pub fn close(&self) {
        self.shared.closed.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.is_cancelled()
    }

    /// Discards every slot still registered by a worker and refuses new
    /// registrations. Returns the number of slots discarded.
    ///
    /// Intended for use after [`JobSender::close`]. Nothing is buffered in a
    /// rendezvous queue, so no job can be sitting in it: producers blocked on
    /// a hand-off have already been released with an error by `close`.
    pub async fn drain(&self) -> usize {
        let mut idle = self.shared.idle.lock().await;
        idle.close();

        let mut discarded = 0;
        while idle.try_recv().is_ok() {
            discarded += 1;
        }
        discarded
    }
}

impl JobReceiver {
    /// Waits for a producer to hand over a job.
    ///
    /// Returns `None` once the queue is closed. Cancelling this future is
    /// safe: a job is never handed to a receiver that stopped waiting.
    pub async fn recv(&self) -> Option<Job> {
        self.wait(None).await
    }

    /// Like [`JobReceiver::recv`], but also gives up once `stop` is
    /// cancelled.
    ///
    /// A job whose hand-off completed before either signal is still returned,
    /// so a producer whose `send` succeeded never loses its job.
    pub async fn recv_until(&self, stop: &CancellationToken) -> Option<Job> {
        self.wait(Some(stop)).await
    }

    async fn wait(&self, stop: Option<&CancellationToken>) -> Option<Job> {
        if self.shared.closed.is_cancelled() || stop.is_some_and(CancellationToken::is_cancelled) {
            return None;
        }

        let (slot, mut incoming) = oneshot::channel();
        if self.register.send(slot).is_err() {
            return None;
        }

        let stopped = async {
            match stop {
                Some(token) => token.cancelled().await,
                None => future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            job = &mut incoming => job.ok(),
            () = self.shared.closed.cancelled() => reclaim(&mut incoming),
            () = stopped => reclaim(&mut incoming),
        }
    }
}

/// Stops accepting on `incoming` and returns a job that a producer handed
/// over just before the receiver gave up.
fn reclaim(incoming: &mut oneshot::Receiver<Job>) -> Option<Job> {
    incoming.close();
    incoming.try_recv().ok()
}
