use crate::server::{
    engine::{Job, JobReceiver, JobResult, Payload},
    telemetry::{decrement_jobs_inflight, increment_jobs_inflight, record_job_duration},
};
use bazaar_core::Error;
use core::time::Duration;
use futures::FutureExt;
use portable_atomic::{AtomicUsize, Ordering};
use std::{any::Any, panic::AssertUnwindSafe, sync::Arc, time::Instant};
use tokio_util::sync::CancellationToken;

/// Worker task pulling [`Job`]s from the shared queue.
///
/// The loop runs until either the queue closes or the pool's shutdown token
/// is cancelled. Cancellation is only observed between jobs: a job whose
/// hand-off completed always runs to completion (or to its deadline) and its
/// result is delivered before the worker exits.
///
/// # Arguments
///
/// - `worker_id`: Identifier used in logs.
/// - `queue`: Receiving half of the shared job queue.
/// - `job_timeout`: Deadline applied to every job this worker executes.
/// - `shutdown_token`: Pool-wide stop signal.
/// - `inflight`: Pool-wide count of jobs currently executing.
pub async fn worker_loop(
    worker_id: usize,
    queue: JobReceiver,
    job_timeout: Duration,
    shutdown_token: CancellationToken,
    inflight: Arc<AtomicUsize>,
) {
    tracing::trace!("Worker {worker_id} started");

    while let Some(job) = queue.recv_until(&shutdown_token).await {
        execute(worker_id, job, job_timeout, &inflight).await;
    }

    if shutdown_token.is_cancelled() {
        tracing::debug!("Worker {worker_id} received shutdown signal");
    } else {
        tracing::debug!("Worker {worker_id} queue closed");
    }
    tracing::trace!("Worker {worker_id} stopped");
}

/// Runs one job and delivers its result on the job's return channel.
///
/// The result is always a [`JobResult`]: a payload that panics or overruns
/// `job_timeout` is reported as [`Error::JobPanicked`] or
/// [`Error::JobTimeout`] instead of taking the worker down.
pub async fn execute(
    worker_id: usize,
    job: Job,
    job_timeout: Duration,
    inflight: &Arc<AtomicUsize>,
) {
    if job.is_abandoned() {
        tracing::debug!("Worker {worker_id} skipping {}: submitter is gone", job.label());
        return;
    }

    let (label, payload, reply) = job.into_parts();

    let start = Instant::now();
    let result = {
        let _inflight = InflightGuard::enter(inflight);
        run_guarded(&label, payload, job_timeout).await
    };
    record_job_duration(start.elapsed().as_secs_f64() * 1000.0);

    match &result {
        Ok(_) => tracing::trace!(
            "Worker {worker_id} finished {label} in {:?}",
            start.elapsed()
        ),
        Err(e) => tracing::warn!("Worker {worker_id} job {label} failed: {e}"),
    }

    if reply.send(result).is_err() {
        tracing::debug!("Worker {worker_id} could not deliver {label}: submitter is gone");
    }
}

/// Holds one unit of the in-flight count. Released on drop, so a worker
/// aborted mid-job does not leak it.
struct InflightGuard(Arc<AtomicUsize>);

impl InflightGuard {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        increment_jobs_inflight();
        Self(Arc::clone(counter))
    }
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
        decrement_jobs_inflight();
    }
}

async fn run_guarded(label: &str, payload: Payload, job_timeout: Duration) -> JobResult {
    // Building the future may itself panic.
    let fut = match std::panic::catch_unwind(AssertUnwindSafe(payload)) {
        Ok(fut) => fut,
        Err(panic) => return Err(panicked(label, &*panic)),
    };

    match tokio::time::timeout(job_timeout, AssertUnwindSafe(fut).catch_unwind()).await {
        Ok(Ok(result)) => result,
        Ok(Err(panic)) => Err(panicked(label, &*panic)),
        Err(_) => Err(Error::JobTimeout {
            label: label.to_string(),
            timeout: job_timeout,
        }),
    }
}

fn panicked(label: &str, panic: &(dyn Any + Send)) -> Error {
    let message = panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string());

    Error::JobPanicked {
        label: label.to_string(),
        message,
    }
}
