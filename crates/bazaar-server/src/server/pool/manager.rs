//! Fixed-size pool of asynchronous workers draining the shared job queue.
//!
//! This module defines the [`WorkerPool`] struct, which owns the lifecycle of
//! the worker tasks: [`WorkerPool::run`] spawns them against a
//! [`JobReceiver`], and [`WorkerPool::stop`] signals them through a shared
//! [`CancellationToken`] and waits for each one to exit.
//!
//! Unlike a round-robin dispatcher, workers pull from one shared rendezvous
//! queue, so a job always goes to a worker that is idle at that moment.

use super::worker::worker_loop;
use crate::server::engine::JobReceiver;
use core::time::Duration;
use parking_lot::Mutex;
use portable_atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::{task::JoinHandle, time::timeout};
use tokio_util::sync::CancellationToken;

/// Workers spawned per available CPU when no explicit size is configured.
///
/// Jobs spend almost all of their time waiting on provider I/O, so the pool
/// is deliberately larger than the number of cores.
pub const WORKERS_PER_CPU: usize = 4;

/// Default per-job deadline.
pub const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(10);

/// Slack added on top of the job timeout when deriving a shutdown timeout.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Default time each worker is given to finish its in-flight job on stop.
/// Never shorter than [`DEFAULT_JOB_TIMEOUT`], so a job accepted right before
/// stop can still run to its own deadline.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = shutdown_timeout_for(DEFAULT_JOB_TIMEOUT);

/// Shutdown timeout that lets a job running under `job_timeout` finish.
pub const fn shutdown_timeout_for(job_timeout: Duration) -> Duration {
    job_timeout.saturating_add(SHUTDOWN_GRACE)
}

/// A fixed set of long-lived workers executing jobs from a shared queue.
pub struct WorkerPool {
    max_workers: usize,
    job_timeout: Duration,
    shutdown_timeout: Duration,
    shutdown_token: CancellationToken,
    workers: Mutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
    inflight: Arc<AtomicUsize>,
}

impl WorkerPool {
    /// Creates a pool of `max_workers` workers. Nothing runs until
    /// [`WorkerPool::run`] is called.
    pub fn new(max_workers: usize, job_timeout: Duration, shutdown_timeout: Duration) -> Self {
        Self {
            max_workers: max_workers.max(1),
            job_timeout,
            shutdown_timeout,
            shutdown_token: CancellationToken::new(),
            workers: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
            inflight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Pool size derived from the host's available parallelism.
    pub fn default_size() -> usize {
        num_cpus::get() * WORKERS_PER_CPU
    }

    pub const fn max_workers(&self) -> usize {
        self.max_workers
    }

    pub const fn job_timeout(&self) -> Duration {
        self.job_timeout
    }

    /// Number of jobs currently executing on a worker.
    pub fn inflight(&self) -> usize {
        self.inflight.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        self.started.load(Ordering::Acquire) && !self.shutdown_token.is_cancelled()
    }

    /// Spawns the workers, each looping over `queue` until stopped.
    ///
    /// Returns `false` without spawning anything if the pool was already
    /// started. Must be called within a Tokio runtime.
    pub fn run(&self, queue: JobReceiver) -> bool {
        if self
            .started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::warn!("Worker pool already running");
            return false;
        }

        let mut workers = self.workers.lock();
        workers.reserve(self.max_workers);
        for worker_id in 0..self.max_workers {
            workers.push(tokio::spawn(worker_loop(
                worker_id,
                queue.clone(),
                self.job_timeout,
                self.shutdown_token.clone(),
                Arc::clone(&self.inflight),
            )));
        }

        tracing::info!(
            "Worker pool running with {} workers (job timeout {:?})",
            self.max_workers,
            self.job_timeout
        );
        true
    }

    /// Stops every worker and waits for them to exit.
    ///
    /// - Cancels the shared [`CancellationToken`]; idle workers exit at once.
    /// - Busy workers finish their in-flight job and deliver its result first.
    /// - Waits up to the configured shutdown timeout per worker; a worker that
    ///   overruns it is aborted and awaited, which drops its job so the
    ///   submitter observes an abandoned result instead of hanging.
    ///
    /// Calling `stop` more than once is harmless.
    pub async fn stop(&self) {
        tracing::debug!("Cancelling workers via shutdown token");
        self.shutdown_token.cancel();

        let workers = std::mem::take(&mut *self.workers.lock());
        if workers.is_empty() {
            return;
        }

        tracing::debug!(
            "Waiting up to {:?} per worker for {} workers to finish",
            self.shutdown_timeout,
            workers.len()
        );

        let shutdown_timeout = self.shutdown_timeout;
        let waits = workers.into_iter().enumerate().map(|(i, mut handle)| async move {
            match timeout(shutdown_timeout, &mut handle).await {
                Ok(Ok(())) => tracing::trace!("Worker {i} exited"),
                Ok(Err(e)) => tracing::error!("Worker {i} failed: {e}"),
                Err(_) => {
                    tracing::warn!("Worker {i} did not finish in time, aborting");
                    handle.abort();
                    // Resolves once the task, and the job it held, is dropped.
                    let _ = handle.await;
                }
            }
        });

        futures::future::join_all(waits).await;

        tracing::info!(
            "Worker pool shutdown complete ({} jobs in flight)",
            self.inflight()
        );
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown_token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::engine::{Job, JobValue, ReturnChannel, job_queue, merge};
    use bazaar_core::OfferList;
    use tokio::time::{Instant, sleep};

    fn counted_job(label: String, counter: Arc<AtomicUsize>) -> (Job, ReturnChannel) {
        Job::new(label, move || async move {
            sleep(Duration::from_millis(5)).await;
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(OfferList {
                total_count: 1,
                ..OfferList::default()
            })
        })
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn more_jobs_than_workers_are_all_executed_once() {
        let (tx, rx) = job_queue();
        let pool = WorkerPool::new(3, Duration::from_secs(1), Duration::from_secs(1));
        assert!(pool.run(rx));

        let executed = Arc::new(AtomicUsize::new(0));
        let mut outputs = Vec::new();
        for i in 0..40 {
            let (job, output) = counted_job(format!("job-{i}"), Arc::clone(&executed));
            outputs.push(output);
            tx.send(job).await.unwrap();
        }

        let mut merged = merge(outputs);
        let mut total = 0;
        while let Some(result) = merged.recv().await {
            total += result.and_then(JobValue::into_offers).unwrap().total_count;
        }

        assert_eq!(total, 40);
        assert_eq!(executed.load(Ordering::SeqCst), 40);
        pool.stop().await;
    }

    #[tokio::test]
    async fn run_only_starts_once() {
        let (_tx, rx) = job_queue();
        let pool = WorkerPool::new(2, Duration::from_secs(1), Duration::from_secs(1));
        assert!(pool.run(rx.clone()));
        assert!(!pool.run(rx));
        assert!(pool.is_running());
        pool.stop().await;
        assert!(!pool.is_running());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn stop_waits_for_in_flight_jobs() {
        let (tx, rx) = job_queue();
        let pool = WorkerPool::new(2, Duration::from_secs(5), Duration::from_secs(5));
        pool.run(rx);

        let mut outputs = Vec::new();
        for i in 0..2 {
            let (job, output) = Job::new(format!("slow-{i}"), || async {
                sleep(Duration::from_millis(150)).await;
                Ok(OfferList::default())
            });
            outputs.push(output);
            tx.send(job).await.unwrap();
        }

        let start = Instant::now();
        pool.stop().await;
        assert!(start.elapsed() >= Duration::from_millis(100));

        // Both results were delivered before the workers exited.
        for output in outputs {
            assert!(output.await.is_ok());
        }
    }

    #[tokio::test]
    async fn stop_aborts_workers_past_the_shutdown_timeout() {
        let (tx, rx) = job_queue();
        let pool = WorkerPool::new(1, Duration::from_secs(60), Duration::from_millis(20));
        pool.run(rx);

        let (job, output) = Job::new("stuck", || async {
            sleep(Duration::from_secs(60)).await;
            Ok(OfferList::default())
        });
        tx.send(job).await.unwrap();

        sleep(Duration::from_millis(10)).await;
        assert_eq!(pool.inflight(), 1);

        pool.stop().await;
        assert!(output.await.unwrap_err().is_lifecycle());
        assert_eq!(pool.inflight(), 0);
    }

    #[tokio::test]
    async fn job_accepted_right_before_stop_is_delivered() {
        let (tx, rx) = job_queue();
        let pool = WorkerPool::new(1, Duration::from_secs(1), Duration::from_secs(1));
        pool.run(rx);
        // Let the worker register as idle.
        tokio::task::yield_now().await;

        let (job, output) = Job::new("accepted", || async {
            Ok(OfferList {
                total_count: 1,
                ..OfferList::default()
            })
        });
        tx.send(job).await.unwrap();
        pool.stop().await;

        let list = output.await.and_then(JobValue::into_offers).unwrap();
        assert_eq!(list.total_count, 1);
    }

    #[test]
    fn default_shutdown_timeout_covers_a_full_job() {
        assert!(DEFAULT_SHUTDOWN_TIMEOUT > DEFAULT_JOB_TIMEOUT);
        assert_eq!(
            shutdown_timeout_for(Duration::from_millis(250)),
            Duration::from_millis(1250)
        );
        assert_eq!(shutdown_timeout_for(Duration::MAX), Duration::MAX);
    }
}
