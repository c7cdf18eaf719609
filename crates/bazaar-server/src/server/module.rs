//! Process-wide owner of the worker pool and its job queue.
//!
//! A [`Module`] is created once, shared by every request through an
//! `Arc<Module>`, and stopped once during shutdown. [`Module::start`] builds a
//! standalone instance (used by tests and benches); [`Module::get_instance`]
//! is the construct-once accessor used by the server binary.

use crate::server::{
    engine::{Job, JobSender, job_queue},
    pool::{
        WorkerPool,
        manager::{DEFAULT_JOB_TIMEOUT, DEFAULT_SHUTDOWN_TIMEOUT},
    },
};
use bazaar_core::Result;
use core::time::Duration;
use std::sync::{Arc, OnceLock};
use tokio::sync::OnceCell;

static INSTANCE: OnceLock<Arc<Module>> = OnceLock::new();

/// Sizing and deadlines for the dispatch engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    pub max_workers: usize,
    pub job_timeout: Duration,
    pub shutdown_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_workers: WorkerPool::default_size(),
            job_timeout: DEFAULT_JOB_TIMEOUT,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

/// Holds the dispatcher and the job queue shared by all producers.
pub struct Module {
    dispatcher: WorkerPool,
    job_queue: JobSender,
    stopped: OnceCell<bool>,
}

impl Module {
    /// Creates the job queue, starts the dispatcher against it and returns the
    /// new module. Must be called within a Tokio runtime.
    pub fn start(config: &EngineConfig) -> Arc<Self> {
        tracing::info!("Starting module with {} workers", config.max_workers);

        let (job_queue, receiver) = job_queue();
        let dispatcher = WorkerPool::new(
            config.max_workers,
            config.job_timeout,
            config.shutdown_timeout,
        );
        dispatcher.run(receiver);

        Arc::new(Self {
            dispatcher,
            job_queue,
            stopped: OnceCell::new(),
        })
    }

    /// Returns the process-wide module, starting it on first use.
    ///
    /// Concurrent first callers all receive the same instance and the
    /// dispatcher is started exactly once. `config` is only consulted by the
    /// call that actually constructs the module.
    pub fn get_instance(config: &EngineConfig) -> Arc<Self> {
        Arc::clone(INSTANCE.get_or_init(|| Self::start(config)))
    }

    /// Pushes `job` onto the shared queue, waiting for an idle worker.
    ///
    /// # Errors
    ///
    /// Returns [`bazaar_core::Error::ServiceShutdown`] once the module has
    /// been stopped.
    pub async fn submit(&self, job: Job) -> Result<()> {
        self.job_queue.send(job).await
    }

    pub fn dispatcher(&self) -> &WorkerPool {
        &self.dispatcher
    }

    pub fn job_queue(&self) -> &JobSender {
        &self.job_queue
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.initialized()
    }

    /// Stops the dispatcher, then closes and drains the job queue.
    ///
    /// Waits for in-flight jobs to finish (see [`WorkerPool::stop`]). Returns
    /// whether the queue was observed closed afterwards. Only the first call
    /// does any work; later or concurrent calls wait for it and return the
    /// same outcome.
    ///
    /// New submissions must be stopped upstream first: jobs submitted while
    /// stopping are rejected with a shutdown error.
    pub async fn stop(&self) -> bool {
        *self
            .stopped
            .get_or_init(|| async {
                tracing::info!("Stopping module");
                self.dispatcher.stop().await;

                self.job_queue.close();
                let discarded = self.job_queue.drain().await;
                tracing::debug!("Discarded {discarded} idle worker slots");

                self.job_queue.is_closed()
            })
            .await
    }
}
