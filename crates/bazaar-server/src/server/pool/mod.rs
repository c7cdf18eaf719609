//! Worker pool draining the shared job queue.
//!
//! - [`manager`] - Pool lifecycle (`run`/`stop`).
//! - [`worker`] - The per-worker loop and guarded job execution.

pub mod manager;
pub mod worker;

pub use manager::WorkerPool;
