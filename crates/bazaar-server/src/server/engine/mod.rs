//! Building blocks of the dispatch engine.
//!
//! - [`job`] - A unit of deferred provider work and its return channel.
//! - [`queue`] - The zero-capacity hand-off between producers and workers.
//! - [`merge`] - Fan-in of many return channels into one stream.

pub mod job;
pub mod merge;
pub mod queue;

pub use job::{Job, JobResult, JobValue, Payload, ReturnChannel};
pub use merge::merge;
pub use queue::{JobReceiver, JobSender, job_queue};
