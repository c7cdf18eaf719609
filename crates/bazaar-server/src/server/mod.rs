//! Offer aggregation service.
//!
//! ## Structure
//!
//! - [`engine`] - Jobs, the rendezvous job queue and the fan-in combinator.
//! - [`pool`] - The worker pool draining the job queue.
//! - [`module`] - Process-wide owner of the pool and its queue.
//! - [`providers`] - Marketplace adapter interface, registry and HTTP adapter.
//! - [`service`] - Search/detail orchestration and the HTTP routes.
//! - [`config`] - CLI/environment configuration.
//! - [`telemetry`] - Logging, tracing and metrics setup.

pub mod config;
pub mod engine;
pub mod module;
pub mod pool;
pub mod providers;
pub mod service;
pub mod telemetry;
