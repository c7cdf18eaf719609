//! Error types for the offer aggregation service.
//!
//! This module defines the central `Error` enum, which captures every
//! recoverable and reportable failure within the dispatch engine, the provider
//! adapters and the HTTP layer. The HTTP layer converts it into a status code
//! and a JSON body.
//!
//! ## Error Cases
//! - `Provider`: A marketplace call failed in transport or while decoding.
//! - `JobTimeout`: A job exceeded the worker-side deadline.
//! - `JobPanicked`: A job payload panicked while being executed.
//! - `JobAbandoned`: A job was discarded before it produced a result.
//! - `UnexpectedJobValue`: A job produced a value of the wrong kind.
//! - `ServiceShutdown`: Work was submitted after the job queue closed.
//! - `NotFound`: The authoritative source has no such offer.
//! - `InvalidRequest`: The client request was malformed.
//! - `UnknownMarketplace`: A provider token outside the supported set.
//! - `Config`: Invalid runtime configuration.

use core::{fmt, time::Duration};

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the offer aggregation service.
#[derive(Clone, thiserror::Error, Debug, PartialEq)]
pub enum Error {
    /// A provider call failed (transport, HTTP status or decoding).
    #[error("Provider {provider} failed: {reason}")]
    Provider { provider: String, reason: String },

    /// The job did not finish before the worker-side deadline.
    #[error("Job {label} timed out after {timeout:?}")]
    JobTimeout { label: String, timeout: Duration },

    /// The job payload panicked. The worker survived and reported it.
    #[error("Job {label} panicked: {message}")]
    JobPanicked { label: String, message: String },

    /// The job's return channel was dropped without a result.
    #[error("Job {label} was dropped before producing a result")]
    JobAbandoned { label: String },

    /// A job produced a value of a different kind than the caller expected.
    #[error("Unexpected job value, expected {expected}")]
    UnexpectedJobValue { expected: &'static str },

    /// The job queue is closed.
    #[error("Service is shutting down")]
    ServiceShutdown,

    /// The requested offer does not exist at its source.
    #[error("Not found: {what}")]
    NotFound { what: String },

    /// The client request was invalid.
    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// A provider token outside the supported marketplace set.
    #[error("Unknown marketplace: {0}")]
    UnknownMarketplace(String),

    /// Invalid runtime configuration.
    #[error("Configuration error: {reason}")]
    Config { reason: String },
}

impl Error {
    /// Shorthand for [`Error::Provider`].
    pub fn provider(provider: impl fmt::Display, reason: impl fmt::Display) -> Self {
        Self::Provider {
            provider: provider.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Shorthand for [`Error::InvalidRequest`].
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            reason: reason.into(),
        }
    }

    /// Returns `true` for faults of the pool or queue lifecycle rather than of
    /// an individual provider.
    pub const fn is_lifecycle(&self) -> bool {
        matches!(self, Self::ServiceShutdown | Self::JobAbandoned { .. })
    }

    /// Returns `true` if the error was caused by a job deadline.
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::JobTimeout { .. })
    }
}
