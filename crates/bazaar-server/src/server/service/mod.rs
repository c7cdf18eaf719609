//! Request orchestration and its HTTP surface.
//!
//! - [`offers`] - Fans search and detail requests out over the worker pool.
//! - [`handler`] - Axum routes and error-to-status mapping.

pub mod handler;
pub mod offers;

pub use handler::{ApiError, router};
pub use offers::OfferService;
