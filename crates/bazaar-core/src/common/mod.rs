//! Shared model and error definitions.
//!
//! - [`error`] - The unified [`Error`] enum and [`Result`] alias.
//! - [`model`] - Canonical offer types and request parameters.

pub mod error;
pub mod model;

pub use error::*;
pub use model::*;
