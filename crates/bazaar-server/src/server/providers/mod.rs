//! Marketplace adapters.
//!
//! A [`Provider`] turns a search or detail request into a future resolving to
//! the canonical offer shapes. The engine never calls providers directly:
//! [`ProviderRegistry`] wraps each call in a [`crate::server::engine::Job`].

pub mod http;
pub mod registry;

pub use http::HttpProvider;
pub use registry::ProviderRegistry;

use bazaar_core::{Country, IdType, Marketplace, OfferDetail, OfferList, Result, SearchQuery};
use futures::future::BoxFuture;

/// A single marketplace able to fulfil search and detail requests.
///
/// Returned futures are `'static` so they can run on any worker; clone
/// whatever state the call needs out of `self` before returning.
pub trait Provider: Send + Sync {
    fn marketplace(&self) -> Marketplace;

    /// Searches the marketplace. A query without keywords asks for trending
    /// offers.
    fn search(&self, query: &SearchQuery) -> BoxFuture<'static, Result<OfferList>>;

    /// Looks up one item by native id or by UPC.
    fn detail(
        &self,
        id: &str,
        id_type: IdType,
        country: Country,
    ) -> BoxFuture<'static, Result<OfferDetail>>;
}
