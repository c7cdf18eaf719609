use super::Provider;
use crate::server::engine::{Job, ReturnChannel};
use bazaar_core::{Country, Error, IdType, Marketplace, OfferDetail, Result, SearchQuery};
use std::{collections::HashMap, sync::Arc};

/// Registered adapters plus the per-country provider lists.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<Marketplace, Arc<dyn Provider>>,
    us: Vec<Marketplace>,
    ca: Vec<Marketplace>,
}

impl ProviderRegistry {
    /// Creates an empty registry serving `us` and `ca` in the given order.
    pub fn new(us: Vec<Marketplace>, ca: Vec<Marketplace>) -> Self {
        Self {
            providers: HashMap::new(),
            us,
            ca,
        }
    }

    pub fn register(&mut self, provider: Arc<dyn Provider>) {
        let marketplace = provider.marketplace();
        if self.providers.insert(marketplace, provider).is_some() {
            tracing::warn!("Replacing adapter for {marketplace}");
        }
    }

    pub fn with_provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.register(provider);
        self
    }

    pub fn get(&self, marketplace: Marketplace) -> Option<&Arc<dyn Provider>> {
        self.providers.get(&marketplace)
    }

    /// Configured marketplace list for `country`, whether or not each one has
    /// an adapter.
    pub fn configured(&self, country: Country) -> &[Marketplace] {
        match country {
            Country::Us => &self.us,
            Country::Ca => &self.ca,
        }
    }

    /// Adapters serving `country`, in configuration order. Configured
    /// marketplaces without an adapter are skipped.
    pub fn providers_for(&self, country: Country) -> Vec<Arc<dyn Provider>> {
        self.configured(country)
            .iter()
            .filter_map(|marketplace| {
                let provider = self.providers.get(marketplace);
                if provider.is_none() {
                    tracing::warn!("No adapter registered for {marketplace}, skipping");
                }
                provider.cloned()
            })
            .collect()
    }

    /// Builds one search job per provider serving the query's country.
    pub fn search_jobs(&self, query: &SearchQuery) -> Vec<(Job, ReturnChannel)> {
        self.providers_for(query.country)
            .into_iter()
            .map(|provider| search_job(provider, query))
            .collect()
    }

    /// Builds UPC lookup jobs against every provider serving `country` except
    /// `exclude`.
    pub fn competitor_jobs(
        &self,
        upc: &str,
        country: Country,
        exclude: Marketplace,
    ) -> Vec<(Job, ReturnChannel)> {
        self.providers_for(country)
            .into_iter()
            .filter(|provider| provider.marketplace() != exclude)
            .map(|provider| detail_job(provider, upc, IdType::Upc, country))
            .collect()
    }

    /// Fetches a detail directly from `source`, outside the worker pool.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] if no adapter is registered for
    /// `source`, otherwise whatever the adapter reports.
    pub async fn detail(
        &self,
        source: Marketplace,
        id: &str,
        id_type: IdType,
        country: Country,
    ) -> Result<OfferDetail> {
        let provider = self
            .get(source)
            .ok_or_else(|| Error::invalid(format!("no adapter registered for {source}")))?;
        provider.detail(id, id_type, country).await
    }
}

/// Wraps a search call in a job. The provider is only invoked once a worker
/// runs the payload.
fn search_job(provider: Arc<dyn Provider>, query: &SearchQuery) -> (Job, ReturnChannel) {
    let label = format!("{}:search", provider.marketplace());
    let query = query.clone();
    Job::new(label, move || provider.search(&query))
}

fn detail_job(
    provider: Arc<dyn Provider>,
    id: &str,
    id_type: IdType,
    country: Country,
) -> (Job, ReturnChannel) {
    let label = format!("{}:detail", provider.marketplace());
    let id = id.to_string();
    Job::new(label, move || provider.detail(&id, id_type, country))
}
