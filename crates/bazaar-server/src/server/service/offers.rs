use crate::server::{
    engine::{Job, JobValue, ReturnChannel, merge},
    module::Module,
    providers::ProviderRegistry,
    telemetry::increment_provider_errors,
};
use bazaar_core::{Country, IdType, Marketplace, OfferDetail, OfferList, Result, SearchQuery};
use std::sync::Arc;

/// Builds per-provider jobs for a request, runs them on the shared [`Module`]
/// and folds their results into one response.
///
/// Aggregation is error tolerant: a provider that fails is logged and left
/// out. Only lifecycle faults (submitting after shutdown) fail a request,
/// along with the strict primary fetch of a detail lookup.
#[derive(Clone)]
pub struct OfferService {
    module: Arc<Module>,
    registry: Arc<ProviderRegistry>,
    list_capacity: usize,
}

impl OfferService {
    pub fn new(module: Arc<Module>, registry: Arc<ProviderRegistry>, list_capacity: usize) -> Self {
        Self {
            module,
            registry,
            list_capacity,
        }
    }

    pub fn module(&self) -> &Arc<Module> {
        &self.module
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Searches every provider serving the query's country and merges their
    /// offers in completion order.
    ///
    /// Returns an empty list if no provider is configured or all of them fail.
    ///
    /// # Errors
    ///
    /// Returns [`bazaar_core::Error::ServiceShutdown`] if the module stopped
    /// accepting jobs.
    #[tracing::instrument(
        skip_all,
        fields(country = %query.country, trending = query.is_trending())
    )]
    pub async fn search_offers(&self, query: SearchQuery) -> Result<OfferList> {
        let outputs = self.submit_all(self.registry.search_jobs(&query)).await?;
        tracing::debug!("Submitted {} search jobs", outputs.len());

        let mut offers = OfferList::with_capacity(self.list_capacity);
        let mut merged = merge(outputs);
        while let Some(result) = merged.recv().await {
            match result.and_then(JobValue::into_offers) {
                Ok(list) => offers.merge(list),
                Err(e) => {
                    increment_provider_errors();
                    tracing::warn!("Dropping search result: {e}");
                }
            }
        }

        Ok(offers)
    }

    /// Fetches the detail of `id` from `source`, then looks up the same UPC at
    /// every other provider serving `country` and appends each competitor
    /// that answers.
    ///
    /// # Errors
    ///
    /// Fails if the primary fetch fails or if the competitor jobs cannot be
    /// submitted. Competitor failures are dropped.
    #[tracing::instrument(skip(self))]
    pub async fn get_offer_detail(
        &self,
        id: &str,
        id_type: IdType,
        source: Marketplace,
        country: Country,
    ) -> Result<OfferDetail> {
        let mut detail = self.registry.detail(source, id, id_type, country).await?;

        if detail.offer.upc.is_empty() {
            tracing::debug!("No UPC on {source} item {id}, skipping competitors");
            return Ok(detail);
        }

        let jobs = self
            .registry
            .competitor_jobs(&detail.offer.upc, country, source);
        let outputs = self.submit_all(jobs).await?;
        tracing::debug!("Submitted {} competitor jobs", outputs.len());

        let mut merged = merge(outputs);
        while let Some(result) = merged.recv().await {
            match result.and_then(JobValue::into_detail) {
                Ok(competitor) => detail.push_competitor(&competitor),
                Err(e) => {
                    increment_provider_errors();
                    tracing::debug!("Dropping competitor result: {e}");
                }
            }
        }

        Ok(detail)
    }

    async fn submit_all(&self, jobs: Vec<(Job, ReturnChannel)>) -> Result<Vec<ReturnChannel>> {
        let mut outputs = Vec::with_capacity(jobs.len());
        for (job, output) in jobs {
            self.module.submit(job).await?;
            outputs.push(output);
        }
        Ok(outputs)
    }
}
