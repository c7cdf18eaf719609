use super::Provider;
use bazaar_core::{
    Country, Error, IdType, Marketplace, OfferDetail, OfferList, Result, SearchQuery,
};
use futures::future::{BoxFuture, FutureExt};
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;

/// Generic JSON adapter for a marketplace translation endpoint.
///
/// The endpoint is expected to already speak the canonical shapes:
///
/// - `GET {base}/search?country=&page=&rowsPerPage=&sortOrder=&q=&...`
///   returns an [`OfferList`].
/// - `GET {base}/items/{id}?idType=&country=` returns an [`OfferDetail`], or
///   `404` if the item is unknown.
#[derive(Clone, Debug)]
pub struct HttpProvider {
    marketplace: Marketplace,
    base_url: Url,
    client: Client,
}

impl HttpProvider {
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `base_url` is not an absolute
    /// hierarchical URL.
    pub fn new(marketplace: Marketplace, base_url: &str, client: Client) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| Error::Config {
            reason: format!("invalid endpoint for {marketplace}: {e}"),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(Error::Config {
                reason: format!("endpoint for {marketplace} is not a base URL: {base_url}"),
            });
        }

        Ok(Self {
            marketplace,
            base_url,
            client,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

impl Provider for HttpProvider {
    fn marketplace(&self) -> Marketplace {
        self.marketplace
    }

    fn search(&self, query: &SearchQuery) -> BoxFuture<'static, Result<OfferList>> {
        let mut params = vec![
            ("country", query.country.as_str().to_string()),
            ("page", query.page.to_string()),
            ("rowsPerPage", query.rows_per_page.to_string()),
            ("sortOrder", query.sort_order.as_str().to_string()),
        ];
        if let Some(keywords) = &query.keywords {
            params.push(("q", keywords.clone()));
        }
        let columns = query
            .columns
            .iter()
            .map(|(k, v)| (k.as_str(), v.clone()));
        params.extend(columns);

        let request = self.client.get(self.endpoint(&["search"])).query(&params);
        let what = format!("{} search", self.marketplace);
        fetch(self.marketplace, request, what).boxed()
    }

    fn detail(
        &self,
        id: &str,
        id_type: IdType,
        country: Country,
    ) -> BoxFuture<'static, Result<OfferDetail>> {
        let request = self
            .client
            .get(self.endpoint(&["items", id]))
            .query(&[("idType", id_type.as_str()), ("country", country.as_str())]);
        let what = format!("{} item {id_type} {id}", self.marketplace);
        fetch(self.marketplace, request, what).boxed()
    }
}

async fn fetch<T: DeserializeOwned>(
    marketplace: Marketplace,
    request: RequestBuilder,
    what: String,
) -> Result<T> {
    let response = request
        .send()
        .await
        .map_err(|e| Error::provider(marketplace, e))?;

    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Err(Error::NotFound { what });
    }
    if !status.is_success() {
        return Err(Error::provider(marketplace, format!("HTTP {status}")));
    }

    response
        .json::<T>()
        .await
        .map_err(|e| Error::provider(marketplace, format!("invalid body: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_extend_the_base_path() {
        let provider = HttpProvider::new(
            Marketplace::Walmart,
            "http://translator.local/walmart/",
            Client::new(),
        )
        .unwrap();

        assert_eq!(
            provider.endpoint(&["items", "a b/c"]).as_str(),
            "http://translator.local/walmart/items/a%20b%2Fc"
        );
        assert_eq!(
            provider.endpoint(&["search"]).as_str(),
            "http://translator.local/walmart/search"
        );
    }

    #[test]
    fn rejects_unusable_endpoints() {
        for raw in ["not a url", "mailto:ops@example.com"] {
            let err = HttpProvider::new(Marketplace::Ebay, raw, Client::new()).unwrap_err();
            assert!(matches!(err, Error::Config { .. }), "{raw}: {err}");
        }
    }
}
