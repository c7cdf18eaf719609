//! # Canonical Offer Model
//!
//! Every provider adapter translates its vendor payload into these shapes,
//! and the HTTP layer serializes them unchanged. Field names follow the
//! camelCase wire format and field order is part of that format: an offer
//! always begins with `id`, `upc`, `name`, `partyName`.
//!
//! ## Types
//!
//! - [`Offer`] - A single product offer from one marketplace.
//! - [`OfferList`] - The aggregate returned by a search.
//! - [`OfferDetail`] - One authoritative offer plus competitor prices.
//! - [`OfferDetailItem`] - A competitor's price/rating summary.
//! - [`Marketplace`], [`Country`], [`IdType`], [`SortOrder`] - Closed token
//!   sets used to route requests.
//! - [`SearchQuery`] - Validated search parameters.

use crate::{Error, Result};
use core::{fmt, str::FromStr};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Page requested when the client does not specify one.
pub const DEFAULT_PAGE: u32 = 1;

/// Rows per page requested when the client does not specify them.
pub const DEFAULT_ROWS_PER_PAGE: u32 = 10;

/// Upper bound on rows per page accepted from clients.
pub const MAX_ROWS_PER_PAGE: u32 = 100;

/// A single product offer as published by one marketplace.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Offer {
    pub id: String,
    pub upc: String,
    pub name: String,
    pub party_name: String,
    pub semantic_name: String,
    pub main_image_file_url: String,
    pub party_image_file_url: String,
    pub price: f64,
    pub product_category: String,
    pub rating: f64,
    pub num_reviews: u32,
}

/// Aggregated search result.
///
/// Each request owns a fresh instance; successful provider results are folded
/// in with [`OfferList::merge`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OfferList {
    pub list: Vec<Offer>,
    pub page: u32,
    pub page_count: u32,
    pub total_count: u64,
}

impl Default for OfferList {
    fn default() -> Self {
        Self::with_capacity(0)
    }
}

impl OfferList {
    /// Creates an empty aggregate (page 1 of 1, no results) with room for
    /// `capacity` offers.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            list: Vec::with_capacity(capacity),
            page: DEFAULT_PAGE,
            page_count: 1,
            total_count: 0,
        }
    }

    /// Folds a provider's result into this aggregate.
    ///
    /// Results reporting no matches are ignored entirely so that they do not
    /// inflate `pageCount`. Counts come from providers and saturate instead of
    /// overflowing.
    pub fn merge(&mut self, other: OfferList) {
        if other.total_count == 0 {
            return;
        }
        self.list.extend(other.list);
        self.total_count = self.total_count.saturating_add(other.total_count);
        self.page_count = self.page_count.saturating_add(other.page_count);
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }
}

/// A free-form attribute attached to an offer detail.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NameValue {
    pub name: String,
    pub value: String,
}

/// A competitor's summary of the same product, keyed by UPC.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OfferDetailItem {
    pub party_name: String,
    pub semantic_name: String,
    pub party_image_file_url: String,
    pub price: f64,
    pub rating: f64,
    pub num_reviews: u32,
}

impl From<&Offer> for OfferDetailItem {
    fn from(offer: &Offer) -> Self {
        Self {
            party_name: offer.party_name.clone(),
            semantic_name: offer.semantic_name.clone(),
            party_image_file_url: offer.party_image_file_url.clone(),
            price: offer.price,
            rating: offer.rating,
            num_reviews: offer.num_reviews,
        }
    }
}

/// The authoritative detail of one offer plus competitor summaries.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OfferDetail {
    pub offer: Offer,
    pub description: String,
    pub attributes: Vec<NameValue>,
    pub product_detail_items: Vec<OfferDetailItem>,
}

impl OfferDetail {
    /// Appends the summary of a competitor's detail for the same product.
    pub fn push_competitor(&mut self, competitor: &OfferDetail) {
        self.product_detail_items
            .push(OfferDetailItem::from(&competitor.offer));
    }
}

/// The closed set of supported marketplaces, identified by their token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Marketplace {
    #[serde(rename = "walmart.com")]
    Walmart,
    #[serde(rename = "bestbuy.com")]
    BestBuy,
    #[serde(rename = "ebay.com")]
    Ebay,
    #[serde(rename = "amazon.com")]
    Amazon,
}

impl Marketplace {
    pub const ALL: [Marketplace; 4] = [
        Marketplace::Walmart,
        Marketplace::BestBuy,
        Marketplace::Ebay,
        Marketplace::Amazon,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Marketplace::Walmart => "walmart.com",
            Marketplace::BestBuy => "bestbuy.com",
            Marketplace::Ebay => "ebay.com",
            Marketplace::Amazon => "amazon.com",
        }
    }

    /// Parses a comma-separated token list such as
    /// `"walmart.com, bestbuy.com"`. Empty entries are skipped and duplicates
    /// keep their first position.
    pub fn parse_list(raw: &str) -> Result<Vec<Self>> {
        let mut out: Vec<Self> = Vec::new();
        for token in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let marketplace = token.parse()?;
            if !out.contains(&marketplace) {
                out.push(marketplace);
            }
        }
        Ok(out)
    }
}

impl fmt::Display for Marketplace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Marketplace {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let token = s.trim();
        Self::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(token))
            .ok_or_else(|| Error::UnknownMarketplace(token.to_string()))
    }
}

/// Country a request is scoped to. Selects the provider list.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Country {
    #[default]
    Us,
    Ca,
}

impl Country {
    pub const fn as_str(self) -> &'static str {
        match self {
            Country::Us => "us",
            Country::Ca => "ca",
        }
    }

    /// Parses an optional raw value, falling back to [`Country::Us`] when it
    /// is missing or blank.
    pub fn parse_or_default(raw: Option<&str>) -> Result<Self> {
        match raw.map(str::trim) {
            None | Some("") => Ok(Self::default()),
            Some(value) => value.parse(),
        }
    }
}

impl fmt::Display for Country {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Country {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "us" | "usa" => Ok(Country::Us),
            "ca" | "canada" => Ok(Country::Ca),
            other => Err(Error::invalid(format!("unsupported country `{other}`"))),
        }
    }
}

/// Kind of identifier used for a detail lookup.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdType {
    /// The marketplace's native item id.
    #[default]
    Id,
    /// Universal Product Code, shared across marketplaces.
    Upc,
}

impl IdType {
    pub const fn as_str(self) -> &'static str {
        match self {
            IdType::Id => "id",
            IdType::Upc => "upc",
        }
    }
}

impl fmt::Display for IdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IdType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "id" => Ok(IdType::Id),
            "upc" => Ok(IdType::Upc),
            other => Err(Error::invalid(format!("unsupported idType `{other}`"))),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub const fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

impl FromStr for SortOrder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(Error::invalid(format!("unsupported sortOrder `{other}`"))),
        }
    }
}

/// A single column filter of a `POST /offers` body.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchColumn {
    pub name: String,
    pub value: String,
}

/// The `POST /offers` request body.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListSearchRequest {
    pub search_columns: Vec<SearchColumn>,
    pub sort_order: SortOrder,
    pub page: u32,
    pub rows_per_page: u32,
}

impl Default for ListSearchRequest {
    fn default() -> Self {
        Self {
            search_columns: Vec::new(),
            sort_order: SortOrder::default(),
            page: DEFAULT_PAGE,
            rows_per_page: DEFAULT_ROWS_PER_PAGE,
        }
    }
}

/// Validated search parameters handed to every provider.
///
/// A query without keywords asks providers for their trending offers.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchQuery {
    pub country: Country,
    pub keywords: Option<String>,
    pub page: u32,
    pub rows_per_page: u32,
    pub sort_order: SortOrder,
    /// Remaining column filters, passed through to providers untouched.
    pub columns: BTreeMap<String, String>,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            country: Country::default(),
            keywords: None,
            page: DEFAULT_PAGE,
            rows_per_page: DEFAULT_ROWS_PER_PAGE,
            sort_order: SortOrder::default(),
            columns: BTreeMap::new(),
        }
    }
}

impl SearchQuery {
    /// Builds a query from a flat parameter map such as a URL query string.
    ///
    /// Recognized keys: `country`, `q` (or `keywords`), `page`, `rowsPerPage`,
    /// `sortOrder`. Anything else is kept in [`SearchQuery::columns`].
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self> {
        let mut query = Self {
            country: Country::parse_or_default(params.get("country").map(String::as_str))?,
            ..Self::default()
        };

        for (key, value) in params {
            match key.as_str() {
                "country" => {}
                "q" | "keywords" => query.keywords = non_blank(value),
                "page" => query.page = parse_number("page", value)?,
                "rowsPerPage" => query.rows_per_page = parse_number("rowsPerPage", value)?,
                "sortOrder" => query.sort_order = value.parse()?,
                _ => {
                    query.columns.insert(key.clone(), value.clone());
                }
            }
        }

        query.validate()
    }

    /// Returns `true` when no keywords were given.
    pub fn is_trending(&self) -> bool {
        self.keywords.is_none()
    }

    fn validate(self) -> Result<Self> {
        if self.page == 0 {
            return Err(Error::invalid("page must be greater than 0"));
        }
        if self.rows_per_page == 0 || self.rows_per_page > MAX_ROWS_PER_PAGE {
            return Err(Error::invalid(format!(
                "rowsPerPage must be between 1 and {MAX_ROWS_PER_PAGE}"
            )));
        }
        Ok(self)
    }
}

impl TryFrom<ListSearchRequest> for SearchQuery {
    type Error = Error;

    fn try_from(req: ListSearchRequest) -> Result<Self> {
        let mut query = Self {
            page: req.page,
            rows_per_page: req.rows_per_page,
            sort_order: req.sort_order,
            ..Self::default()
        };

        for column in req.search_columns {
            match column.name.as_str() {
                "name" | "keywords" => query.keywords = non_blank(&column.value),
                "country" => query.country = Country::parse_or_default(Some(&column.value))?,
                _ => {
                    query.columns.insert(column.name, column.value);
                }
            }
        }

        query.validate()
    }
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn parse_number(field: &str, value: &str) -> Result<u32> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::invalid(format!("{field} must be a positive integer")))
}
