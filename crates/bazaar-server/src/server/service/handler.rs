use super::offers::OfferService;
use crate::server::telemetry::increment_requests;
use axum::{
    Json, Router,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use bazaar_core::{
    Country, Error, IdType, ListSearchRequest, Marketplace, OfferDetail, OfferList, SearchQuery,
};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;

/// Builds the HTTP routes over `service`.
///
/// | Route                 | Action                          |
/// |-----------------------|---------------------------------|
/// | `GET /`               | search from query parameters    |
/// | `GET /offers`         | search from query parameters    |
/// | `POST /offers`        | search from a JSON body         |
/// | `GET /offers/{id}`    | detail plus competitor prices   |
/// | `GET /healthz`        | liveness                        |
pub fn router(service: OfferService) -> Router {
    Router::new()
        .route("/", get(search_from_query))
        .route("/offers", get(search_from_query).post(search_from_body))
        .route("/offers/{id}", get(offer_detail))
        .route("/healthz", get(healthz))
        .with_state(service)
}

/// [`Error`] rendered as an HTTP response with a `{"error": "..."}` body.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl ApiError {
    pub const fn status(&self) -> StatusCode {
        match &self.0 {
            Error::InvalidRequest { .. } | Error::UnknownMarketplace(_) => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Provider { .. } => StatusCode::BAD_GATEWAY,
            Error::ServiceShutdown | Error::JobAbandoned { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Error::JobTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Error::JobPanicked { .. } | Error::UnexpectedJobValue { .. } | Error::Config { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self.0);
        } else {
            tracing::debug!("Request rejected: {}", self.0);
        }

        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct DetailParams {
    id_type: Option<String>,
    source: Option<String>,
    country: Option<String>,
}

async fn search_from_query(
    State(service): State<OfferService>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<OfferList>, ApiError> {
    increment_requests("search");
    let query = SearchQuery::from_params(&params)?;
    Ok(Json(service.search_offers(query).await?))
}

async fn search_from_body(
    State(service): State<OfferService>,
    body: Result<Json<ListSearchRequest>, JsonRejection>,
) -> Result<Json<OfferList>, ApiError> {
    increment_requests("search");
    let Json(request) = body.map_err(|e| Error::invalid(e.body_text()))?;
    let query = SearchQuery::try_from(request)?;
    Ok(Json(service.search_offers(query).await?))
}

async fn offer_detail(
    State(service): State<OfferService>,
    Path(id): Path<String>,
    Query(params): Query<DetailParams>,
) -> Result<Json<OfferDetail>, ApiError> {
    increment_requests("detail");

    let id_type: IdType = params.id_type.as_deref().unwrap_or_default().parse()?;
    let source: Marketplace = params
        .source
        .as_deref()
        .ok_or_else(|| Error::invalid("source is required"))?
        .parse()?;
    let country = Country::parse_or_default(params.country.as_deref())?;

    let detail = service
        .get_offer_detail(&id, id_type, source, country)
        .await?;
    Ok(Json(detail))
}

async fn healthz(State(service): State<OfferService>) -> impl IntoResponse {
    if service.module().is_stopped() {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "stopping" })),
        )
    } else {
        (StatusCode::OK, Json(json!({ "status": "ok" })))
    }
}
