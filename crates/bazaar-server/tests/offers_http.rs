use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use bazaar_core::{
    Country, Error, IdType, Marketplace, Offer, OfferDetail, OfferList, Result, SearchQuery,
};
use bazaar_server::server::{
    module::{EngineConfig, Module},
    providers::{Provider, ProviderRegistry},
    service::{OfferService, router},
};
use core::time::Duration;
use futures::future::{self, BoxFuture, FutureExt};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

const UPC: &str = "0885909950805";

/// In-memory marketplace. Searches echo the keywords back as the offer name.
struct Catalog {
    marketplace: Marketplace,
    healthy: bool,
}

impl Catalog {
    fn offer(&self, id: &str) -> Offer {
        Offer {
            id: id.to_string(),
            upc: UPC.to_string(),
            party_name: self.marketplace.to_string(),
            semantic_name: format!("https://{}/ip/{id}", self.marketplace),
            price: 199.99,
            rating: 4.0,
            num_reviews: 12,
            ..Offer::default()
        }
    }
}

impl Provider for Catalog {
    fn marketplace(&self) -> Marketplace {
        self.marketplace
    }

    fn search(&self, query: &SearchQuery) -> BoxFuture<'static, Result<OfferList>> {
        if !self.healthy {
            return future::ready(Err(Error::provider(self.marketplace, "HTTP 503"))).boxed();
        }

        let mut offer = self.offer("1");
        offer.name = query
            .keywords
            .clone()
            .unwrap_or_else(|| "trending".to_string());
        future::ready(Ok(OfferList {
            list: vec![offer],
            page: query.page,
            page_count: 1,
            total_count: 1,
        }))
        .boxed()
    }

    fn detail(
        &self,
        id: &str,
        id_type: IdType,
        _country: Country,
    ) -> BoxFuture<'static, Result<OfferDetail>> {
        let result = if !self.healthy {
            Err(Error::provider(self.marketplace, "HTTP 503"))
        } else if id == "missing" {
            Err(Error::NotFound {
                what: format!("{} item {id}", self.marketplace),
            })
        } else {
            let offer = match id_type {
                IdType::Id => self.offer(id),
                IdType::Upc => self.offer(&format!("{}-{id}", self.marketplace)),
            };
            Ok(OfferDetail {
                offer,
                description: "A television".to_string(),
                ..OfferDetail::default()
            })
        };
        future::ready(result).boxed()
    }
}

fn app() -> (Router, Arc<Module>) {
    let mut registry = ProviderRegistry::new(
        Marketplace::ALL.to_vec(),
        vec![Marketplace::Walmart, Marketplace::BestBuy],
    );
    for marketplace in Marketplace::ALL {
        registry.register(Arc::new(Catalog {
            marketplace,
            healthy: marketplace != Marketplace::Amazon,
        }));
    }

    let module = Module::start(&EngineConfig {
        max_workers: 4,
        job_timeout: Duration::from_secs(2),
        shutdown_timeout: Duration::from_secs(1),
    });
    let service = OfferService::new(Arc::clone(&module), Arc::new(registry), 32);
    (router(service), module)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("request builder must not fail")
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request builder must not fail")
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, String) {
    let response = app.oneshot(request).await.expect("handler should respond");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body must be collected")
        .to_bytes();
    let text = String::from_utf8(bytes.to_vec()).expect("body must be utf-8");
    (status, text)
}

fn parse(body: &str) -> Value {
    serde_json::from_str(body).unwrap_or_else(|err| panic!("invalid json: {err}; body={body}"))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn search_merges_every_healthy_provider() {
    let (app, _module) = app();
    let (status, body) = send(app, get("/offers?q=tv&page=1&rowsPerPage=10")).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.starts_with(r#"{"list":[{"id":"#), "body={body}");

    let value = parse(&body);
    assert_eq!(value["totalCount"], json!(3));
    assert_eq!(value["pageCount"], json!(4));
    let list = value["list"].as_array().expect("list must be an array");
    assert_eq!(list.len(), 3);
    assert!(list.iter().all(|offer| offer["name"] == json!("tv")));
    assert!(list.iter().all(|offer| offer["partyName"] != json!("amazon.com")));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn root_route_returns_trending_offers_for_canada() {
    let (app, _module) = app();
    let (status, body) = send(app, get("/?country=ca")).await;

    assert_eq!(status, StatusCode::OK);
    let value = parse(&body);
    assert_eq!(value["totalCount"], json!(2));
    let mut parties: Vec<_> = value["list"]
        .as_array()
        .expect("list must be an array")
        .iter()
        .map(|offer| offer["partyName"].as_str().unwrap_or_default().to_string())
        .collect();
    parties.sort();
    assert_eq!(parties, vec!["bestbuy.com", "walmart.com"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn post_search_takes_keywords_from_name_column() {
    let (app, _module) = app();
    let body = json!({
        "searchColumns": [
            { "name": "name", "value": "laptop" },
            { "name": "country", "value": "ca" }
        ],
        "sortOrder": "desc",
        "page": 2,
        "rowsPerPage": 20
    });
    let (status, body) = send(app, post_json("/offers", &body)).await;

    assert_eq!(status, StatusCode::OK);
    let value = parse(&body);
    assert_eq!(value["totalCount"], json!(2));
    assert!(
        value["list"]
            .as_array()
            .expect("list must be an array")
            .iter()
            .all(|offer| offer["name"] == json!("laptop"))
    );
}

#[tokio::test]
async fn malformed_search_requests_are_rejected() {
    let (app, _module) = app();

    let (status, body) = send(app.clone(), get("/offers?rowsPerPage=0")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(parse(&body)["error"].as_str().is_some_and(|e| e.contains("rowsPerPage")));

    let (status, _) = send(app.clone(), get("/offers?country=fr")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let request = Request::builder()
        .method("POST")
        .uri("/offers")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .expect("request builder must not fail");
    let (status, body) = send(app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(parse(&body)["error"].is_string());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn detail_includes_competitors_from_other_providers() {
    let (app, _module) = app();
    let (status, body) = send(
        app,
        get("/offers/w-1?idType=id&source=walmart.com&country=us"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.starts_with(r#"{"offer":{"#), "body={body}");

    let value = parse(&body);
    assert_eq!(value["offer"]["id"], json!("w-1"));
    assert_eq!(value["offer"]["upc"], json!(UPC));

    // amazon.com is configured but failing, walmart.com is the source.
    let items = value["productDetailItems"]
        .as_array()
        .expect("productDetailItems must be an array");
    let mut parties: Vec<_> = items
        .iter()
        .map(|item| item["partyName"].as_str().unwrap_or_default().to_string())
        .collect();
    parties.sort();
    assert_eq!(parties, vec!["bestbuy.com", "ebay.com"]);
    for item in items {
        assert!(item["semanticName"].as_str().is_some_and(|s| s.starts_with("https://")));
        assert_eq!(item["price"], json!(199.99));
        assert_eq!(item["rating"], json!(4.0));
    }
}

#[tokio::test]
async fn detail_validates_source_and_maps_failures() {
    let (app, _module) = app();

    let (status, body) = send(app.clone(), get("/offers/w-1?source=etsy.com")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(parse(&body)["error"].as_str().is_some_and(|e| e.contains("etsy.com")));

    let (status, _) = send(app.clone(), get("/offers/w-1")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(app.clone(), get("/offers/missing?source=walmart.com")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(app, get("/offers/a-1?source=amazon.com")).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn stopped_module_reports_unavailable() {
    let (app, module) = app();

    let (status, body) = send(app.clone(), get("/healthz")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse(&body)["status"], json!("ok"));

    assert!(module.stop().await);

    let (status, _) = send(app.clone(), get("/healthz")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (status, body) = send(app, get("/offers?q=tv")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(parse(&body)["error"], json!("Service is shutting down"));
}
