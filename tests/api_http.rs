//! HTTP-level tests for the public router, driven through tower::ServiceExt::oneshot.

mod common;

use axum::{
    body::{self, Body},
    http::{header, Request, StatusCode},
    Router,
};
use common::*;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt as _;
use volunteer_finder::api;
use volunteer_finder::clock::ManualClock;
use volunteer_finder::config::Settings;

const BODY_LIMIT: usize = 1024 * 1024;

fn test_router(settings: Settings) -> Router {
    let source = StubSource::new(
        "VolunteerMatch",
        vec![
            record_north_of_chicago("VolunteerMatch", "Pantry Shift", 3.0),
            record_north_of_chicago("VolunteerMatch", "Soup Kitchen Server", 1.0),
        ],
    );
    let state = state_with(
        settings,
        vec![as_source(&source)],
        Arc::new(ManualClock::default()),
    );
    api::router(state)
}

fn search_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/volunteer-opportunities/search")
        .header("content-type", "application/json")
        .header("x-client-id", "api-test")
        .body(Body::from(body.to_string()))
        .expect("build search request")
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

#[tokio::test]
async fn health_reports_sources() {
    let app = test_router(test_settings());
    let req = Request::builder()
        .uri("/api/health")
        .body(Body::empty())
        .expect("build health request");

    let resp = app.oneshot(req).await.expect("oneshot /api/health");
    assert_eq!(resp.status(), StatusCode::OK);
    let v = json_body(resp).await;
    assert_eq!(v["status"], "healthy");
    assert_eq!(v["sources"], json!(["VolunteerMatch"]));
}

#[tokio::test]
async fn search_returns_ranked_camel_case_json() {
    let app = test_router(test_settings());
    let resp = app
        .oneshot(search_request(json!({ "location": "Chicago, IL", "maxDistance": 10 })))
        .await
        .expect("oneshot search");
    assert_eq!(resp.status(), StatusCode::OK);

    let v = json_body(resp).await;
    assert_eq!(v["total"], 2);
    assert_eq!(v["degraded"], false);
    assert_eq!(v["opportunities"][0]["title"], "Soup Kitchen Server");
    assert_eq!(v["opportunities"][0]["category"], "food");
    assert!(v["opportunities"][0]["distanceMiles"].is_number());
    assert_eq!(v["sources"], json!(["VolunteerMatch"]));
}

#[tokio::test]
async fn empty_location_is_bad_request() {
    let app = test_router(test_settings());
    let resp = app
        .oneshot(search_request(json!({ "location": "   " })))
        .await
        .expect("oneshot search");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let v = json_body(resp).await;
    assert!(v["error"].as_str().unwrap_or_default().contains("location"));
}

#[tokio::test]
async fn unknown_interest_is_bad_request() {
    let app = test_router(test_settings());
    let resp = app
        .oneshot(search_request(
            json!({ "location": "Chicago", "interests": ["knitting"] }),
        ))
        .await
        .expect("oneshot search");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn rate_limited_client_gets_429() {
    let settings = Settings {
        rate_limit_max_requests: 1,
        ..test_settings()
    };
    let app = test_router(settings);

    let first = app
        .clone()
        .oneshot(search_request(json!({ "location": "Chicago" })))
        .await
        .expect("first search");
    assert_eq!(first.status(), StatusCode::OK);

    let second = app
        .oneshot(search_request(json!({ "location": "Chicago" })))
        .await
        .expect("second search");
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(second.headers().contains_key(header::RETRY_AFTER));
    let v = json_body(second).await;
    assert!(v["retryAfterSecs"].as_u64().unwrap_or_default() > 0);
}

#[tokio::test]
async fn sample_endpoint_serves_catalog_without_sources() {
    let app = test_router(test_settings());
    let req = Request::builder()
        .uri("/api/test/Houston")
        .body(Body::empty())
        .expect("build sample request");

    let resp = app.oneshot(req).await.expect("oneshot sample");
    assert_eq!(resp.status(), StatusCode::OK);
    let v = json_body(resp).await;
    assert_eq!(v["degraded"], true);
    assert_eq!(v["total"], 8);
    assert_eq!(v["sources"], json!(["Local Database"]));
}

#[tokio::test]
async fn mcp_tool_listing_and_call() {
    let app = test_router(test_settings());
    let req = Request::builder()
        .uri("/mcp/tools")
        .body(Body::empty())
        .expect("build tools request");
    let resp = app.clone().oneshot(req).await.expect("oneshot tools");
    let v = json_body(resp).await;
    assert_eq!(v["tools"][0]["name"], "search_opportunities");

    let call = Request::builder()
        .method("POST")
        .uri("/mcp/call")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({ "name": "search_opportunities", "arguments": { "location": "Chicago" } })
                .to_string(),
        ))
        .expect("build call request");
    let resp = app.clone().oneshot(call).await.expect("oneshot call");
    assert_eq!(resp.status(), StatusCode::OK);
    let v = json_body(resp).await;
    assert_eq!(v["is_error"], false);
    assert!(v["content"][0]["text"]
        .as_str()
        .unwrap_or_default()
        .contains("Soup Kitchen Server"));

    let unknown = Request::builder()
        .method("POST")
        .uri("/mcp/call")
        .header("content-type", "application/json")
        .body(Body::from(json!({ "name": "scrape_url", "arguments": {} }).to_string()))
        .expect("build unknown call");
    let resp = app.oneshot(unknown).await.expect("oneshot unknown");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
