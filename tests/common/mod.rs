//! Shared wiremock helpers for integration tests.

#![allow(dead_code)]

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use solarscout::config::AppConfig;

/// Base test configuration: the shipped defaults with rate limiting disabled
/// so test batches run without inter-request sleeps.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::from_toml_str(solarscout::config::DEFAULT_CONFIG)
        .expect("default config must parse");
    config.rate_limit.discovery_interval_ms = 0;
    config.rate_limit.website_interval_ms = 0;
    config
}

/// Build an Overpass-style node element.
pub fn node(id: u64, name: &str, lat: f64, lon: f64, website: Option<&str>) -> serde_json::Value {
    let mut tags = serde_json::json!({ "name": name });
    if let Some(website) = website {
        tags["website"] = serde_json::Value::String(website.to_string());
    }
    serde_json::json!({
        "type": "node",
        "id": id,
        "lat": lat,
        "lon": lon,
        "tags": tags
    })
}

/// Mock discovery endpoint answering every POST to `/api/interpreter` with
/// the given elements. Point `discovery.endpoint` at
/// `{server.uri()}/api/interpreter`.
pub async fn mock_overpass(elements: Vec<serde_json::Value>) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/interpreter"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "version": 0.6, "elements": elements })),
        )
        .mount(&server)
        .await;
    server
}

/// Mock discovery endpoint that always fails with the given status.
pub async fn mock_overpass_error(status: u16) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/interpreter"))
        .respond_with(ResponseTemplate::new(status))
        .mount(&server)
        .await;
    server
}

/// Mock website serving HTML at `/` with no robots.txt (404, which the
/// crawler must treat as "allowed").
pub async fn mock_site(html: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(html.to_string(), "text/html; charset=utf-8"),
        )
        .mount(&server)
        .await;
    server
}

/// Mock website with an explicit robots.txt body.
pub async fn mock_site_with_robots(html: &str, robots: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(robots.to_string())
                .insert_header("content-type", "text/plain"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(html.to_string(), "text/html; charset=utf-8"),
        )
        .mount(&server)
        .await;
    server
}

/// Mock geocoding endpoint answering `/search` with the given places.
pub async fn mock_geocoder(places: serde_json::Value) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(places))
        .mount(&server)
        .await;
    server
}
