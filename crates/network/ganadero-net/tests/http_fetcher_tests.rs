//! `HttpFetcher` against a real HTTP server

use ganadero_core::{Method, Request};
use ganadero_net::{FetchError, Fetcher, HttpFetcher, HttpFetcherConfig};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[tokio::test]
async fn test_get_returns_status_headers_and_body() {
    init_test_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/animales"))
        .and(query_param("page", "2"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-Total-Count", "41")
                .set_body_json(json!([{"id": 1, "arete": "MX-001"}])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new().unwrap();
    let response = fetcher
        .fetch(&Request::get(format!("{}/api/v1/animales?page=2", server.uri())))
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.header("x-total-count"), Some("41"));
    let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
    assert_eq!(body, json!([{"id": 1, "arete": "MX-001"}]));
}

#[tokio::test]
async fn test_mutation_sends_headers_and_json_body() {
    init_test_logging();
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/v1/potreros/3"))
        .and(header("authorization", "Bearer token"))
        .and(body_json(json!({"nombre": "Norte"})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let request = Request::new(Method::Put, format!("{}/api/v1/potreros/3", server.uri()))
        .with_header("Authorization", "Bearer token")
        .with_json(&json!({"nombre": "Norte"}))
        .unwrap();
    let response = HttpFetcher::new().unwrap().fetch(&request).await.unwrap();

    assert_eq!(response.status, 204);
    assert!(response.is_success());
}

#[tokio::test]
async fn test_error_status_is_a_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let request = Request::new(Method::Post, format!("{}/api/v1/animales", server.uri()));
    let response = HttpFetcher::new().unwrap().fetch(&request).await.unwrap();

    assert_eq!(response.status, 500);
    assert_eq!(&response.body[..], b"boom");
}

#[tokio::test]
async fn test_slow_server_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::with_config(HttpFetcherConfig {
        timeout: Duration::from_millis(200),
        ..Default::default()
    })
    .unwrap();
    let err = fetcher
        .fetch(&Request::get(format!("{}/health", server.uri())))
        .await
        .unwrap_err();

    assert_eq!(err, FetchError::Timeout(Duration::from_millis(200)));
}
