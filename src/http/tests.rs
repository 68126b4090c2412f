//! Tests for the HTTP transport module

use super::*;
use crate::error::Error;
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn transport() -> ReqwestTransport {
    ReqwestTransport::new("resilient-http-test").unwrap()
}

#[test]
fn test_request_builder() {
    let request = HttpRequest::get("https://example.com/items")
        .header("X-Request-Id", "abc123")
        .query("page", "2")
        .body("raw");

    assert_eq!(request.method, reqwest::Method::GET);
    assert_eq!(request.header_value("x-request-id"), Some("abc123"));
    assert_eq!(request.query.get("page"), Some(&"2".to_string()));
    assert_eq!(request.body.as_deref(), Some(&b"raw"[..]));
}

#[test]
fn test_set_header_is_case_insensitive() {
    let mut request = HttpRequest::get("https://example.com").header("authorization", "Bearer old");

    request.set_header(AUTHORIZATION, "Bearer new");

    assert_eq!(request.headers.len(), 1);
    assert_eq!(request.authorization(), Some("Bearer new"));
    assert_eq!(request.remove_header("AUTHORIZATION"), Some("Bearer new".to_string()));
    assert!(request.authorization().is_none());
}

#[test]
fn test_request_json_body() {
    let request = HttpRequest::post("https://example.com")
        .json(&json!({"name": "test"}))
        .unwrap();

    assert_eq!(request.header_value("Content-Type"), Some("application/json"));
    let body: serde_json::Value = serde_json::from_slice(request.body.as_ref().unwrap()).unwrap();
    assert_eq!(body["name"], "test");
}

#[test]
fn test_response_helpers() {
    let response = HttpResponse::with_json(200, &json!({"count": 3}));
    assert!(response.is_success());
    assert_eq!(response.header("Content-Type"), Some("application/json"));
    let value: serde_json::Value = response.json().unwrap();
    assert_eq!(value["count"], 3);

    let err = HttpResponse::new(503, Default::default(), "down").into_error();
    assert_eq!(err.to_string(), "HTTP 503: down");
}

#[test]
fn test_error_status_keeps_raw_body() {
    let body: &[u8] = b"\x00\x9fpartial";
    let err = HttpResponse::new(502, HeaderMap::new(), body).into_error();

    match err {
        Error::HttpStatus { status, body: ref kept } => {
            assert_eq!(status, 502);
            assert_eq!(kept.as_ref(), body);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_transport_error_display() {
    let err = TransportError::timeout("deadline elapsed");
    assert!(err.is_timeout());
    assert_eq!(err.kind(), TransportErrorKind::Timeout);
    assert_eq!(err.to_string(), "timeout: deadline elapsed");
}

#[tokio::test]
async fn test_reqwest_transport_get() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/items"))
        .and(query_param("page", "1"))
        .and(header("Authorization", "Bearer abc"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-total", "3")
                .set_body_json(json!({"count": 3})),
        )
        .mount(&mock_server)
        .await;

    let request = HttpRequest::get(format!("{}/api/items", mock_server.uri()))
        .query("page", "1")
        .header("Authorization", "Bearer abc");

    let response = transport()
        .send(&request, Duration::from_secs(5))
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.header("X-Total"), Some("3"));
    let body: serde_json::Value = response.json().unwrap();
    assert_eq!(body["count"], 3);
}

#[tokio::test]
async fn test_reqwest_transport_post_json() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/items"))
        .and(body_json(json!({"name": "widget"})))
        .respond_with(ResponseTemplate::new(201))
        .mount(&mock_server)
        .await;

    let request = HttpRequest::post(format!("{}/api/items", mock_server.uri()))
        .json(&json!({"name": "widget"}))
        .unwrap();

    let response = transport()
        .send(&request, Duration::from_secs(5))
        .await
        .unwrap();

    assert_eq!(response.status(), 201);
}

#[tokio::test]
async fn test_reqwest_transport_error_status_is_ok() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&mock_server)
        .await;

    let response = transport()
        .send(&HttpRequest::get(mock_server.uri()), Duration::from_secs(5))
        .await
        .unwrap();

    assert_eq!(response.status(), 503);
    assert_eq!(response.text(), "maintenance");
}

#[tokio::test]
async fn test_reqwest_transport_timeout() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&mock_server)
        .await;

    let err = transport()
        .send(&HttpRequest::get(mock_server.uri()), Duration::from_millis(50))
        .await
        .unwrap_err();

    assert!(err.is_timeout());
}

#[tokio::test]
async fn test_reqwest_transport_connect_error() {
    // Nothing listens on port 9 (discard) in the test environment
    let err = transport()
        .send(&HttpRequest::get("http://127.0.0.1:9/"), Duration::from_secs(2))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), TransportErrorKind::Connect);
}

#[tokio::test]
async fn test_reqwest_transport_keeps_repeated_headers() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .append_header("set-cookie", "session=a1; Path=/")
                .append_header("set-cookie", "theme=dark; Path=/"),
        )
        .mount(&mock_server)
        .await;

    let response = transport()
        .send(&HttpRequest::get(mock_server.uri()), Duration::from_secs(5))
        .await
        .unwrap();

    let cookies: Vec<_> = response
        .header_values("Set-Cookie")
        .into_iter()
        .map(|v| v.to_str().unwrap())
        .collect();
    assert_eq!(cookies, vec!["session=a1; Path=/", "theme=dark; Path=/"]);
}

#[tokio::test]
async fn test_transport_with_client_uses_its_defaults() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(header("X-Tenant", "acme"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut defaults = HeaderMap::new();
    defaults.insert("x-tenant", HeaderValue::from_static("acme"));
    let client = reqwest::Client::builder()
        .default_headers(defaults)
        .build()
        .unwrap();

    let response = ReqwestTransport::with_client(client)
        .send(&HttpRequest::get(mock_server.uri()), Duration::from_secs(5))
        .await
        .unwrap();

    assert_eq!(response.status(), 204);
}
