//! Integration tests using mock HTTP server
//!
//! Tests the full end-to-end flow: ResilientClient → reqwest → mock API and
//! token refresh endpoint

use resilient_http::token::HttpTokenRefresher;
use resilient_http::{
    ClientConfig, ClientSettings, Error, MemoryTokenStore, RefreshPolicy, RefreshedToken,
    ResilientClient, TokenGateway,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Helpers
// ============================================================================

fn fast_config(server: &MockServer) -> ClientConfig {
    ClientConfig::builder()
        .base_url(server.uri())
        .timeout(Duration::from_secs(5))
        .initial_delay(Duration::from_millis(10))
        .build()
}

fn refresher(server: &MockServer) -> Arc<HttpTokenRefresher> {
    Arc::new(HttpTokenRefresher::new(
        reqwest::Client::new(),
        format!("{}/token/refresh", server.uri()),
    ))
}

async fn mount_refresh(server: &MockServer, old: &str, new: &str, calls: u64) {
    Mock::given(method("POST"))
        .and(path("/token/refresh"))
        .and(body_json(json!({"token": old})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": new,
            "expires_in": 3600
        })))
        .expect(calls)
        .mount(server)
        .await;
}

async fn mount_items(server: &MockServer, token: &str) {
    Mock::given(method("GET"))
        .and(path("/api/items"))
        .and(header("Authorization", format!("Bearer {token}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 3,
            "results": [{"id": 1}, {"id": 2}, {"id": 3}]
        })))
        .mount(server)
        .await;
}

async fn mount_unauthorized(server: &MockServer, token: &str) {
    Mock::given(method("GET"))
        .and(path("/api/items"))
        .and(header("Authorization", format!("Bearer {token}").as_str()))
        .respond_with(ResponseTemplate::new(401))
        .mount(server)
        .await;
}

// ============================================================================
// Retry Tests
// ============================================================================

#[tokio::test]
async fn test_recovers_from_transient_503() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/items"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"count": 0})))
        .expect(1)
        .mount(&server)
        .await;

    let client = ResilientClient::new(fast_config(&server)).unwrap();
    let body: serde_json::Value = client.get_json("/api/items").await.unwrap();

    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn test_exhausted_retries_surface_last_status() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .expect(3)
        .mount(&server)
        .await;

    let client = ResilientClient::new(fast_config(&server)).unwrap();
    let err = client.get("/api/items").await.unwrap_err();

    assert_eq!(err.status(), Some(503));
    assert!(err.to_string().contains("maintenance"));
}

#[tokio::test]
async fn test_non_retryable_status_is_immediate() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let client = ResilientClient::new(fast_config(&server)).unwrap();
    let err = client.get("/api/missing").await.unwrap_err();

    assert!(matches!(err, Error::HttpStatus { status: 404, .. }));
}

#[tokio::test]
async fn test_408_retries_with_longer_timeout() {
    let server = MockServer::start().await;

    // First attempt answers 408; the second is slower than the initial
    // timeout but within the doubled one
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(408))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(600))
                .set_body_json(json!({"ok": true})),
        )
        .mount(&server)
        .await;

    let config = ClientConfig::builder()
        .base_url(server.uri())
        .timeout(Duration::from_millis(400))
        .initial_delay(Duration::from_millis(10))
        .build();
    let client = ResilientClient::new(config).unwrap();

    let response = client.get("/slow").await.unwrap();
    assert_eq!(response.status(), 200);
}

// ============================================================================
// Token Refresh Tests
// ============================================================================

#[tokio::test]
async fn test_reactive_refresh_after_401() {
    let server = MockServer::start().await;
    mount_unauthorized(&server, "old-token").await;
    mount_items(&server, "new-token").await;
    mount_refresh(&server, "old-token", "new-token", 1).await;

    let store = Arc::new(MemoryTokenStore::with_token("old-token"));
    let client = ResilientClient::new(fast_config(&server))
        .unwrap()
        .with_auth(store.clone(), refresher(&server));

    let body: serde_json::Value = client.get_json("/api/items").await.unwrap();
    assert_eq!(body["count"], 3);
    assert_eq!(body["results"].as_array().unwrap().len(), 3);

    let gateway = TokenGateway::new(store);
    let token = gateway.current_token().await.unwrap();
    assert_eq!(token.as_str(), "new-token");
    assert!(gateway.stored_expiry().await.is_some());
}

#[tokio::test]
async fn test_concurrent_401s_share_one_refresh() {
    let server = MockServer::start().await;
    mount_unauthorized(&server, "old-token").await;
    mount_items(&server, "new-token").await;
    mount_refresh(&server, "old-token", "new-token", 1).await;

    let store = Arc::new(MemoryTokenStore::with_token("old-token"));
    let client = Arc::new(
        ResilientClient::new(fast_config(&server))
            .unwrap()
            .with_auth(store, refresher(&server)),
    );

    let handles: Vec<_> = (0..5)
        .map(|_| {
            let client = client.clone();
            tokio::spawn(async move { client.get("/api/items").await })
        })
        .collect();

    for handle in handles {
        let response = handle.await.unwrap().unwrap();
        assert_eq!(response.status(), 200);
    }

    assert_eq!(client.coordinator().unwrap().refresh_count(), 1);
}

#[tokio::test]
async fn test_refresh_failure_is_surfaced() {
    let server = MockServer::start().await;
    mount_unauthorized(&server, "old-token").await;

    Mock::given(method("POST"))
        .and(path("/token/refresh"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let client = ResilientClient::new(fast_config(&server))
        .unwrap()
        .with_auth(
            Arc::new(MemoryTokenStore::with_token("old-token")),
            refresher(&server),
        );

    let err = client.get("/api/items").await.unwrap_err();
    assert!(err.is_refresh_failure());
}

#[tokio::test]
async fn test_proactive_refresh_of_expired_token() {
    let server = MockServer::start().await;
    mount_items(&server, "new-token").await;
    mount_refresh(&server, "stale-token", "new-token", 1).await;

    Mock::given(method("GET"))
        .and(header("Authorization", "Bearer stale-token"))
        .respond_with(ResponseTemplate::new(401))
        .expect(0)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryTokenStore::new());
    TokenGateway::new(store.clone())
        .store_token(&RefreshedToken::expires_in("stale-token", -60))
        .await
        .unwrap();

    let config = ClientConfig::builder()
        .base_url(server.uri())
        .refresh_policy(RefreshPolicy::Proactive)
        .build();
    let client = ResilientClient::new(config)
        .unwrap()
        .with_auth(store, refresher(&server));

    let response = client.get("/api/items").await.unwrap();
    assert_eq!(response.status(), 200);
}

// ============================================================================
// Configuration Tests
// ============================================================================

#[tokio::test]
async fn test_client_from_yaml_settings() {
    let server = MockServer::start().await;
    mount_unauthorized(&server, "old-token").await;
    mount_items(&server, "fresh").await;

    Mock::given(method("PUT"))
        .and(path("/auth/renew"))
        .and(header("X-Client", "cli"))
        .and(body_json(json!({"refresh": "old-token", "client_id": "app"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"token": "fresh"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let yaml = format!(
        r#"
base_url: {uri}
initial_delay_ms: 10
headers:
  X-Client: cli
refresh:
  url: {uri}/auth/renew
  method: put
  token_field: refresh
  token_path: $.data.token
  expires_in_path: null
  body:
    client_id: app
  headers:
    X-Client: cli
"#,
        uri = server.uri()
    );
    let settings = ClientSettings::from_yaml_str(&yaml).unwrap();

    let refresher = settings
        .refresh
        .as_ref()
        .unwrap()
        .build(reqwest::Client::new())
        .unwrap();

    let client = ResilientClient::new(settings.to_client_config())
        .unwrap()
        .with_auth(
            Arc::new(MemoryTokenStore::with_token("old-token")),
            Arc::new(refresher),
        );

    let body: serde_json::Value = client.get_json("/api/items").await.unwrap();
    assert_eq!(body["count"], 3);
}
