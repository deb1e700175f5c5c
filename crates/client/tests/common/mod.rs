//! Shared fixtures for the client integration tests

#![allow(dead_code)]

use serde_json::json;
use sessiongate_client::AuthClient;
use sessiongate_client::storage::MemoryStorage;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const REFRESH_PATH: &str = "/auth/login/refresh/";

/// Client pointed at `server`, persisting into the returned storage
pub fn client_for(server: &MockServer) -> (AuthClient, MemoryStorage) {
    let storage = MemoryStorage::new();
    let client = AuthClient::builder()
        .base_url(server.uri())
        .storage(storage.clone())
        .build()
        .unwrap();
    client.restore_from_persistence();
    (client, storage)
}

/// Client that already holds the A1/R1 token pair
pub fn signed_in_client(server: &MockServer) -> (AuthClient, MemoryStorage) {
    let (client, storage) = client_for(server);
    client
        .session()
        .set_tokens(Some("A1".to_string()), Some("R1".to_string()));
    (client, storage)
}

pub fn token_not_valid() -> ResponseTemplate {
    ResponseTemplate::new(401).set_body_json(json!({
        "detail": "Given token not valid for any token type",
        "code": "token_not_valid",
    }))
}

/// Refresh endpoint expecting `{"refresh": refresh}` and answering with `response`
pub fn refresh_mock(refresh: &str, response: ResponseTemplate) -> Mock {
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .and(body_json(json!({ "refresh": refresh })))
        .respond_with(response)
}

/// Refresh endpoint that must never be called
pub async fn forbid_refresh(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(server)
        .await;
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("sessiongate_client=debug")
        .with_test_writer()
        .try_init();
}
