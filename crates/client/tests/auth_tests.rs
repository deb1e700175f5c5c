//! Integration tests for login, registration and session persistence

mod common;

use common::{client_for, forbid_refresh, init_tracing};
use serde_json::json;
use sessiongate_client::messages::{login_error_message, registration_error_messages};
use sessiongate_client::storage::MemoryStorage;
use sessiongate_client::{
    AuthClient, ClientError, LoginCredentials, RegistrationProfile, SessionStorage,
};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn alice(password: &str) -> LoginCredentials {
    LoginCredentials {
        username: "alice".to_string(),
        password: password.to_string(),
    }
}

fn bob(password: &str, confirmation: &str) -> RegistrationProfile {
    RegistrationProfile {
        username: "bob".to_string(),
        email: "bob@example.com".to_string(),
        password: password.to_string(),
        password_confirmation: confirmation.to_string(),
    }
}

#[tokio::test]
async fn test_login_starts_persisted_session() {
    init_tracing();
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/login/"))
        .and(body_json(json!({ "username": "alice", "password": "correct horse" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access": "A1",
            "refresh": "R1",
            "user": { "id": 7, "username": "alice", "email": "alice@example.com" },
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (client, storage) = client_for(&mock_server);
    assert!(!client.session().is_loading());

    client.login(&alice("correct horse")).await.unwrap();

    assert!(client.is_authenticated());
    let user = client.session().user().unwrap();
    assert_eq!(user.id, Some(7));
    assert_eq!(user.display_name(), "alice");

    // A fresh client over the same storage picks the session back up
    let restarted = AuthClient::builder()
        .base_url(mock_server.uri())
        .storage(storage.clone())
        .build()
        .unwrap();
    assert!(restarted.session().is_loading());
    assert!(!restarted.is_authenticated());
    assert!(restarted.restore_from_persistence());
    assert_eq!(restarted.session().snapshot(), client.session().snapshot());

    let raw = storage.raw().unwrap();
    let envelope: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(envelope["version"], 0);
    assert_eq!(envelope["state"]["accessToken"], "A1");
    assert_eq!(envelope["state"]["refreshToken"], "R1");
    assert!(envelope["state"].get("isAuthenticated").is_none());
}

#[tokio::test]
async fn test_rejected_login_clears_session_without_refresh() {
    let mock_server = MockServer::start().await;
    forbid_refresh(&mock_server).await;

    Mock::given(method("POST"))
        .and(path("/auth/login/"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "detail": "No active account found with the given credentials",
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (client, storage) = client_for(&mock_server);
    client
        .session()
        .set_tokens(Some("A0".to_string()), Some("R0".to_string()));

    let error = client.login(&alice("wrong")).await.unwrap_err();
    match &error {
        ClientError::Validation(payload) => {
            assert_eq!(
                payload.detail.as_deref(),
                Some("No active account found with the given credentials")
            );
        }
        other => panic!("expected validation error, got {other:?}"),
    }
    assert_eq!(
        login_error_message(&error),
        "No active account found with the given credentials"
    );

    assert!(!client.is_authenticated());
    assert_eq!(client.session().refresh_token(), None);
    let persisted = storage.load().unwrap().unwrap();
    assert_eq!(persisted.access_token, None);
}

#[tokio::test]
async fn test_login_reports_non_field_errors() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/login/"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "non_field_errors": ["Unable to log in with provided credentials."],
        })))
        .mount(&mock_server)
        .await;

    let (client, _storage) = client_for(&mock_server);

    let error = client.login(&alice("wrong")).await.unwrap_err();
    assert!(matches!(error, ClientError::Validation(_)));
    assert_eq!(
        login_error_message(&error),
        "Unable to log in with provided credentials."
    );
}

#[tokio::test]
async fn test_register_does_not_sign_in() {
    init_tracing();
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/register/"))
        .and(body_json(json!({
            "username": "bob",
            "email": "bob@example.com",
            "password": "correct horse",
            "password_confirmation": "correct horse",
        })))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({ "id": 8, "username": "bob" })),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let (client, storage) = client_for(&mock_server);

    client
        .register(&bob("correct horse", "correct horse"))
        .await
        .unwrap();

    assert!(!client.is_authenticated());
    assert_eq!(client.session().user(), None);
    assert_eq!(storage.raw(), None);
}

#[tokio::test]
async fn test_register_field_errors_leave_session_alone() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/register/"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "username": ["A user with that username already exists."],
            "email": ["Enter a valid email address.", "This field must be unique."],
        })))
        .mount(&mock_server)
        .await;

    let (client, _storage) = client_for(&mock_server);
    client
        .session()
        .set_tokens(Some("A0".to_string()), Some("R0".to_string()));

    let error = client
        .register(&bob("correct horse", "correct horse"))
        .await
        .unwrap_err();
    assert!(matches!(error, ClientError::Validation(_)));

    let messages = registration_error_messages(&error);
    assert_eq!(
        messages["username"],
        "A user with that username already exists."
    );
    assert_eq!(
        messages["email"],
        "Enter a valid email address. This field must be unique."
    );

    assert_eq!(client.session().access_token().as_deref(), Some("A0"));
}

#[tokio::test]
async fn test_register_checks_passwords_before_sending() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/register/"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&mock_server)
        .await;

    let client = AuthClient::builder()
        .base_url(mock_server.uri())
        .storage(MemoryStorage::new())
        .build()
        .unwrap();

    let error = client
        .register(&bob("correct horse", "correct hose"))
        .await
        .unwrap_err();
    let messages = registration_error_messages(&error);
    assert_eq!(messages["password_confirmation"], "Passwords do not match.");

    let error = client.register(&bob("short", "short")).await.unwrap_err();
    let messages = registration_error_messages(&error);
    assert_eq!(
        messages["password"],
        "Password must be at least 8 characters long."
    );
}

#[tokio::test]
async fn test_logout_clears_persisted_session() {
    let mock_server = MockServer::start().await;
    let (client, storage) = common::signed_in_client(&mock_server);

    client.logout();
    client.logout();

    assert!(!client.is_authenticated());
    assert_eq!(client.session().refresh_token(), None);
    let persisted = storage.load().unwrap().unwrap();
    assert_eq!(persisted.refresh_token, None);
    assert_eq!(persisted.user, None);
}
