//! Client configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Static defaults shared by the client and its front ends
pub struct AuthDefaults;

impl AuthDefaults {
    /// Base URL of the auth API
    pub const BASE_URL: &'static str = "http://127.0.0.1:8000/api";

    /// Per-call network timeout in milliseconds
    pub const TIMEOUT_MS: u64 = 10_000;

    /// Name of the persisted session record
    pub const STORAGE_KEY: &'static str = "auth-storage";

    /// Minimum password length accepted at registration
    pub const MIN_PASSWORD_LENGTH: usize = 8;

    pub const USER_AGENT: &'static str = concat!("sessiongate/", env!("CARGO_PKG_VERSION"));
}

/// Paths of the auth endpoints, relative to the base URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub login: String,
    pub register: String,
    pub refresh: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            login: "/auth/login/".to_string(),
            register: "/auth/register/".to_string(),
            refresh: "/auth/login/refresh/".to_string(),
        }
    }
}

impl EndpointConfig {
    /// Whether an authorization failure on `path` must never start a refresh.
    ///
    /// Login and refresh are exempt, otherwise a rejected refresh token would
    /// loop forever.
    pub fn is_refresh_exempt(&self, path: &str) -> bool {
        let target = normalize_path(path);
        target == normalize_path(&self.login) || target == normalize_path(&self.refresh)
    }
}

fn normalize_path(path: &str) -> &str {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    path.trim_matches('/')
}

/// Client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// API base URL, e.g. `http://127.0.0.1:8000/api`
    pub base_url: String,

    /// Per-call timeout in milliseconds. Ignored on wasm32.
    pub timeout_ms: u64,

    /// User agent sent with every request
    pub user_agent: Option<String>,

    pub endpoints: EndpointConfig,

    /// Name of the persisted session record
    pub storage_key: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: AuthDefaults::BASE_URL.to_string(),
            timeout_ms: AuthDefaults::TIMEOUT_MS,
            user_agent: None,
            endpoints: EndpointConfig::default(),
            storage_key: AuthDefaults::STORAGE_KEY.to_string(),
        }
    }
}

impl ClientConfig {
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
