//! Request and response types for the auth API

use serde::{Deserialize, Serialize};

/// Identity of the signed-in user as reported by the login endpoint.
///
/// Fields the client does not know about are carried through untouched so
/// they survive a persist/restore cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserIdentity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl UserIdentity {
    /// Name to show for this user
    pub fn display_name(&self) -> &str {
        self.username.as_deref().unwrap_or("User")
    }
}

/// Login request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginCredentials {
    pub username: String,
    pub password: String,
}

/// Login response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access: String,
    pub refresh: String,
    #[serde(default)]
    pub user: Option<UserIdentity>,
}

/// Registration request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationProfile {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password_confirmation: String,
}

/// Refresh request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshRequest {
    pub refresh: String,
}

/// Refresh response body. Servers that rotate refresh tokens also return
/// a new `refresh` value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
}
