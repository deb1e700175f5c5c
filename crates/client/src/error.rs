//! Client error types

use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Structured error body returned by the auth API.
///
/// The API reports failures either as a single `detail` string, as a
/// `non_field_errors` list, or as a mapping of field name to one or more
/// messages. All three shapes are normalised into this type so callers can
/// render field-specific messages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorPayload {
    pub detail: Option<String>,
    pub non_field_errors: Vec<String>,
    pub fields: BTreeMap<String, Vec<String>>,
}

impl ErrorPayload {
    /// Parse a response body. Non-JSON bodies become the `detail` message.
    pub fn parse(body: &str) -> Self {
        match serde_json::from_str::<Value>(body) {
            Ok(Value::Object(map)) => Self::from_object(map),
            Ok(Value::String(message)) => Self::with_detail(message),
            _ => {
                let trimmed = body.trim();
                if trimmed.is_empty() {
                    Self::default()
                } else {
                    Self::with_detail(trimmed)
                }
            }
        }
    }

    /// Payload carrying only a `detail` message
    pub fn with_detail(detail: impl Into<String>) -> Self {
        Self {
            detail: Some(detail.into()),
            ..Self::default()
        }
    }

    /// Add a message for a named field
    pub fn field_error(mut self, field: impl Into<String>, message: impl Into<String>) -> Self {
        self.fields
            .entry(field.into())
            .or_default()
            .push(message.into());
        self
    }

    /// Messages reported for a single field
    pub fn field(&self, name: &str) -> Option<&[String]> {
        self.fields.get(name).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.detail.is_none() && self.non_field_errors.is_empty() && self.fields.is_empty()
    }

    fn from_object(map: serde_json::Map<String, Value>) -> Self {
        let mut payload = Self::default();
        for (key, value) in map {
            let messages = collect_messages(value);
            match key.as_str() {
                "detail" => payload.detail = messages.into_iter().next(),
                "non_field_errors" => payload.non_field_errors = messages,
                _ => {
                    payload.fields.insert(key, messages);
                }
            }
        }
        payload
    }
}

fn collect_messages(value: Value) -> Vec<String> {
    match value {
        Value::Null => Vec::new(),
        Value::String(message) => vec![message],
        Value::Array(items) => items.into_iter().flat_map(collect_messages).collect(),
        other => vec![other.to_string()],
    }
}

impl fmt::Display for ErrorPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(detail) = &self.detail {
            return f.write_str(detail);
        }
        if let Some(first) = self.non_field_errors.first() {
            return f.write_str(first);
        }
        if self.fields.is_empty() {
            return f.write_str("no details");
        }
        let rendered: Vec<String> = self
            .fields
            .iter()
            .map(|(field, messages)| format!("{field}: {}", messages.join(" ")))
            .collect();
        f.write_str(&rendered.join("; "))
    }
}

/// Why a refresh exchange failed.
///
/// Cloneable so the same failure can be handed to every request that was
/// queued behind the refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshFailure {
    /// HTTP status of the refresh response, absent for transport failures
    pub status: Option<u16>,
    pub payload: ErrorPayload,
}

impl RefreshFailure {
    pub(crate) fn from_error(error: &ClientError) -> Self {
        Self {
            status: error.status(),
            payload: error
                .payload()
                .cloned()
                .unwrap_or_else(|| ErrorPayload::with_detail(error.to_string())),
        }
    }

    pub(crate) fn abandoned() -> Self {
        Self {
            status: None,
            payload: ErrorPayload::with_detail("refresh was abandoned before it completed"),
        }
    }
}

impl fmt::Display for RefreshFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "refresh rejected with status {status}: {}", self.payload),
            None => write!(f, "{}", self.payload),
        }
    }
}

/// Client error types
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network or request error
    #[error("Request failed: {0}")]
    Request(#[source] reqwest::Error),

    /// The per-call network timeout elapsed
    #[error("Request timed out: {0}")]
    Timeout(#[source] reqwest::Error),

    /// Credential missing, invalid or expired (401)
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(ErrorPayload),

    /// Structured field validation failure from login or registration
    #[error("Validation failed: {0}")]
    Validation(ErrorPayload),

    /// Bad request
    #[error("Bad request: {0}")]
    BadRequest(ErrorPayload),

    /// Forbidden
    #[error("Forbidden: {0}")]
    Forbidden(ErrorPayload),

    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(ErrorPayload),

    /// Server returned an error status
    #[error("Server error {status}: {payload}")]
    ServerError { status: u16, payload: ErrorPayload },

    /// The refresh exchange failed and the session was cleared
    #[error("Session refresh failed: {0}")]
    RefreshExhausted(RefreshFailure),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout(error)
        } else {
            Self::Request(error)
        }
    }
}

impl ClientError {
    /// Create error from HTTP status code and raw response body
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let payload = ErrorPayload::parse(body);
        match status.as_u16() {
            400 => Self::BadRequest(payload),
            401 => Self::AuthenticationFailed(payload),
            403 => Self::Forbidden(payload),
            404 => Self::NotFound(payload),
            code => Self::ServerError {
                status: code,
                payload,
            },
        }
    }

    /// Whether this error means the access credential was rejected
    pub const fn is_credential_error(&self) -> bool {
        matches!(self, Self::AuthenticationFailed(_))
    }

    /// HTTP status associated with the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::AuthenticationFailed(_) => Some(401),
            Self::BadRequest(_) => Some(400),
            Self::Forbidden(_) => Some(403),
            Self::NotFound(_) => Some(404),
            Self::ServerError { status, .. } => Some(*status),
            Self::RefreshExhausted(failure) => failure.status,
            Self::Request(error) | Self::Timeout(error) => error.status().map(|s| s.as_u16()),
            Self::Validation(_) | Self::Serialization(_) | Self::Configuration(_) => None,
        }
    }

    /// Structured error payload, if the server supplied one
    pub const fn payload(&self) -> Option<&ErrorPayload> {
        match self {
            Self::AuthenticationFailed(payload)
            | Self::Validation(payload)
            | Self::BadRequest(payload)
            | Self::Forbidden(payload)
            | Self::NotFound(payload)
            | Self::ServerError { payload, .. } => Some(payload),
            Self::RefreshExhausted(failure) => Some(&failure.payload),
            Self::Request(_) | Self::Timeout(_) | Self::Serialization(_) | Self::Configuration(_) => {
                None
            }
        }
    }

    /// Re-signal a login or registration rejection as a validation failure
    pub(crate) fn into_validation(self) -> Self {
        match self {
            Self::BadRequest(payload) | Self::AuthenticationFailed(payload) => {
                Self::Validation(payload)
            }
            other => other,
        }
    }
}
