//! User-friendly error message mappings

use crate::error::ClientError;
use std::collections::BTreeMap;

pub const LOGIN_FALLBACK: &str = "Login failed. Please check your credentials.";
pub const REGISTRATION_FALLBACK: &str = "Registration failed. Please try again.";

/// Key used for messages that belong to no particular field
pub const GENERAL_KEY: &str = "general";

/// Single banner message for a failed login
pub fn login_error_message(error: &ClientError) -> String {
    error
        .payload()
        .and_then(|payload| {
            payload
                .detail
                .clone()
                .or_else(|| payload.non_field_errors.first().cloned())
        })
        .unwrap_or_else(|| LOGIN_FALLBACK.to_string())
}

/// Per-field messages for a failed registration.
///
/// Lists of messages are joined with spaces. A bare `detail` is reported
/// under [`GENERAL_KEY`].
pub fn registration_error_messages(error: &ClientError) -> BTreeMap<String, String> {
    let mut messages = BTreeMap::new();

    if let Some(payload) = error.payload() {
        for (field, list) in &payload.fields {
            messages.insert(field.clone(), list.join(" "));
        }
        if !payload.non_field_errors.is_empty() {
            messages.insert(
                "non_field_errors".to_string(),
                payload.non_field_errors.join(" "),
            );
        }
        if messages.is_empty() {
            if let Some(detail) = &payload.detail {
                messages.insert(GENERAL_KEY.to_string(), detail.clone());
            }
        }
    }

    if messages.is_empty() {
        messages.insert(GENERAL_KEY.to_string(), REGISTRATION_FALLBACK.to_string());
    }
    messages
}
