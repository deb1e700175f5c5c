//! Login, registration and logout

use crate::client::AuthClient;
use crate::config::AuthDefaults;
use crate::dispatcher::ApiRequest;
use crate::error::{ClientError, ErrorPayload};
use crate::types::{LoginCredentials, LoginResponse, RegistrationProfile};
use tracing::{info, warn};

impl AuthClient {
    /// Exchange credentials for a token pair and start a session.
    ///
    /// On failure the session is cleared and the server's payload is
    /// returned as [`ClientError::Validation`] when the credentials were
    /// rejected, so the caller can render the server's message.
    pub async fn login(&self, credentials: &LoginCredentials) -> Result<(), ClientError> {
        let request = ApiRequest::post(self.config().endpoints.login.as_str()).json(credentials)?;

        match self.execute::<LoginResponse>(request).await {
            Ok(response) => {
                let store = self.session();
                store.set_tokens(Some(response.access), Some(response.refresh));
                store.set_user(response.user);
                info!(username = %credentials.username, "Login successful");
                Ok(())
            }
            Err(error) => {
                warn!(username = %credentials.username, error = %error, "Login failed");
                self.logout();
                Err(error.into_validation())
            }
        }
    }

    /// Create an account. Does not sign the user in.
    ///
    /// The profile is checked locally first; a mismatch or short password
    /// fails without contacting the server. The session is left untouched
    /// on failure.
    pub async fn register(&self, profile: &RegistrationProfile) -> Result<(), ClientError> {
        profile.validate()?;

        let request = ApiRequest::post(self.config().endpoints.register.as_str()).json(profile)?;
        match self.send(request).await {
            Ok(_) => {
                info!(username = %profile.username, "Registration successful. Please log in.");
                Ok(())
            }
            Err(error) => {
                warn!(username = %profile.username, error = %error, "Registration failed");
                Err(error.into_validation())
            }
        }
    }
}

impl RegistrationProfile {
    /// Field checks that do not need the server
    pub fn validate(&self) -> Result<(), ClientError> {
        let mut payload = ErrorPayload::default();
        if self.password != self.password_confirmation {
            payload = payload.field_error("password_confirmation", "Passwords do not match.");
        }
        if self.password.chars().count() < AuthDefaults::MIN_PASSWORD_LENGTH {
            payload = payload.field_error(
                "password",
                format!(
                    "Password must be at least {} characters long.",
                    AuthDefaults::MIN_PASSWORD_LENGTH
                ),
            );
        }

        if payload.is_empty() {
            Ok(())
        } else {
            Err(ClientError::Validation(payload))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(password: &str, confirmation: &str) -> RegistrationProfile {
        RegistrationProfile {
            username: "bob".into(),
            email: "bob@example.com".into(),
            password: password.into(),
            password_confirmation: confirmation.into(),
        }
    }

    #[test]
    fn accepts_matching_long_password() {
        assert!(profile("correct horse", "correct horse").validate().is_ok());
    }

    #[test]
    fn reports_each_failing_field() {
        let Err(ClientError::Validation(payload)) = profile("short", "shorter").validate() else {
            panic!("expected validation error");
        };
        assert_eq!(
            payload.field("password_confirmation"),
            Some(&["Passwords do not match.".to_string()][..])
        );
        assert_eq!(
            payload.field("password"),
            Some(&["Password must be at least 8 characters long.".to_string()][..])
        );
    }
}
