//! SessionGate client
//!
//! Holds an access/refresh token pair, attaches the access token to every
//! outbound call, and when a call is rejected with an expired credential
//! refreshes the session once and replays every call that failed while the
//! refresh was in flight.
//!
//! ```no_run
//! use sessiongate_client::{AuthClient, LoginCredentials, storage::MemoryStorage};
//!
//! # async fn run() -> Result<(), sessiongate_client::ClientError> {
//! let client = AuthClient::builder()
//!     .base_url("http://127.0.0.1:8000/api")
//!     .storage(MemoryStorage::new())
//!     .build()?;
//! client.restore_from_persistence();
//!
//! client
//!     .login(&LoginCredentials {
//!         username: "alice".into(),
//!         password: "correct horse".into(),
//!     })
//!     .await?;
//!
//! let plans: serde_json::Value = client.get("/plans/").await?;
//! # let _ = plans;
//! # Ok(())
//! # }
//! ```

mod auth;
pub mod client;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod messages;
pub mod refresh;
pub mod storage;
pub mod store;
pub mod types;

pub use client::{AuthClient, AuthClientBuilder};
pub use config::{AuthDefaults, ClientConfig, EndpointConfig};
pub use dispatcher::{ApiRequest, ApiResponse};
pub use error::{ClientError, ErrorPayload, RefreshFailure};
pub use storage::{SessionStorage, StorageError};
pub use store::{SessionRecord, SessionStore};
pub use types::{LoginCredentials, RegistrationProfile, UserIdentity};
