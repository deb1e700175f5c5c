//! Session-aware API client

use crate::config::{ClientConfig, EndpointConfig};
use crate::dispatcher::{ApiRequest, ApiResponse, Dispatcher};
use crate::error::ClientError;
use crate::refresh::RefreshCoordinator;
use crate::storage::SessionStorage;
use crate::store::SessionStore;
use reqwest::{Method, RequestBuilder};
use serde::{Serialize, de::DeserializeOwned};
use std::sync::Arc;
use std::time::Duration;

struct ClientInner {
    config: ClientConfig,
    store: SessionStore,
    dispatcher: Dispatcher,
    coordinator: RefreshCoordinator,
}

/// API client that owns a session and refreshes it transparently.
///
/// Cloning is cheap; clones share the session and the refresh cycle.
#[derive(Clone)]
pub struct AuthClient {
    inner: Arc<ClientInner>,
}

impl AuthClient {
    /// Create a new client with default configuration and in-memory storage
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::builder().base_url(base_url).build()
    }

    /// Create a new client builder
    pub fn builder() -> AuthClientBuilder {
        AuthClientBuilder::default()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        self.inner.dispatcher.base_url()
    }

    /// The session this client reads credentials from
    pub fn session(&self) -> &SessionStore {
        &self.inner.store
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.store.is_authenticated()
    }

    /// Whether a refresh exchange is currently in flight
    pub fn is_refreshing(&self) -> bool {
        self.inner.coordinator.is_refreshing()
    }

    /// Number of calls parked behind the in-flight refresh
    pub fn queued_requests(&self) -> usize {
        self.inner.coordinator.queued()
    }

    /// Load the persisted session; see [`SessionStore::restore_from_persistence`]
    pub fn restore_from_persistence(&self) -> bool {
        self.inner.store.restore_from_persistence()
    }

    /// Clear the session
    pub fn logout(&self) {
        self.inner.store.logout();
    }

    /// Create a request builder with the current credential attached.
    ///
    /// Calls sent this way bypass refresh handling.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.inner.dispatcher.request(method, path)
    }

    /// Send a request, refreshing the session once if its token was rejected
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ClientError> {
        self.inner
            .coordinator
            .execute(&self.inner.dispatcher, request)
            .await
    }

    /// Send a request and decode the JSON response
    pub async fn execute<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ClientError> {
        self.send(request).await?.json()
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.execute(ApiRequest::get(path)).await
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.execute(ApiRequest::post(path).json(body)?).await
    }

    pub async fn delete(&self, path: &str) -> Result<(), ClientError> {
        self.send(ApiRequest::delete(path)).await.map(|_| ())
    }
}

/// Builder for [`AuthClient`]
#[derive(Default)]
pub struct AuthClientBuilder {
    config: Option<ClientConfig>,
    base_url: Option<String>,
    timeout: Option<Duration>,
    user_agent: Option<String>,
    endpoints: Option<EndpointConfig>,
    store: Option<SessionStore>,
}

impl AuthClientBuilder {
    /// Start from a full configuration; later setters override it
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the per-call timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn endpoints(mut self, endpoints: EndpointConfig) -> Self {
        self.endpoints = Some(endpoints);
        self
    }

    /// Persist the session to `storage`
    pub fn storage(self, storage: impl SessionStorage + 'static) -> Self {
        self.store(SessionStore::new(storage))
    }

    /// Share an existing session store
    pub fn store(mut self, store: SessionStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Build the client
    pub fn build(self) -> Result<AuthClient, ClientError> {
        let has_config = self.config.is_some();
        let mut config = self.config.unwrap_or_default();

        match self.base_url {
            Some(base_url) => config.base_url = base_url,
            None if !has_config => {
                return Err(ClientError::Configuration("base_url is required".into()));
            }
            None => {}
        }
        if let Some(timeout) = self.timeout {
            config.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        }
        if let Some(user_agent) = self.user_agent {
            config.user_agent = Some(user_agent);
        }
        if let Some(endpoints) = self.endpoints {
            config.endpoints = endpoints;
        }

        let store = self.store.unwrap_or_default();
        let dispatcher = Dispatcher::new(&config, store.clone())?;
        let coordinator = RefreshCoordinator::new(config.endpoints.clone());

        Ok(AuthClient {
            inner: Arc::new(ClientInner {
                config,
                store,
                dispatcher,
                coordinator,
            }),
        })
    }
}
