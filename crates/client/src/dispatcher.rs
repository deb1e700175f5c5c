//! Request dispatch
//!
//! The dispatcher turns an [`ApiRequest`] into an HTTP call. The bearer
//! credential is read from the [`SessionStore`] at send time, never captured
//! when the request or the dispatcher was built.

use crate::config::{AuthDefaults, ClientConfig};
use crate::error::ClientError;
use crate::store::SessionStore;
use reqwest::{Client, ClientBuilder, Method, RequestBuilder, StatusCode, header};
use serde::{Serialize, de::DeserializeOwned};
use tracing::debug;

/// Replayable description of an outbound call.
///
/// Unlike a `reqwest::RequestBuilder` this can be sent more than once,
/// which is what lets a call be parked during a refresh and replayed with
/// the new credential.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<serde_json::Value>,
    retried: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            retried: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Append a query parameter
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Set a JSON body
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, ClientError> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    pub const fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub const fn body(&self) -> Option<&serde_json::Value> {
        self.body.as_ref()
    }

    /// Whether this call has already been replayed after a refresh
    pub const fn is_retried(&self) -> bool {
        self.retried
    }

    pub(crate) const fn mark_retried(&mut self) {
        self.retried = true;
    }
}

/// Body and status of a successful call
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: StatusCode,
    body: String,
}

impl ApiResponse {
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    pub fn text(&self) -> &str {
        &self.body
    }

    /// Decode the body. An empty body decodes as JSON `null`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ClientError> {
        let body = self.body.trim();
        let body = if body.is_empty() { "null" } else { body };
        Ok(serde_json::from_str(body)?)
    }
}

/// Sends requests with the session's current credential
#[derive(Clone)]
pub struct Dispatcher {
    client: Client,
    base_url: String,
    store: SessionStore,
}

impl Dispatcher {
    /// Create a dispatcher for `config`, reading credentials from `store`
    pub fn new(config: &ClientConfig, store: SessionStore) -> Result<Self, ClientError> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        reqwest::Url::parse(&base_url)
            .map_err(|e| ClientError::Configuration(format!("invalid base_url {base_url:?}: {e}")))?;

        let user_agent = config
            .user_agent
            .clone()
            .unwrap_or_else(|| AuthDefaults::USER_AGENT.to_string());

        #[cfg(not(target_arch = "wasm32"))]
        let client = ClientBuilder::new()
            .user_agent(user_agent)
            .timeout(config.timeout())
            .build()?;

        #[cfg(target_arch = "wasm32")]
        let client = ClientBuilder::new().user_agent(user_agent).build()?; // Timeouts not supported on WASM

        Ok(Self {
            client,
            base_url,
            store,
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub const fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Absolute URL for an API path
    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Create a request builder carrying the current bearer credential.
    ///
    /// For calls made outside [`dispatch`](Self::dispatch); they are not
    /// covered by refresh handling.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let request = self.client.request(method, self.url(path));
        match self.store.access_token() {
            Some(token) => request.header(header::AUTHORIZATION, format!("Bearer {token}")),
            None => request,
        }
    }

    /// Send with whatever access token the session holds right now
    pub async fn dispatch(&self, request: &ApiRequest) -> Result<ApiResponse, ClientError> {
        let token = self.store.access_token();
        self.send(request, token.as_deref()).await
    }

    /// Send with an explicit credential, or none at all
    pub(crate) async fn send(
        &self,
        request: &ApiRequest,
        token: Option<&str>,
    ) -> Result<ApiResponse, ClientError> {
        let mut builder = self
            .client
            .request(request.method.clone(), self.url(&request.path));
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }

        debug!(
            method = %request.method,
            path = %request.path,
            authenticated = token.is_some(),
            retried = request.retried,
            "Dispatching request"
        );

        let response = builder.send().await?;
        let status = response.status();

        if status.is_success() {
            let body = response.text().await?;
            Ok(ApiResponse { status, body })
        } else {
            let body = response.text().await.unwrap_or_else(|_| status.to_string());
            debug!(status = status.as_u16(), path = %request.path, "Request failed");
            Err(ClientError::from_status(status, &body))
        }
    }
}
