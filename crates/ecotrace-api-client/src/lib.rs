//! Shared HTTP client for the EcoTrace API.
//!
//! Provides a minimal client with optional bearer auth, generic GET/POST
//! helpers that fold every failure into [`ApiError`], and the domain methods
//! (auth, batch resolution, transports, public batch summary). The CLI and
//! the intake workflow use this client directly.

pub mod api;

use std::time::Duration;

use anyhow::{Context, Result};
use ecotrace_core::{ApiError, ClientConfig};
use ecotrace_core::models::AuthContext;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;

/// Authentication strategy for the API.
#[derive(Clone, Default)]
pub enum Auth {
    /// Public endpoints only (login, register, public batch page).
    #[default]
    Anonymous,
    /// `Authorization: Bearer {token}`
    Bearer(String),
}

impl std::fmt::Debug for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Auth::Anonymous => f.write_str("Anonymous"),
            Auth::Bearer(_) => f.write_str("Bearer(<redacted>)"),
        }
    }
}

impl From<&AuthContext> for Auth {
    fn from(ctx: &AuthContext) -> Self {
        Auth::Bearer(ctx.token().to_string())
    }
}

/// HTTP client for the EcoTrace API.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    auth: Auth,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration, auth: Auth) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth,
        })
    }

    /// Create a client from configuration, authenticated when a token is set.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let auth = config
            .token
            .clone()
            .map(Auth::Bearer)
            .unwrap_or_default();
        Self::new(
            config.api_url.clone(),
            Duration::from_secs(config.http_timeout_secs),
            auth,
        )
    }

    /// Same connection pool, different credentials.
    pub fn with_auth(&self, auth: Auth) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            auth,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.auth, Auth::Bearer(_))
    }

    fn apply_auth(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth {
            Auth::Bearer(token) => request.bearer_auth(token),
            Auth::Anonymous => request,
        }
    }

    /// GET request with optional query parameters. Deserializes JSON response.
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let mut request = self.apply_auth(self.client.get(self.build_url(path)));
        if !query.is_empty() {
            request = request.query(query);
        }
        self.send(request).await
    }

    /// POST JSON body and deserialize response.
    pub async fn post_json<T: DeserializeOwned, B: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let request = self.apply_auth(self.client.post(self.build_url(path)).json(body));
        self.send(request).await
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = request.send().await.map_err(|e| {
            tracing::warn!(error = %e, "API request could not be sent");
            ApiError::network(format!("Failed to send request: {}", e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = ApiError::from_response(status.as_u16(), &body);
            tracing::debug!(
                status = status.as_u16(),
                kind = %err.kind,
                detail = err.detail.as_deref().unwrap_or(""),
                "API request failed"
            );
            return Err(err);
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ApiError::network(format!("Failed to read response body: {}", e)))?;
        serde_json::from_slice(&bytes).map_err(|e| {
            ApiError::invalid_response(format!("Failed to parse response as JSON: {}", e))
        })
    }
}
