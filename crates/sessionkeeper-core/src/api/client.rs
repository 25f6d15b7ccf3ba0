//! HTTP base session for the remote authentication endpoint.
//!
//! This is the plain client that [`crate::auth::AuthSession`] wraps: it posts
//! authentication requests, keeps the access token, and re-validates it on
//! demand. It knows nothing about refresh tokens, and only forwards the device
//! identifier it is handed.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{header, Client};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::auth::types::JWT_STRATEGY;
use crate::auth::{
    AuthError, AuthenticationRequest, AuthenticationResponse, BaseSession, CredentialStore,
    StoreKey,
};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Path of the authentication service, relative to the server URL.
const AUTHENTICATION_PATH: &str = "authentication";

/// Default request timeout in seconds.
/// Bounds how long a refresh may stay in flight before it settles as a failure.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Authentication client speaking JSON over HTTP.
pub struct HttpBaseSession {
    client: Client,
    endpoint: String,
    store: Arc<dyn CredentialStore>,
    // Last successful response, returned by non-forced reauthenticate
    current: RwLock<Option<AuthenticationResponse>>,
}

impl HttpBaseSession {
    pub fn new(server_url: &str, timeout: Duration, store: Arc<dyn CredentialStore>) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            endpoint: format!("{}/{}", server_url.trim_end_matches('/'), AUTHENTICATION_PATH),
            store,
            current: RwLock::new(None),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn post(&self, request: &AuthenticationRequest) -> Result<AuthenticationResponse, ApiError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(header::ACCEPT, "application/json")
            .json(request)
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }

    async fn forget(&self) -> Result<(), AuthError> {
        *self.current.write().await = None;
        self.store.remove(StoreKey::AccessToken)?;
        Ok(())
    }
}

#[async_trait]
impl BaseSession for HttpBaseSession {
    async fn authenticate(
        &self,
        request: AuthenticationRequest,
    ) -> Result<AuthenticationResponse, AuthError> {
        debug!(endpoint = %self.endpoint, strategy = %request.strategy, "Sending authentication request");
        let response = self.post(&request).await?;

        if let Some(token) = response.access_token() {
            if let Err(e) = self.store.set(StoreKey::AccessToken, token) {
                warn!(error = %e, "Failed to persist access token");
            }
        }
        *self.current.write().await = Some(response.clone());
        Ok(response)
    }

    async fn reauthenticate(
        &self,
        force: bool,
        strategy: Option<&str>,
        device_id: Option<String>,
    ) -> Result<AuthenticationResponse, AuthError> {
        if !force {
            if let Some(current) = self.current.read().await.clone() {
                return Ok(current);
            }
        }

        let access_token = self
            .store
            .get(StoreKey::AccessToken)?
            .ok_or_else(|| AuthError::Credential("No access token found in storage".to_string()))?;
        let request =
            AuthenticationRequest::access_token(strategy.unwrap_or(JWT_STRATEGY), &access_token)
                .with_device_id(device_id);

        let result = self.authenticate(request).await;
        if let Err(AuthError::Credential(reason)) = &result {
            // A rejected token is useless; drop it so the next attempt starts clean
            debug!(reason = %reason, "Stored access token rejected");
            if let Err(e) = self.forget().await {
                warn!(error = %e, "Failed to remove rejected access token");
            }
        }
        result
    }

    async fn remove_access_token(&self) -> Result<(), AuthError> {
        self.forget().await
    }
}

// ============================================================================
// Tests
// ============================================================================
