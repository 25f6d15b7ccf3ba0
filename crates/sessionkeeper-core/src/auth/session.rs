use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};

use super::credentials::{CredentialRecord, CredentialStore, StoreKey};
use super::error::AuthError;
use super::expiry::{is_expired, parse_expiry};
use super::refresh::RefreshCoordinator;
use super::types::{AuthenticationRequest, AuthenticationResponse, AuthenticationResult};

/// The underlying authentication client that actually talks to the server.
///
/// [`AuthSession`] wraps these three operations with device tracking,
/// credential persistence and single-flight refresh.
#[async_trait]
pub trait BaseSession: Send + Sync {
    /// Send an authentication request to the remote endpoint.
    async fn authenticate(
        &self,
        request: AuthenticationRequest,
    ) -> Result<AuthenticationResponse, AuthError>;

    /// Re-validate the current authentication without deduplication.
    ///
    /// `device_id` is the stored device identifier, to be sent along with any
    /// request this issues.
    async fn reauthenticate(
        &self,
        force: bool,
        strategy: Option<&str>,
        device_id: Option<String>,
    ) -> Result<AuthenticationResponse, AuthError>;

    /// Forget the access token held by the base client.
    async fn remove_access_token(&self) -> Result<(), AuthError>;
}

struct SessionInner {
    base: Arc<dyn BaseSession>,
    store: Arc<dyn CredentialStore>,
    refresh: RefreshCoordinator,
}

/// Authentication session with transparent refresh-on-expiry.
///
/// Cheap to clone; clones share the store and the in-flight refresh.
#[derive(Clone)]
pub struct AuthSession {
    inner: Arc<SessionInner>,
}

impl AuthSession {
    pub fn new(base: Arc<dyn BaseSession>, store: Arc<dyn CredentialStore>) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                base,
                store,
                refresh: RefreshCoordinator::new(),
            }),
        }
    }

    /// Authenticate with `credentials`, or re-authenticate when none are given.
    pub async fn authenticate(
        &self,
        credentials: Option<AuthenticationRequest>,
    ) -> Result<AuthenticationResult, AuthError> {
        match credentials {
            Some(request) => self.inner.authenticate(request).await,
            None => self.reauthenticate(false, None).await,
        }
    }

    /// Ensure a valid authentication.
    ///
    /// When the stored token is expired and `force` is false, concurrent
    /// callers share a single `refreshToken` exchange. Otherwise the base
    /// session re-authenticates directly, with the stored device id.
    pub async fn reauthenticate(
        &self,
        force: bool,
        strategy: Option<&str>,
    ) -> Result<AuthenticationResult, AuthError> {
        if !force {
            // Expiry is checked under the refresh slot lock, so a caller never
            // starts a second refresh after the first one has settled
            let inner = Arc::clone(&self.inner);
            let refreshed = self
                .inner
                .refresh
                .run_or_join(|| self.is_expired(), move || async move { inner.refresh().await })
                .await?;
            if let Some(result) = refreshed {
                return Ok(result);
            }
        }

        let device_id = self.inner.store.get(StoreKey::DeviceId)?;
        debug!(force, strategy, has_device = device_id.is_some(), "Re-authenticating through base session");
        let response = self.inner.base.reauthenticate(force, strategy, device_id).await?;
        Ok(self.inner.persist(response))
    }

    /// Logout path: drop the access token, then the stored expiry and refresh
    /// token. The device identifier is kept.
    pub async fn remove_access_token(&self) -> Result<(), AuthError> {
        self.inner.base.remove_access_token().await?;
        self.inner.store.remove(StoreKey::Expiry)?;
        self.inner.store.remove(StoreKey::RefreshToken)?;
        info!("Access token removed");
        Ok(())
    }

    /// Whether the stored access token is expired right now.
    pub fn is_expired(&self) -> Result<bool, AuthError> {
        let raw = self.inner.store.get(StoreKey::Expiry)?;
        Ok(is_expired(Utc::now(), parse_expiry(raw.as_deref())))
    }

    pub fn is_refreshing(&self) -> bool {
        self.inner.refresh.is_pending()
    }

    /// Current persisted credential state.
    pub fn credentials(&self) -> Result<CredentialRecord, AuthError> {
        Ok(CredentialRecord::load(self.inner.store.as_ref())?)
    }
}

impl SessionInner {
    async fn authenticate(
        &self,
        request: AuthenticationRequest,
    ) -> Result<AuthenticationResult, AuthError> {
        let device_id = self.store.get(StoreKey::DeviceId)?;
        let request = request.with_device_id(device_id);
        debug!(strategy = %request.strategy, has_device = request.device_id.is_some(), "Authenticating");

        let response = self.base.authenticate(request).await?;
        Ok(self.persist(response))
    }

    async fn refresh(&self) -> Result<AuthenticationResult, AuthError> {
        let refresh_token = self
            .store
            .get(StoreKey::RefreshToken)?
            .ok_or_else(|| AuthError::Credential("No refresh token stored".to_string()))?;
        self.authenticate(AuthenticationRequest::refresh(&refresh_token))
            .await
    }

    /// Persist expiry, refresh token and device id if present, then strip the
    /// housekeeping fields. Write failures are logged and do not fail the call.
    fn persist(&self, response: AuthenticationResponse) -> AuthenticationResult {
        if let Some(exp) = response.exp() {
            self.write(StoreKey::Expiry, &exp.to_string());
        }
        if let Some(token) = response.refresh_token.as_deref().filter(|t| !t.is_empty()) {
            self.write(StoreKey::RefreshToken, token);
        }
        if let Some(device_id) = response.device_id.as_deref().filter(|d| !d.is_empty()) {
            self.write(StoreKey::DeviceId, device_id);
        }
        response.into_result()
    }

    fn write(&self, key: StoreKey, value: &str) {
        if let Err(e) = self.store.set(key, value) {
            warn!(key = key.as_str(), error = %e, "Failed to persist credential");
        }
    }
}
