//! Client facade bundling the authentication session and connection monitor.

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::api::HttpBaseSession;
use crate::auth::{AuthError, AuthSession, AuthenticationRequest, AuthenticationResult};
use crate::config::Config;
use crate::connection::{ConnectionEvent, ConnectionMonitor, ConnectionStatus, LoggingObserver};

/// Path prefix under which remote services are exposed.
const SERVICE_PREFIX: &str = "api/";

/// Handle to a remote service, addressed by its namespaced path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceHandle {
    name: String,
    path: String,
}

impl ServiceHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

pub struct SessionClient {
    session: AuthSession,
    connection: ConnectionMonitor,
}

impl SessionClient {
    pub fn new(session: AuthSession, connection: ConnectionMonitor) -> Self {
        Self { session, connection }
    }

    /// Build an HTTP-backed client from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let store = config.open_store()?;
        let base = HttpBaseSession::new(&config.server_url, config.request_timeout(), store.clone())?;
        info!(server = %config.server_url, backend = ?config.store, "Session client configured");

        Ok(Self::new(
            AuthSession::new(Arc::new(base), store),
            ConnectionMonitor::new(Arc::new(LoggingObserver)),
        ))
    }

    pub fn session(&self) -> &AuthSession {
        &self.session
    }

    pub fn connection(&self) -> &ConnectionMonitor {
        &self.connection
    }

    pub async fn authenticate(
        &self,
        credentials: Option<AuthenticationRequest>,
    ) -> Result<AuthenticationResult, AuthError> {
        self.session.authenticate(credentials).await
    }

    pub async fn reauthenticate(&self) -> Result<AuthenticationResult, AuthError> {
        self.session.reauthenticate(false, None).await
    }

    pub async fn logout(&self) -> Result<(), AuthError> {
        self.session.remove_access_token().await
    }

    pub fn service(&self, name: &str) -> ServiceHandle {
        ServiceHandle {
            name: name.to_string(),
            path: format!("{}{}", SERVICE_PREFIX, name),
        }
    }

    /// Register a listener for a raw transport event.
    pub fn add_listener(&self, event: &str, action: impl Fn() + Send + Sync + 'static) {
        self.connection.on(event, action);
    }

    /// Entry point for the transport to report lifecycle events.
    pub fn handle_connection_event(&self, event: ConnectionEvent) {
        self.connection.dispatch(event);
    }

    pub fn status(&self) -> ConnectionStatus {
        self.connection.status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::testing::{response, FakeBase};
    use crate::auth::{MemoryStore, StoreKey};
    use crate::auth::CredentialStore;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn client() -> (SessionClient, Arc<FakeBase>, Arc<MemoryStore>) {
        let base = Arc::new(FakeBase::new());
        let store = Arc::new(MemoryStore::new());
        let session = AuthSession::new(base.clone(), store.clone());
        (SessionClient::new(session, ConnectionMonitor::default()), base, store)
    }

    #[test]
    fn test_service_is_namespaced() {
        let (client, _, _) = client();
        let service = client.service("messages");
        assert_eq!(service.name(), "messages");
        assert_eq!(service.path(), "api/messages");
    }

    #[tokio::test]
    async fn test_login_then_logout() {
        let (client, base, store) = client();
        base.respond(Ok(response(Some(1_900_000_000), Some("r-1"), Some("dev-1"))));

        client
            .authenticate(Some(AuthenticationRequest::local("a@b.c", "pw")))
            .await
            .unwrap();
        assert_eq!(store.get(StoreKey::RefreshToken).unwrap().as_deref(), Some("r-1"));

        client.logout().await.unwrap();
        assert_eq!(store.get(StoreKey::RefreshToken).unwrap(), None);
        assert_eq!(store.get(StoreKey::DeviceId).unwrap().as_deref(), Some("dev-1"));
    }

    #[tokio::test]
    async fn test_reauthenticate_uses_base_when_valid() {
        let (client, base, _) = client();
        client.reauthenticate().await.unwrap();
        assert_eq!(base.reauthenticate_calls(), vec![(false, None)]);
    }

    #[test]
    fn test_listener_and_status_passthrough() {
        let (client, _, _) = client();
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        client.add_listener("reconnect", move || flag.store(true, Ordering::SeqCst));

        assert_eq!(client.status(), ConnectionStatus::Connecting);
        client.handle_connection_event(ConnectionEvent::Reconnected);

        assert!(fired.load(Ordering::SeqCst));
        assert!(client.status().is_connected());
    }
}
