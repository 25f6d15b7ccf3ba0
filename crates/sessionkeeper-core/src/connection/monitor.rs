use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::watch;
use tracing::debug;

use super::{ConnectionEvent, ConnectionObserver, ConnectionStatus, NoopObserver};

type Listener = Arc<dyn Fn() + Send + Sync>;

/// Dispatches transport lifecycle events and publishes the connection status.
pub struct ConnectionMonitor {
    observer: Arc<dyn ConnectionObserver>,
    status: watch::Sender<ConnectionStatus>,
    listeners: RwLock<HashMap<String, Vec<Listener>>>,
}

impl ConnectionMonitor {
    /// Start in [`ConnectionStatus::Connecting`].
    pub fn new(observer: Arc<dyn ConnectionObserver>) -> Self {
        let (status, _) = watch::channel(ConnectionStatus::Connecting);
        Self {
            observer,
            status,
            listeners: RwLock::new(HashMap::new()),
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status.borrow().clone()
    }

    /// Watch status changes (e.g. to show or hide a "reconnecting" banner).
    pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    /// Register `action` for the transport event called `event`.
    pub fn on(&self, event: impl Into<String>, action: impl Fn() + Send + Sync + 'static) {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        listeners.entry(event.into()).or_default().push(Arc::new(action));
    }

    /// Handle one event from the transport.
    pub fn dispatch(&self, event: ConnectionEvent) {
        debug!(event = event.name(), "Connection event");
        match &event {
            ConnectionEvent::Connected => {
                self.status.send_replace(ConnectionStatus::Connected);
                self.observer.on_connect();
            }
            ConnectionEvent::Disconnected => {
                self.status.send_replace(ConnectionStatus::Disconnected);
                self.observer.on_disconnect();
            }
            ConnectionEvent::Reconnecting { attempt, delay } => {
                self.status.send_replace(ConnectionStatus::Reconnecting {
                    attempt: *attempt,
                    delay: *delay,
                });
                self.observer.on_reconnecting(*attempt, *delay);
            }
            ConnectionEvent::Reconnected => {
                self.status.send_replace(ConnectionStatus::Connected);
                self.observer.on_reconnect();
            }
            ConnectionEvent::Other(_) => {}
        }

        // Listeners run outside the lock so they may register more listeners
        let listeners: Vec<Listener> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(event.name())
            .cloned()
            .unwrap_or_default();
        for listener in listeners {
            listener();
        }
    }
}

impl Default for ConnectionMonitor {
    fn default() -> Self {
        Self::new(Arc::new(NoopObserver))
    }
}
