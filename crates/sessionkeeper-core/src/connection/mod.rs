//! Connection lifecycle visibility.
//!
//! The transport reports [`ConnectionEvent`]s; the [`ConnectionMonitor`] turns
//! them into a [`ConnectionStatus`] the rest of the application can watch,
//! calls the [`ConnectionObserver`], and fires any listeners registered by
//! event name.

pub mod monitor;

use std::time::Duration;

use tracing::info;

pub use monitor::ConnectionMonitor;

/// Notice shown while the first connection is being made.
pub const CONNECTING_NOTICE: &str = "Connecting ...";

/// Notice shown while the transport is trying to get the connection back.
pub const RECONNECTING_NOTICE: &str = "Disconnected ... trying to reconnect.";

/// Lifecycle events reported by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Connected,
    Disconnected,
    Reconnecting { attempt: u32, delay: Duration },
    Reconnected,
    /// Any other transport event, forwarded to named listeners only.
    Other(String),
}

impl ConnectionEvent {
    /// Transport-level event name, as used for listener registration.
    pub fn name(&self) -> &str {
        match self {
            ConnectionEvent::Connected => "connect",
            ConnectionEvent::Disconnected => "disconnect",
            ConnectionEvent::Reconnecting { .. } => "reconnecting",
            ConnectionEvent::Reconnected => "reconnect",
            ConnectionEvent::Other(name) => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Reconnecting { attempt: u32, delay: Duration },
    Disconnected,
}

impl ConnectionStatus {
    /// User-facing notice to display, or `None` when the connection is up.
    pub fn notice(&self) -> Option<&'static str> {
        match self {
            ConnectionStatus::Connecting => Some(CONNECTING_NOTICE),
            ConnectionStatus::Connected => None,
            ConnectionStatus::Reconnecting { .. } | ConnectionStatus::Disconnected => {
                Some(RECONNECTING_NOTICE)
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionStatus::Connected)
    }
}

/// Hooks invoked at connection lifecycle points. All default to no-ops.
pub trait ConnectionObserver: Send + Sync {
    fn on_connect(&self) {}

    fn on_disconnect(&self) {}

    fn on_reconnecting(&self, _attempt: u32, _delay: Duration) {}

    fn on_reconnect(&self) {}
}

pub struct NoopObserver;

impl ConnectionObserver for NoopObserver {}

/// Observer that only logs.
pub struct LoggingObserver;

impl ConnectionObserver for LoggingObserver {
    fn on_connect(&self) {
        info!("Connected");
    }

    fn on_disconnect(&self) {
        info!("Disconnected");
    }

    fn on_reconnecting(&self, attempt: u32, delay: Duration) {
        info!(attempt, delay_ms = delay.as_millis() as u64, "Reconnecting");
    }

    fn on_reconnect(&self) {
        info!("Reconnected");
    }
}
