use thiserror::Error;

/// Failures of the persistent credential store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Credential store unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to read '{key}' from credential store: {message}")]
    Read { key: &'static str, message: String },

    #[error("Failed to write '{key}' to credential store: {message}")]
    Write { key: &'static str, message: String },
}

/// Errors surfaced by authentication operations.
///
/// `Clone` because a single refresh outcome is handed to every caller that
/// joined the in-flight operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Authentication rejected: {0}")]
    Credential(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timed out before the server responded")]
    Timeout,

    #[error("Invalid authentication response: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error("Refresh task interrupted: {0}")]
    Interrupted(String),
}

impl AuthError {
    /// True when the remote party rejected the credentials themselves.
    pub fn is_credential(&self) -> bool {
        matches!(self, AuthError::Credential(_))
    }
}
