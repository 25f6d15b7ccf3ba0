//! Authentication module for managing sessions and persisted credentials.
//!
//! This module provides:
//! - `AuthSession`: wraps a `BaseSession` with device tracking, credential
//!   persistence and single-flight refresh of expired tokens
//! - `CredentialStore`: durable key/value storage (file, keyring, memory)
//! - `is_expired`: expiry evaluation with a one-second safety margin
//!
//! Stored credentials survive restarts; the device identifier also survives logout.

pub mod credentials;
pub mod error;
pub mod expiry;
pub mod refresh;
pub mod session;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use credentials::{CredentialRecord, CredentialStore, FileStore, KeyringStore, MemoryStore, StoreKey};
pub use error::{AuthError, StoreError};
pub use expiry::{is_expired, parse_expiry};
pub use refresh::RefreshCoordinator;
pub use session::{AuthSession, BaseSession};
pub use types::{AuthenticationRequest, AuthenticationResponse, AuthenticationResult};
