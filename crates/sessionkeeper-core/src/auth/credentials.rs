//! Persistent credential storage.
//!
//! Every backend is a plain key/value store. Values are re-read on every
//! `get` so the session always evaluates the live stored expiry.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use keyring::Entry;
use tracing::debug;

use super::error::StoreError;

/// Keychain service name used by [`KeyringStore::default`].
const SERVICE_NAME: &str = "sessionkeeper";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StoreKey {
    /// Access-token expiry in epoch seconds.
    Expiry,
    RefreshToken,
    DeviceId,
    /// Raw access token, owned by the HTTP base session.
    AccessToken,
}

impl StoreKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreKey::Expiry => "exp",
            StoreKey::RefreshToken => "refresh-token",
            StoreKey::DeviceId => "device-id",
            StoreKey::AccessToken => "access-token",
        }
    }
}

/// Durable key/value storage shared by the authentication session.
pub trait CredentialStore: Send + Sync {
    fn get(&self, key: StoreKey) -> Result<Option<String>, StoreError>;
    fn set(&self, key: StoreKey, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: StoreKey) -> Result<(), StoreError>;
}

/// Snapshot of what the session has persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialRecord {
    /// Raw stored expiry; see [`super::expiry::parse_expiry`].
    pub exp: Option<String>,
    pub refresh_token: Option<String>,
    pub device_id: Option<String>,
}

impl CredentialRecord {
    pub fn load(store: &dyn CredentialStore) -> Result<Self, StoreError> {
        Ok(Self {
            exp: store.get(StoreKey::Expiry)?,
            refresh_token: store.get(StoreKey::RefreshToken)?,
            device_id: store.get(StoreKey::DeviceId)?,
        })
    }
}

// ============================================================================
// In-memory store
// ============================================================================

/// Volatile store, mainly for tests. Can be told to reject writes.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<StoreKey, String>>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `set` fail with [`StoreError::Write`].
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl CredentialStore for MemoryStore {
    fn get(&self, key: StoreKey) -> Result<Option<String>, StoreError> {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(values.get(&key).cloned())
    }

    fn set(&self, key: StoreKey, value: &str) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Write {
                key: key.as_str(),
                message: "store is read-only".to_string(),
            });
        }
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.insert(key, value.to_string());
        Ok(())
    }

    fn remove(&self, key: StoreKey) -> Result<(), StoreError> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.remove(&key);
        Ok(())
    }
}

// ============================================================================
// JSON file store
// ============================================================================

/// Stores all keys in a single JSON object file.
pub struct FileStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self, key: StoreKey) -> Result<BTreeMap<String, String>, StoreError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = std::fs::read_to_string(&self.path).map_err(|e| StoreError::Read {
            key: key.as_str(),
            message: e.to_string(),
        })?;
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&contents).map_err(|e| StoreError::Read {
            key: key.as_str(),
            message: format!("corrupt credential file: {}", e),
        })
    }

    fn write_map(&self, key: StoreKey, map: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let write_err = |message: String| StoreError::Write {
            key: key.as_str(),
            message,
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| write_err(e.to_string()))?;
        }
        let contents = serde_json::to_string_pretty(map).map_err(|e| write_err(e.to_string()))?;
        std::fs::write(&self.path, contents).map_err(|e| write_err(e.to_string()))?;
        Ok(())
    }

    fn update(
        &self,
        key: StoreKey,
        apply: impl FnOnce(&mut BTreeMap<String, String>),
    ) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut map = self.read_map(key)?;
        apply(&mut map);
        self.write_map(key, &map)
    }
}

impl CredentialStore for FileStore {
    fn get(&self, key: StoreKey) -> Result<Option<String>, StoreError> {
        Ok(self.read_map(key)?.remove(key.as_str()))
    }

    fn set(&self, key: StoreKey, value: &str) -> Result<(), StoreError> {
        self.update(key, |map| {
            map.insert(key.as_str().to_string(), value.to_string());
        })?;
        debug!(key = key.as_str(), path = %self.path.display(), "Stored credential");
        Ok(())
    }

    fn remove(&self, key: StoreKey) -> Result<(), StoreError> {
        if !self.path.exists() {
            return Ok(());
        }
        self.update(key, |map| {
            map.remove(key.as_str());
        })
    }
}

// ============================================================================
// OS keychain store
// ============================================================================

/// One keychain entry per key, under a fixed service name.
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: StoreKey) -> Result<Entry, StoreError> {
        Entry::new(&self.service, key.as_str())
            .map_err(|e| StoreError::Unavailable(format!("Failed to create keyring entry: {}", e)))
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new(SERVICE_NAME)
    }
}

impl CredentialStore for KeyringStore {
    fn get(&self, key: StoreKey) -> Result<Option<String>, StoreError> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(StoreError::Read {
                key: key.as_str(),
                message: e.to_string(),
            }),
        }
    }

    fn set(&self, key: StoreKey, value: &str) -> Result<(), StoreError> {
        self.entry(key)?
            .set_password(value)
            .map_err(|e| StoreError::Write {
                key: key.as_str(),
                message: e.to_string(),
            })
    }

    fn remove(&self, key: StoreKey) -> Result<(), StoreError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(StoreError::Write {
                key: key.as_str(),
                message: e.to_string(),
            }),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
