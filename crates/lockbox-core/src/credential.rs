use keyring::Entry;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Result, VaultError};

/// Secret storage keyed by (service, user).
pub trait CredentialStore: Send + Sync {
    fn get(&self, service: &str, user: &str) -> Result<Option<String>>;
    fn set(&self, service: &str, user: &str, value: &str) -> Result<()>;
    /// Deleting an absent entry is a no-op.
    fn delete(&self, service: &str, user: &str) -> Result<()>;
}

/// OS credential store (Credential Manager, Keychain, Secret Service).
#[derive(Debug, Default, Clone, Copy)]
pub struct KeyringStore;

impl KeyringStore {
    fn entry(service: &str, user: &str) -> Result<Entry> {
        Entry::new(service, user)
            .map_err(|e| VaultError::CredentialStore(format!("keyring init: {e}")))
    }
}

impl CredentialStore for KeyringStore {
    fn get(&self, service: &str, user: &str) -> Result<Option<String>> {
        match Self::entry(service, user)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(VaultError::CredentialStore(format!("load credential: {e}"))),
        }
    }

    fn set(&self, service: &str, user: &str, value: &str) -> Result<()> {
        Self::entry(service, user)?
            .set_password(value)
            .map_err(|e| VaultError::CredentialStore(format!("store credential: {e}")))
    }

    fn delete(&self, service: &str, user: &str) -> Result<()> {
        match Self::entry(service, user)?.delete_password() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(VaultError::CredentialStore(format!("delete credential: {e}"))),
        }
    }
}

/// In-process store. Clones share the same map, which lets a test "restart"
/// the application against the same credentials.
#[derive(Debug, Default, Clone)]
pub struct MemoryCredentialStore {
    entries: Arc<Mutex<HashMap<(String, String), String>>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self, service: &str, user: &str) -> Result<Option<String>> {
        Ok(self
            .entries
            .lock()
            .get(&(service.to_string(), user.to_string()))
            .cloned())
    }

    fn set(&self, service: &str, user: &str, value: &str) -> Result<()> {
        self.entries
            .lock()
            .insert((service.to_string(), user.to_string()), value.to_string());
        Ok(())
    }

    fn delete(&self, service: &str, user: &str) -> Result<()> {
        self.entries
            .lock()
            .remove(&(service.to_string(), user.to_string()));
        Ok(())
    }
}
