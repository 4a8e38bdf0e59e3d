use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::error::{Result, VaultError};
use crate::storage::read_optional;

pub const DEFAULT_CREDENTIAL_SERVICE: &str = "Lockbox";
pub const DEFAULT_CREDENTIAL_ACCOUNT: &str = "lockbox";
pub const DEFAULT_PBKDF2_ITERATIONS: u32 = 100_000;

/// What `read_all` does with an entry that fails authentication.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CorruptEntryPolicy {
    /// Fail the whole read.
    #[default]
    Reject,
    /// Drop the entry and keep going.
    Skip,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LockboxConfig {
    pub credential_service: String,
    pub credential_account: String,
    pub pbkdf2_iterations: u32,
    pub min_password_length: usize,
    pub idle_timeout_secs: u64,
    pub corrupt_entries: CorruptEntryPolicy,
}

impl Default for LockboxConfig {
    fn default() -> Self {
        Self {
            credential_service: DEFAULT_CREDENTIAL_SERVICE.into(),
            credential_account: DEFAULT_CREDENTIAL_ACCOUNT.into(),
            pbkdf2_iterations: DEFAULT_PBKDF2_ITERATIONS,
            min_password_length: 8,
            idle_timeout_secs: 300,
            corrupt_entries: CorruptEntryPolicy::Reject,
        }
    }
}

impl LockboxConfig {
    /// Defaults when the file is absent.
    pub fn load(path: &Path) -> Result<Self> {
        let config = match read_optional(path)? {
            Some(bytes) => {
                debug!(path = %path.display(), "loading config");
                serde_json::from_slice(&bytes)
                    .map_err(|e| VaultError::Config(format!("{}: {e}", path.display())))?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.pbkdf2_iterations == 0 {
            return Err(VaultError::Config("pbkdf2_iterations must be positive".into()));
        }
        if self.credential_service.is_empty() || self.credential_account.is_empty() {
            return Err(VaultError::Config("credential service and account must be set".into()));
        }
        Ok(())
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}
