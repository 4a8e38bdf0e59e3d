//! DEK lifecycle: generated once, stored only as `Encrypt(DEK, KEK)`.

use std::sync::Arc;
use tracing::{debug, info};

use crate::backup::read_backup_key;
use crate::crypto::{self, SymmetricKey};
use crate::device::DeviceIdSource;
use crate::error::{Result, VaultError};
use crate::kek::derive_kek;
use crate::paths::StoragePaths;
use crate::storage::{read_optional, write_private};

pub struct KeyStore {
    paths: StoragePaths,
    device: Arc<dyn DeviceIdSource>,
}

impl KeyStore {
    pub fn new(paths: StoragePaths, device: Arc<dyn DeviceIdSource>) -> Self {
        Self { paths, device }
    }

    /// Idempotent. Restores from the backup when one exists, otherwise
    /// generates a fresh DEK.
    ///
    /// A backup that does not decrypt under the current KEK is an error rather
    /// than a reason to generate a new key, which would orphan the backed-up
    /// vault.
    pub fn ensure_key_file_exists(&self) -> Result<()> {
        let key_path = self.paths.key_file();
        if key_path.is_file() {
            return Ok(());
        }
        if self.recover_from_backup()? {
            return Ok(());
        }

        let dek = SymmetricKey::generate();
        let kek = derive_kek(self.device.as_ref());
        let token = crypto::encrypt(dek.to_encoded().as_bytes(), &kek)?;
        write_private(&key_path, &token)?;
        info!(path = %key_path.display(), "generated new master key");
        Ok(())
    }

    pub fn load_dek(&self) -> Result<SymmetricKey> {
        let key_path = self.paths.key_file();
        let token = match read_optional(&key_path)? {
            Some(token) => token,
            None => {
                if !self.recover_from_backup()? {
                    return Err(VaultError::KeyUnavailable);
                }
                std::fs::read(&key_path)?
            }
        };
        self.unwrap_dek(&token)
    }

    fn unwrap_dek(&self, token: &[u8]) -> Result<SymmetricKey> {
        let kek = derive_kek(self.device.as_ref());
        let encoded = crypto::decrypt(token, &kek).map_err(|e| match e {
            VaultError::AuthenticationFailed => VaultError::DecryptionFailed,
            other => other,
        })?;
        if let Ok(created) = crypto::issued_at(token) {
            debug!(created = %created, "master key unwrapped");
        }
        SymmetricKey::from_encoded(&encoded)
    }

    /// `Ok(false)` when there is no backup. The primary is only rewritten
    /// once the backup is known to decrypt here.
    fn recover_from_backup(&self) -> Result<bool> {
        let Some(backup) = read_backup_key(&self.paths)? else {
            debug!("no backup key file");
            return Ok(false);
        };
        self.unwrap_dek(&backup)?;
        let key_path = self.paths.key_file();
        write_private(&key_path, &backup)?;
        info!(path = %key_path.display(), "restored key file from backup");
        Ok(true)
    }
}
