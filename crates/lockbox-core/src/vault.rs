//! Vault file: a flat JSON object whose keys and values are each an envelope
//! token under the DEK.
//!
//! Key tokens are randomized, so finding an entry means decrypting the whole
//! map, and every mutation re-encrypts and rewrites the whole file. Encrypting
//! keys deterministically would make lookups cheap but would reveal when two
//! vaults (or two versions of one) share an entry name.

use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::backup::read_backup_vault;
use crate::config::CorruptEntryPolicy;
use crate::crypto::{decrypt_str, encrypt_str, SymmetricKey};
use crate::error::{Result, VaultError};
use crate::paths::StoragePaths;
use crate::storage::{read_optional, write_atomic};

pub type Entries = HashMap<String, String>;

pub struct VaultStore {
    paths: StoragePaths,
    policy: CorruptEntryPolicy,
}

impl VaultStore {
    pub fn new(paths: StoragePaths, policy: CorruptEntryPolicy) -> Self {
        Self { paths, policy }
    }

    pub fn ensure_vault_file_exists(&self) -> Result<()> {
        let vault_path = self.paths.vault_file();
        if vault_path.is_file() {
            return Ok(());
        }
        if let Some(backup) = read_backup_vault(&self.paths)? {
            write_atomic(&vault_path, &backup)?;
            info!(path = %vault_path.display(), "restored vault file from backup");
        } else {
            write_atomic(&vault_path, b"{}")?;
            info!(path = %vault_path.display(), "created empty vault file");
        }
        Ok(())
    }

    /// Missing or zero-length vault files read as empty.
    pub fn read_all(&self, dek: &SymmetricKey) -> Result<Entries> {
        let sealed = self.read_sealed()?;
        let mut entries = Entries::with_capacity(sealed.len());
        let mut skipped = 0usize;
        for (sealed_key, sealed_value) in &sealed {
            match open_entry(sealed_key, sealed_value, dek) {
                Ok((key, value)) => {
                    entries.insert(key, value);
                }
                Err(e) => match self.policy {
                    CorruptEntryPolicy::Reject => {
                        return Err(VaultError::VaultCorrupted(format!(
                            "entry failed to decrypt: {e}"
                        )))
                    }
                    CorruptEntryPolicy::Skip => skipped += 1,
                },
            }
        }
        if skipped > 0 {
            warn!(skipped, "dropped vault entries that failed authentication");
        }
        debug!(count = entries.len(), "vault read");
        Ok(entries)
    }

    /// Replaces the vault file with `entries`, each key and value freshly
    /// encrypted.
    pub fn write_all(&self, dek: &SymmetricKey, entries: &Entries) -> Result<()> {
        let mut sealed = HashMap::with_capacity(entries.len());
        for (key, value) in entries {
            sealed.insert(encrypt_str(key, dek)?, encrypt_str(value, dek)?);
        }
        let json = serde_json::to_vec_pretty(&sealed)?;
        write_atomic(&self.paths.vault_file(), &json)?;
        debug!(count = entries.len(), "vault written");
        Ok(())
    }

    fn read_sealed(&self) -> Result<HashMap<String, String>> {
        match read_optional(&self.paths.vault_file())? {
            Some(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(HashMap::new()),
            Some(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| VaultError::VaultCorrupted(format!("vault file is not a JSON object of strings: {e}"))),
            None => Ok(HashMap::new()),
        }
    }
}

fn open_entry(sealed_key: &str, sealed_value: &str, dek: &SymmetricKey) -> Result<(String, String)> {
    Ok((decrypt_str(sealed_key, dek)?, decrypt_str(sealed_value, dek)?))
}
