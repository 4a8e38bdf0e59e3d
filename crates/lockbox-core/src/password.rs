//! App-password gate.
//!
//! The credential store holds `salt ++ hex(PBKDF2-HMAC-SHA256(password, salt))`.
//! It only decides whether the shell may proceed; it has no relation to the
//! DEK or KEK.

use pbkdf2::pbkdf2_hmac;
use rand::distributions::{Alphanumeric, DistString};
use rand::rngs::OsRng;
use sha2::Sha256;
use std::sync::Arc;
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::config::LockboxConfig;
use crate::credential::CredentialStore;
use crate::error::{Result, VaultError};

pub const SALT_LEN: usize = 20;
const DIGEST_LEN: usize = 32;

pub struct PasswordGate {
    store: Arc<dyn CredentialStore>,
    service: String,
    account: String,
    iterations: u32,
    min_length: usize,
}

impl PasswordGate {
    pub fn new(store: Arc<dyn CredentialStore>, config: &LockboxConfig) -> Self {
        Self {
            store,
            service: config.credential_service.clone(),
            account: config.credential_account.clone(),
            iterations: config.pbkdf2_iterations,
            min_length: config.min_password_length,
        }
    }

    pub fn app_password_exists(&self) -> Result<bool> {
        Ok(self
            .store
            .get(&self.service, &self.account)?
            .is_some_and(|v| !v.is_empty()))
    }

    /// `false` for an empty password; otherwise replaces any stored entry.
    pub fn set_app_password(&self, password: &str) -> Result<bool> {
        if password.is_empty() {
            return Ok(false);
        }
        let salt = Alphanumeric.sample_string(&mut OsRng, SALT_LEN);
        let digest = self.hash(password, &salt);
        self.store.delete(&self.service, &self.account)?;
        let record = Zeroizing::new(format!("{salt}{}", digest.as_str()));
        self.store.set(&self.service, &self.account, &record)?;
        info!(service = %self.service, "app password set");
        Ok(true)
    }

    /// `false` when no password is stored or the stored entry is malformed.
    pub fn verify_app_password(&self, password: &str) -> Result<bool> {
        let Some(record) = self.store.get(&self.service, &self.account)? else {
            debug!("no app password stored");
            return Ok(false);
        };
        let record = Zeroizing::new(record);
        if record.len() != SALT_LEN + DIGEST_LEN * 2 || !record.is_char_boundary(SALT_LEN) {
            debug!("stored app password entry is malformed");
            return Ok(false);
        }
        let (salt, stored) = record.split_at(SALT_LEN);
        let candidate = self.hash(password, salt);
        Ok(constant_time_eq(candidate.as_bytes(), stored.as_bytes()))
    }

    pub fn delete(&self) -> Result<()> {
        self.store.delete(&self.service, &self.account)
    }

    /// Checks a new password and its confirmation before `set_app_password`.
    pub fn validate_new_password(&self, password: &str, confirm: &str) -> Result<()> {
        if password.is_empty() || confirm.is_empty() {
            return Err(VaultError::Validation("please fill in both password fields".into()));
        }
        if password != confirm {
            return Err(VaultError::Validation("passwords do not match".into()));
        }
        if password.chars().count() < self.min_length {
            return Err(VaultError::Validation(format!(
                "password must be at least {} characters",
                self.min_length
            )));
        }
        Ok(())
    }

    fn hash(&self, password: &str, salt: &str) -> Zeroizing<String> {
        let mut digest = Zeroizing::new([0u8; DIGEST_LEN]);
        pbkdf2_hmac::<Sha256>(password.as_bytes(), salt.as_bytes(), self.iterations, &mut digest[..]);
        Zeroizing::new(hex::encode(&digest[..]))
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
