//! Facade the UI shell calls into.

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{info, warn};

use crate::backup::{self, SyncReport};
use crate::config::LockboxConfig;
use crate::credential::{CredentialStore, KeyringStore};
use crate::crypto::SymmetricKey;
use crate::device::{DeviceIdSource, HardwareDeviceId};
use crate::error::Result;
use crate::master_key::KeyStore;
use crate::password::PasswordGate;
use crate::paths::StoragePaths;
use crate::storage::{cleanup_staging, remove_if_exists};
use crate::vault::{Entries, VaultStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupState {
    /// No app password: the installation was reset and one must be set.
    NeedsPassword,
    /// A password exists and must be verified before reading entries.
    Locked,
}

/// Single-process access to the vault. No cross-process locking: two
/// processes writing the same files concurrently is last-write-wins.
pub struct Lockbox {
    paths: StoragePaths,
    config: LockboxConfig,
    keys: KeyStore,
    vault: VaultStore,
    gate: PasswordGate,
    dek: Mutex<Option<SymmetricKey>>,
}

impl Lockbox {
    /// Platform paths, hardware device id, OS keyring and the optional config
    /// file next to the vault.
    pub fn open_default() -> Result<Self> {
        let paths = StoragePaths::resolve();
        let config = LockboxConfig::load(&paths.config_file())?;
        Ok(Self::with_parts(
            paths,
            config,
            Arc::new(HardwareDeviceId),
            Arc::new(KeyringStore),
        ))
    }

    pub fn with_parts(
        paths: StoragePaths,
        config: LockboxConfig,
        device: Arc<dyn DeviceIdSource>,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            keys: KeyStore::new(paths.clone(), device),
            vault: VaultStore::new(paths.clone(), config.corrupt_entries),
            gate: PasswordGate::new(credentials, &config),
            paths,
            config,
            dek: Mutex::new(None),
        }
    }

    pub fn paths(&self) -> &StoragePaths {
        &self.paths
    }

    pub fn config(&self) -> &LockboxConfig {
        &self.config
    }

    pub fn gate(&self) -> &PasswordGate {
        &self.gate
    }

    /// First-run bootstrap. Idempotent.
    pub fn initialize(&self) -> Result<()> {
        for path in self.paths.all_files() {
            cleanup_staging(&path);
        }
        self.keys.ensure_key_file_exists()?;
        self.vault.ensure_vault_file_exists()?;
        Ok(())
    }

    /// Enforces "no password, no vault": without a stored app password every
    /// artifact is wiped before bootstrapping.
    pub fn startup(&self) -> Result<StartupState> {
        let state = if self.app_password_exists()? {
            StartupState::Locked
        } else {
            warn!("no app password found, resetting installation");
            self.reset_all()?;
            StartupState::NeedsPassword
        };
        self.initialize()?;
        Ok(state)
    }

    pub fn app_password_exists(&self) -> Result<bool> {
        self.gate.app_password_exists()
    }

    pub fn set_app_password(&self, password: &str) -> Result<bool> {
        self.gate.set_app_password(password)
    }

    /// Stateless; does not touch the cached DEK.
    pub fn verify_app_password(&self, password: &str) -> Result<bool> {
        self.gate.verify_app_password(password)
    }

    /// Deletes the stored password, then the key file, vault file and both
    /// backups. The password goes first: if anything fails afterwards the
    /// next `startup` finds no password and finishes the wipe.
    pub fn reset_all(&self) -> Result<()> {
        self.gate.delete()?;
        for path in self.paths.all_files() {
            remove_if_exists(&path)?;
        }
        *self.dek.lock() = None;
        info!("installation reset");
        Ok(())
    }

    pub fn read_entries(&self) -> Result<Entries> {
        let dek = self.dek()?;
        self.vault.read_all(&dek)
    }

    pub fn write_entries(&self, entries: &Entries) -> Result<()> {
        let dek = self.dek()?;
        self.vault.write_all(&dek, entries)
    }

    pub fn sync_backups(&self) -> Result<SyncReport> {
        backup::sync_backups(&self.paths)
    }

    /// Loaded once per session and kept until `reset_all`.
    fn dek(&self) -> Result<SymmetricKey> {
        let mut cached = self.dek.lock();
        if let Some(dek) = cached.as_ref() {
            return Ok(dek.clone());
        }
        let dek = self.keys.load_dek()?;
        *cached = Some(dek.clone());
        Ok(dek)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::MemoryCredentialStore;
    use crate::device::FixedDeviceId;
    use crate::error::VaultError;
    use tempfile::tempdir;

    /// Keyring that is present but refuses every call, e.g. a locked keychain.
    struct LockedKeyring;

    impl CredentialStore for LockedKeyring {
        fn get(&self, _service: &str, _user: &str) -> Result<Option<String>> {
            Err(VaultError::CredentialStore("keychain locked".into()))
        }

        fn set(&self, _service: &str, _user: &str, _value: &str) -> Result<()> {
            Err(VaultError::CredentialStore("keychain locked".into()))
        }

        fn delete(&self, _service: &str, _user: &str) -> Result<()> {
            Err(VaultError::CredentialStore("keychain locked".into()))
        }
    }

    fn with_locked_keyring(paths: &StoragePaths) -> Lockbox {
        let config = LockboxConfig {
            pbkdf2_iterations: 1_000,
            ..LockboxConfig::default()
        };
        Lockbox::with_parts(
            paths.clone(),
            config,
            Arc::new(FixedDeviceId::new("board-serial")),
            Arc::new(LockedKeyring),
        )
    }

    /// A populated installation whose keyring has since become unusable.
    fn populated_then_locked(paths: &StoragePaths) -> Lockbox {
        let lb = lockbox(paths, &MemoryCredentialStore::new());
        lb.initialize().unwrap();
        lb.write_entries(&Entries::from([("a".into(), "1".into())])).unwrap();
        lb.sync_backups().unwrap();
        with_locked_keyring(paths)
    }

    fn lockbox(paths: &StoragePaths, creds: &MemoryCredentialStore) -> Lockbox {
        let config = LockboxConfig {
            pbkdf2_iterations: 1_000,
            ..LockboxConfig::default()
        };
        Lockbox::with_parts(
            paths.clone(),
            config,
            Arc::new(FixedDeviceId::new("board-serial")),
            Arc::new(creds.clone()),
        )
    }

    #[test]
    fn initialize_is_idempotent() {
        let dir = tempdir().unwrap();
        let paths = StoragePaths::rooted(dir.path());
        let lb = lockbox(&paths, &MemoryCredentialStore::new());
        lb.initialize().unwrap();
        let key_before = std::fs::read(paths.key_file()).unwrap();
        lb.initialize().unwrap();
        assert_eq!(std::fs::read(paths.key_file()).unwrap(), key_before);
        assert!(lb.read_entries().unwrap().is_empty());
    }

    #[test]
    fn startup_without_password_wipes_everything() {
        let dir = tempdir().unwrap();
        let paths = StoragePaths::rooted(dir.path());
        let creds = MemoryCredentialStore::new();
        let lb = lockbox(&paths, &creds);
        lb.initialize().unwrap();
        lb.write_entries(&Entries::from([("a".into(), "1".into())])).unwrap();
        lb.sync_backups().unwrap();

        let fresh = lockbox(&paths, &creds);
        assert_eq!(fresh.startup().unwrap(), StartupState::NeedsPassword);
        assert!(!paths.backup_key_file().exists());
        assert!(fresh.read_entries().unwrap().is_empty());
    }

    #[test]
    fn startup_with_password_keeps_vault() {
        let dir = tempdir().unwrap();
        let paths = StoragePaths::rooted(dir.path());
        let creds = MemoryCredentialStore::new();
        let lb = lockbox(&paths, &creds);
        lb.initialize().unwrap();
        lb.set_app_password("abc12345").unwrap();
        lb.write_entries(&Entries::from([("a".into(), "1".into())])).unwrap();

        let again = lockbox(&paths, &creds);
        assert_eq!(again.startup().unwrap(), StartupState::Locked);
        assert_eq!(again.read_entries().unwrap().len(), 1);
    }

    #[test]
    fn entries_need_a_key_file() {
        let dir = tempdir().unwrap();
        let paths = StoragePaths::rooted(dir.path());
        let lb = lockbox(&paths, &MemoryCredentialStore::new());
        assert!(matches!(lb.read_entries(), Err(VaultError::KeyUnavailable)));
    }

    #[test]
    fn cached_dek_outlives_password_checks() {
        let dir = tempdir().unwrap();
        let paths = StoragePaths::rooted(dir.path());
        let lb = lockbox(&paths, &MemoryCredentialStore::new());
        lb.initialize().unwrap();
        lb.set_app_password("abc12345").unwrap();
        lb.write_entries(&Entries::from([("k".into(), "v".into())])).unwrap();

        std::fs::remove_file(paths.key_file()).unwrap();
        assert!(!lb.verify_app_password("nope-nope").unwrap());
        assert_eq!(lb.read_entries().unwrap().len(), 1);
    }

    #[test]
    fn failed_password_delete_keeps_files() {
        let dir = tempdir().unwrap();
        let paths = StoragePaths::rooted(dir.path());
        let lb = populated_then_locked(&paths);

        assert!(matches!(lb.reset_all(), Err(VaultError::CredentialStore(_))));
        for path in paths.all_files() {
            assert!(path.exists(), "{} removed despite failed reset", path.display());
        }
    }

    #[test]
    fn startup_propagates_keyring_failure_without_wiping() {
        let dir = tempdir().unwrap();
        let paths = StoragePaths::rooted(dir.path());
        let lb = populated_then_locked(&paths);

        assert!(matches!(lb.startup(), Err(VaultError::CredentialStore(_))));
        assert!(paths.key_file().exists());
        assert!(paths.backup_vault_file().exists());
        assert_eq!(lb.read_entries().unwrap().len(), 1);
    }

    #[test]
    fn password_calls_propagate_keyring_failure() {
        let dir = tempdir().unwrap();
        let lb = with_locked_keyring(&StoragePaths::rooted(dir.path()));
        assert!(matches!(lb.app_password_exists(), Err(VaultError::CredentialStore(_))));
        assert!(matches!(lb.set_app_password("abc12345"), Err(VaultError::CredentialStore(_))));
        assert!(matches!(lb.verify_app_password("abc12345"), Err(VaultError::CredentialStore(_))));
    }

    #[test]
    fn initialize_sweeps_orphaned_staging_files() {
        let dir = tempdir().unwrap();
        let paths = StoragePaths::rooted(dir.path());
        let lb = lockbox(&paths, &MemoryCredentialStore::new());
        lb.initialize().unwrap();
        let orphan = paths.vault_dir.join(".vault.json.4f2a.staging");
        std::fs::write(&orphan, b"{\"half").unwrap();

        lb.initialize().unwrap();
        assert!(!orphan.exists());
        assert!(lb.read_entries().unwrap().is_empty());
    }
}
