//! Point-in-time copies of the key file and vault file.
//!
//! Backups are ciphertext copies, refreshed only by [`sync_backups`]. They can
//! lag the primaries. Restoring the key file requires the same device KEK, so
//! a backup only protects against losing files on this machine, not against
//! moving to another one.

use tracing::{debug, info};

use crate::error::Result;
use crate::paths::StoragePaths;
use crate::storage::{read_optional, write_atomic, write_private};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub key_copied: bool,
    pub vault_copied: bool,
}

/// Copy the current key and vault files verbatim into the backup directory.
/// A missing primary leaves its backup untouched.
pub fn sync_backups(paths: &StoragePaths) -> Result<SyncReport> {
    let mut report = SyncReport::default();

    if let Some(key) = read_optional(&paths.key_file())? {
        write_private(&paths.backup_key_file(), &key)?;
        report.key_copied = true;
    } else {
        debug!("no key file to back up");
    }

    if let Some(vault) = read_optional(&paths.vault_file())? {
        write_atomic(&paths.backup_vault_file(), &vault)?;
        report.vault_copied = true;
    } else {
        debug!("no vault file to back up");
    }

    info!(
        key = report.key_copied,
        vault = report.vault_copied,
        dir = %paths.backup_dir.display(),
        "backups synced"
    );
    Ok(report)
}

pub fn read_backup_key(paths: &StoragePaths) -> Result<Option<Vec<u8>>> {
    read_optional(&paths.backup_key_file())
}

pub fn read_backup_vault(paths: &StoragePaths) -> Result<Option<Vec<u8>>> {
    read_optional(&paths.backup_vault_file())
}
