use directories::BaseDirs;
use std::path::{Path, PathBuf};

pub const KEY_FILE_NAME: &str = ".key";
pub const VAULT_FILE_NAME: &str = "vault.json";
pub const BACKUP_KEY_FILE_NAME: &str = "key.bin";
pub const BACKUP_VAULT_FILE_NAME: &str = "vault-bu.json";
pub const CONFIG_FILE_NAME: &str = "lockbox.json";

/// Places every storage role under a single root when set.
pub const HOME_OVERRIDE_ENV: &str = "LOCKBOX_HOME";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsFamily {
    Windows,
    MacOs,
    Unix,
}

impl OsFamily {
    pub fn current() -> Self {
        if cfg!(windows) {
            OsFamily::Windows
        } else if cfg!(target_os = "macos") {
            OsFamily::MacOs
        } else {
            OsFamily::Unix
        }
    }
}

/// Directories for the three storage roles: key file (cache-like), vault file
/// (config-like) and backups (temp-like).
///
/// Nothing here checks writability; an unusable directory surfaces as an IO
/// error on first write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePaths {
    pub key_dir: PathBuf,
    pub vault_dir: PathBuf,
    pub backup_dir: PathBuf,
}

impl StoragePaths {
    pub fn resolve() -> Self {
        if let Some(root) = std::env::var_os(HOME_OVERRIDE_ENV).filter(|v| !v.is_empty()) {
            return Self::rooted(root);
        }
        let home = BaseDirs::new()
            .map(|dirs| dirs.home_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));
        Self::resolve_for(
            OsFamily::current(),
            |name| std::env::var_os(name).map(PathBuf::from),
            &home,
            &std::env::temp_dir(),
        )
    }

    /// Pure resolution: `env` looks up an environment variable, unset or empty
    /// values fall back to the home/temp defaults.
    pub fn resolve_for<F>(os: OsFamily, env: F, home: &Path, temp: &Path) -> Self
    where
        F: Fn(&str) -> Option<PathBuf>,
    {
        let var = |name: &str| env(name).filter(|p| !p.as_os_str().is_empty());
        match os {
            OsFamily::Windows => Self {
                key_dir: var("LOCALAPPDATA")
                    .unwrap_or_else(|| home.join("AppData").join("Local")),
                vault_dir: var("APPDATA")
                    .unwrap_or_else(|| home.join("AppData").join("Roaming")),
                backup_dir: var("TEMP").unwrap_or_else(|| temp.to_path_buf()),
            },
            OsFamily::MacOs => Self {
                key_dir: home.join("Library").join("Caches"),
                vault_dir: home.join("Library").join("Application Support"),
                backup_dir: temp.to_path_buf(),
            },
            OsFamily::Unix => Self {
                key_dir: var("XDG_DATA_HOME")
                    .unwrap_or_else(|| home.join(".local").join("share")),
                vault_dir: var("XDG_CONFIG_HOME").unwrap_or_else(|| home.join(".config")),
                backup_dir: var("TMPDIR").unwrap_or_else(|| temp.to_path_buf()),
            },
        }
    }

    pub fn rooted(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            key_dir: root.join("keys"),
            vault_dir: root.join("vault"),
            backup_dir: root.join("backup"),
        }
    }

    pub fn key_file(&self) -> PathBuf {
        self.key_dir.join(KEY_FILE_NAME)
    }

    pub fn vault_file(&self) -> PathBuf {
        self.vault_dir.join(VAULT_FILE_NAME)
    }

    pub fn backup_key_file(&self) -> PathBuf {
        self.backup_dir.join(BACKUP_KEY_FILE_NAME)
    }

    pub fn backup_vault_file(&self) -> PathBuf {
        self.backup_dir.join(BACKUP_VAULT_FILE_NAME)
    }

    pub fn config_file(&self) -> PathBuf {
        self.vault_dir.join(CONFIG_FILE_NAME)
    }

    /// Every artifact `reset_all` removes.
    pub fn all_files(&self) -> [PathBuf; 4] {
        [
            self.key_file(),
            self.vault_file(),
            self.backup_key_file(),
            self.backup_vault_file(),
        ]
    }
}
