//! lockbox-core — key management and vault encryption for Lockbox
//!
//! # Key hierarchy
//! - KEK: `SHA-256(device_id ++ device_id)`, recomputed on every use, never stored.
//! - DEK: random, generated once, stored only as `Encrypt(DEK, KEK)` in the key file.
//! - Vault entries: every key and every value is its own envelope token under the DEK.
//!
//! The KEK binds the key file to this machine. Backups are ciphertext copies
//! and therefore only help when files are lost on the same device.
//!
//! # Module layout
//! - `paths`       — per-OS directories for the key, vault and backup roles
//! - `device`      — best-effort hardware serial with a fixed fallback
//! - `kek`         — device-bound key-encryption key
//! - `crypto`      — XChaCha20-Poly1305 envelope tokens
//! - `master_key`  — DEK generation, persistence and recovery
//! - `vault`       — encrypted entry map on disk
//! - `backup`      — explicit backup sync
//! - `credential`  — credential store trait, OS keyring and in-memory backends
//! - `password`    — PBKDF2 app-password gate
//! - `lockbox`     — facade used by the shell
//! - `session`     — shell-side session map with mutation rules and idle lock
//! - `config`      — optional JSON configuration
//! - `storage`     — atomic file writes
//! - `error`       — unified error type

pub mod backup;
pub mod config;
pub mod credential;
pub mod crypto;
pub mod device;
pub mod error;
pub mod kek;
pub mod lockbox;
pub mod master_key;
pub mod password;
pub mod paths;
pub mod session;
pub mod storage;
pub mod vault;

pub use config::LockboxConfig;
pub use error::{Result, VaultError};
pub use lockbox::{Lockbox, StartupState};
pub use session::VaultSession;
pub use vault::Entries;
