//! Logged-in session state owned by the shell.
//!
//! Holds the plaintext map between calls and flushes the full map through
//! [`Lockbox::write_entries`] after every mutation. Locking only hides the
//! map from the shell; the DEK stays cached in the [`Lockbox`].

use std::time::{Duration, Instant};
use tracing::debug;

use crate::error::{Result, VaultError};
use crate::lockbox::Lockbox;
use crate::vault::Entries;

pub struct VaultSession<'a> {
    lockbox: &'a Lockbox,
    entries: Entries,
    last_activity: Instant,
    locked: bool,
}

impl<'a> VaultSession<'a> {
    /// Call after the app password has been verified.
    pub fn open(lockbox: &'a Lockbox) -> Result<Self> {
        let entries = lockbox.read_entries()?;
        debug!(count = entries.len(), "session opened");
        Ok(Self {
            lockbox,
            entries,
            last_activity: Instant::now(),
            locked: false,
        })
    }

    pub fn get(&self, key: &str) -> Result<Option<&str>> {
        self.ensure_unlocked()?;
        Ok(self.entries.get(key.trim()).map(String::as_str))
    }

    pub fn keys(&self) -> Result<Vec<&str>> {
        self.ensure_unlocked()?;
        let mut keys: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        keys.sort_unstable();
        Ok(keys)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// New keys only; existing keys go through [`VaultSession::update`].
    pub fn add(&mut self, key: &str, value: &str, repeat: &str) -> Result<()> {
        self.ensure_unlocked()?;
        let key = key.trim();
        let value = confirmed_value(value, repeat)?;
        if key.is_empty() {
            return Err(VaultError::Validation("please fill all fields".into()));
        }
        if self.entries.contains_key(key) {
            return Err(VaultError::Validation(format!(
                "'{key}' already exists, update it instead"
            )));
        }
        self.commit(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    pub fn update(&mut self, key: &str, value: &str, repeat: &str) -> Result<()> {
        self.ensure_unlocked()?;
        let key = key.trim();
        if !self.entries.contains_key(key) {
            return Err(VaultError::Validation("please select an existing key".into()));
        }
        let value = confirmed_value(value, repeat)?;
        self.commit(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    /// `confirmed` must reflect an explicit yes from the user.
    pub fn delete(&mut self, key: &str, confirmed: bool) -> Result<()> {
        self.ensure_unlocked()?;
        let key = key.trim();
        if !self.entries.contains_key(key) {
            return Err(VaultError::Validation(format!("'{key}' does not exist")));
        }
        if !confirmed {
            return Err(VaultError::Validation("deletion not confirmed".into()));
        }
        self.commit(|entries| {
            entries.remove(key);
        })
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn is_idle(&self, now: Instant) -> bool {
        self.idle_for(now) >= self.lockbox.config().idle_timeout()
    }

    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_activity)
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn lock(&mut self) {
        self.locked = true;
        debug!("session locked");
    }

    /// Re-checks the app password; the vault is not re-read.
    pub fn unlock(&mut self, password: &str) -> Result<bool> {
        if !self.lockbox.verify_app_password(password)? {
            return Ok(false);
        }
        self.locked = false;
        self.touch();
        Ok(true)
    }

    fn ensure_unlocked(&self) -> Result<()> {
        if self.locked {
            return Err(VaultError::Validation("session is locked".into()));
        }
        Ok(())
    }

    /// Applies `change` to a copy, persists it, then adopts it. A failed write
    /// leaves the session map untouched.
    fn commit(&mut self, change: impl FnOnce(&mut Entries)) -> Result<()> {
        let mut next = self.entries.clone();
        change(&mut next);
        self.lockbox.write_entries(&next)?;
        self.entries = next;
        self.touch();
        Ok(())
    }
}

fn confirmed_value<'v>(value: &'v str, repeat: &str) -> Result<&'v str> {
    let value = value.trim();
    let repeat = repeat.trim();
    if value.is_empty() || repeat.is_empty() {
        return Err(VaultError::Validation("please fill all fields".into()));
    }
    if value != repeat {
        return Err(VaultError::Validation("values do not match".into()));
    }
    Ok(value)
}
