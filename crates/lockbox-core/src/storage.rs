//! File helpers shared by the key, vault and backup stores.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::Path;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::Result;

/// Write `bytes` to `dest` through a staging file in the same directory and
/// rename it into place, so readers never see a truncated file.
pub fn write_atomic(dest: &Path, bytes: &[u8]) -> Result<()> {
    write_staged(dest, bytes, false)
}

/// Like [`write_atomic`] but the file is owner-only from the moment the
/// staging file is created.
pub fn write_private(dest: &Path, bytes: &[u8]) -> Result<()> {
    write_staged(dest, bytes, true)
}

fn write_staged(dest: &Path, bytes: &[u8], private: bool) -> Result<()> {
    let parent = parent_dir(dest);
    fs::create_dir_all(parent)?;
    let staging_path = parent.join(format!(
        "{}{}{STAGING_SUFFIX}",
        staging_prefix(dest),
        Uuid::new_v4()
    ));
    let written = (|| -> Result<()> {
        let mut file = create_staging(&staging_path, private)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        Ok(())
    })();
    if let Err(e) = written {
        let _ = fs::remove_file(&staging_path);
        return Err(e);
    }
    if let Err(e) = fs::rename(&staging_path, dest) {
        let _ = fs::remove_file(&staging_path);
        return Err(e.into());
    }
    fsync_dir(parent)?;
    Ok(())
}

fn create_staging(path: &Path, private: bool) -> Result<File> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        if private {
            options.mode(0o600);
        }
    }
    #[cfg(not(unix))]
    {
        let _ = private;
    }
    Ok(options.open(path)?)
}

/// Removes staging files for `dest` left behind by an interrupted write.
/// Only names produced by [`write_atomic`] for this file are touched.
pub fn cleanup_staging(dest: &Path) -> usize {
    let prefix = staging_prefix(dest);
    let Ok(entries) = fs::read_dir(parent_dir(dest)) else {
        return 0;
    };
    let mut removed = 0;
    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with(&prefix) && name.ends_with(STAGING_SUFFIX) {
            warn!(path = %entry.path().display(), "removing orphaned staging file");
            if fs::remove_file(entry.path()).is_ok() {
                removed += 1;
            }
        }
    }
    removed
}

const STAGING_SUFFIX: &str = ".staging";

fn staging_prefix(dest: &Path) -> String {
    let file_name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!(".{file_name}.")
}

fn parent_dir(dest: &Path) -> &Path {
    match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

/// `Ok(None)` when the file does not exist.
pub fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Deleting a file that is already gone is not an error.
pub fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => {
            debug!(path = %path.display(), "removed");
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn fsync_dir(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        let dir = fs::OpenOptions::new().read(true).open(path)?;
        dir.sync_all()?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}
