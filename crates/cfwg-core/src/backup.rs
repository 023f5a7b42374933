//! Backup-then-write discipline for files owned by another system.
//!
//! The tunnel config is shared with the management UI, so every overwrite is
//! preceded by a timestamped copy and the new body lands atomically.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::error::{Error, Result};

/// `strftime` pattern embedded in backup file names (second resolution).
pub const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Backup file name for `path` taken at `at`: `<file name>.<YYYYMMDD-HHMMSS>.bak`.
pub fn backup_file_name(path: &Path, at: DateTime<Local>) -> String {
    let file_name = path
        .file_name()
        .map_or_else(|| "config".into(), |n| n.to_string_lossy());
    format!("{file_name}.{}.bak", at.format(BACKUP_TIMESTAMP_FORMAT))
}

/// Copy the current contents of `path` into `backup_dir`, then overwrite `path`.
///
/// Returns the backup path when a previous file existed. If the backup step
/// fails, `path` is left untouched and [`Error::Backup`] is returned.
pub fn backup_then_write(
    path: &Path,
    backup_dir: &Path,
    contents: &str,
) -> Result<Option<PathBuf>> {
    let backup = if path.is_file() {
        Some(backup_existing(path, backup_dir)?)
    } else {
        None
    };

    write_atomic(path, contents)?;
    Ok(backup)
}

fn backup_existing(path: &Path, backup_dir: &Path) -> Result<PathBuf> {
    let backup_err = |source| Error::Backup {
        path: path.to_path_buf(),
        source,
    };

    fs::create_dir_all(backup_dir).map_err(backup_err)?;
    let backup_path = backup_dir.join(backup_file_name(path, Local::now()));
    fs::copy(path, &backup_path).map_err(backup_err)?;
    #[cfg(unix)]
    restrict_permissions(&backup_path).map_err(backup_err)?;

    tracing::info!(
        backup = %backup_path.display(),
        "Created backup of tunnel configuration"
    );
    Ok(backup_path)
}

/// Write `contents` to `path` through a temp file in the same directory,
/// leaving the result readable and writable by the owner only.
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let write_err = |source| Error::Write {
        path: path.to_path_buf(),
        source,
    };

    let dir = path
        .parent()
        .filter(|d| !d.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(contents.as_bytes()).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    #[cfg(unix)]
    restrict_permissions(tmp.path()).map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}

/// Restrict file permissions to owner-only read/write (0600).
#[cfg(unix)]
fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}
