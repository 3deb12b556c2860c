//! Atomic file replacement
//!
//! Content is staged in a temporary file next to the target and renamed into
//! place, so the target name only ever refers to a complete file. The staging
//! file lives in the target's own directory because rename is only atomic
//! within one filesystem.

use log::debug;
use std::io::{self, Write};
use std::path::Path;
use tempfile::{Builder, NamedTempFile};

/// Prefix of staging files created next to a write target.
pub const STAGING_PREFIX: &str = ".tmp_";

/// Mode given to files that did not exist before the write.
pub const DEFAULT_FILE_MODE: u32 = 0o644;

/// Replaces `path` with `content`, creating it if needed.
///
/// On any failure the staging file is removed and `path` is left as it was.
pub fn safe_write(path: &Path, content: &[u8], permissions: u32) -> io::Result<()> {
    let staging = stage(path, content, permissions)?;
    staging.persist(path).map_err(|e| e.error)?;

    debug!("Atomically wrote {} bytes to {}", content.len(), path.display());
    Ok(())
}

/// Like [`safe_write`] but fails with `AlreadyExists` instead of replacing an
/// existing entry at `path`.
pub fn safe_create(path: &Path, content: &[u8], permissions: u32) -> io::Result<()> {
    let staging = stage(path, content, permissions)?;
    staging.persist_noclobber(path).map_err(|e| e.error)?;

    debug!("Atomically created {} ({} bytes)", path.display(), content.len());
    Ok(())
}

fn stage(path: &Path, content: &[u8], permissions: u32) -> io::Result<NamedTempFile> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    // Dropping the NamedTempFile on any early return deletes it.
    let mut staging = Builder::new().prefix(STAGING_PREFIX).tempfile_in(dir)?;
    staging.write_all(content)?;
    staging.flush()?;
    staging.as_file().sync_all()?;
    set_file_mode(staging.as_file(), permissions)?;

    Ok(staging)
}

#[cfg(unix)]
fn set_file_mode(file: &std::fs::File, permissions: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(std::fs::Permissions::from_mode(permissions))
}

#[cfg(not(unix))]
fn set_file_mode(file: &std::fs::File, permissions: u32) -> io::Result<()> {
    let mut perms = file.metadata()?.permissions();
    perms.set_readonly(permissions & 0o200 == 0);
    file.set_permissions(perms)
}
