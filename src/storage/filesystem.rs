//! File system checks
//!
//! Metadata checks shared by the file and directory operations. All checks use
//! `symlink_metadata`, so a symlink is never mistaken for its target.

use std::fs::{self, Metadata};
use std::io;
use std::path::Path;

use crate::error::FsError;
use crate::storage::atomic::DEFAULT_FILE_MODE;

/// Requires `path` to be an existing regular file.
pub fn require_regular_file(path: &Path, label: &str) -> Result<Metadata, FsError> {
    let metadata = lstat(path, label)?;
    if !metadata.file_type().is_file() {
        return Err(FsError::NotRegularFile(label.to_string()));
    }
    Ok(metadata)
}

/// Requires `path` to be an existing directory.
pub fn require_directory(path: &Path, label: &str) -> Result<Metadata, FsError> {
    let metadata = lstat(path, label)?;
    if !metadata.file_type().is_dir() {
        return Err(FsError::NotADirectory(label.to_string()));
    }
    Ok(metadata)
}

/// Returns the metadata of `path` if it is a regular file, `None` if nothing
/// exists there, and `NotRegularFile` for anything else.
pub fn existing_regular_file(path: &Path, label: &str) -> Result<Option<Metadata>, FsError> {
    match fs::symlink_metadata(path) {
        Ok(metadata) if metadata.file_type().is_file() => Ok(Some(metadata)),
        Ok(_) => Err(FsError::NotRegularFile(label.to_string())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(FsError::io(label, e)),
    }
}

/// Check if anything, including a dangling symlink, exists at `path`
pub fn entry_exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

fn lstat(path: &Path, label: &str) -> Result<Metadata, FsError> {
    fs::symlink_metadata(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => FsError::NotFound(label.to_string()),
        _ => FsError::io(label, e),
    })
}

/// Permission bits of an entry, limited to `0o777`.
#[cfg(unix)]
pub fn mode_of(metadata: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o777
}

#[cfg(not(unix))]
pub fn mode_of(metadata: &Metadata) -> u32 {
    if metadata.permissions().readonly() {
        DEFAULT_FILE_MODE & !0o222
    } else {
        DEFAULT_FILE_MODE
    }
}

/// Mode for a file about to be replaced: its current mode, or the default.
pub fn mode_or_default(metadata: Option<&Metadata>) -> u32 {
    metadata.map(mode_of).unwrap_or(DEFAULT_FILE_MODE)
}

/// Applies permission bits to a file or directory.
#[cfg(unix)]
pub fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
pub fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_readonly(mode & 0o200 == 0);
    fs::set_permissions(path, perms)
}
