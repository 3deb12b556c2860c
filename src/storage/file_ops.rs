//! File operations
//!
//! Single-file read, write and mutation operations. Every path argument is
//! confined to the engine root before anything touches the disk, and every
//! content change goes through the atomic write primitive.

use log::{debug, error, info, warn};
use std::fs;
use std::io;
use std::path::Path;

use crate::error::FsError;
use crate::storage::atomic::{DEFAULT_FILE_MODE, safe_create, safe_write};
use crate::storage::engine::FsEngine;
use crate::storage::filesystem::{
    entry_exists, existing_regular_file, mode_of, mode_or_default, require_regular_file, set_mode,
};
use crate::storage::validation::{parse_permissions, validate_file_name};

impl FsEngine {
    /// Reads a whole file as UTF-8 text.
    pub fn read(&self, path: &str) -> Result<String, FsError> {
        let target = self.scope().resolve_existing(path)?;
        require_regular_file(&target, path)?;

        let content = read_text(&target, path)?;
        debug!("Read {} ({} bytes)", target.display(), content.len());
        Ok(content)
    }

    /// Replaces the content of a file, creating it if absent.
    ///
    /// The parent directory must already exist.
    pub fn write(&self, path: &str, content: &str) -> Result<(), FsError> {
        let target = self.scope().resolve(path)?;
        let existing = existing_regular_file(&target, path)?;

        safe_write(&target, content.as_bytes(), mode_or_default(existing.as_ref()))
            .map_err(|e| FsError::io(path, e))?;

        info!("Wrote {} bytes to {}", content.len(), target.display());
        Ok(())
    }

    /// Replaces the content of a file that must already exist.
    pub fn edit(&self, path: &str, content: &str) -> Result<(), FsError> {
        let target = self.scope().resolve_existing(path)?;
        let metadata = require_regular_file(&target, path)?;

        safe_write(&target, content.as_bytes(), mode_of(&metadata))
            .map_err(|e| FsError::io(path, e))?;

        info!("Edited {} ({} bytes)", target.display(), content.len());
        Ok(())
    }

    pub fn delete(&self, path: &str) -> Result<(), FsError> {
        let target = self.scope().resolve_existing(path)?;
        require_regular_file(&target, path)?;

        fs::remove_file(&target).map_err(|e| {
            error!("Failed to delete file {}: {}", target.display(), e);
            FsError::io(path, e)
        })?;

        info!("Deleted file {}", target.display());
        Ok(())
    }

    /// Moves a regular file, replacing a regular file at the destination.
    ///
    /// Uses a rename when both sides share a filesystem. Across filesystems
    /// the file is copied and the source removed; if that removal fails the
    /// new destination file is removed again and the error returned.
    pub fn move_file(&self, source: &str, destination: &str) -> Result<(), FsError> {
        let (src, dst) = self.scope().resolve_pair(source, destination)?;
        let metadata = require_regular_file(&src, source)?;
        existing_regular_file(&dst, destination)?;

        if src == dst {
            return Ok(());
        }

        let moved = FileMove {
            src: &src,
            dst: &dst,
            mode: mode_of(&metadata),
            source,
            destination,
        };
        moved.run(|from, to| fs::rename(from, to), |path| fs::remove_file(path))
    }

    /// Copies a regular file. The source is left untouched.
    pub fn copy_file(&self, source: &str, destination: &str) -> Result<(), FsError> {
        let (src, dst) = self.scope().resolve_pair(source, destination)?;
        copy_resolved_file(&src, &dst, source, destination)
    }

    /// Sets the permission bits of a file from an octal string such as `"644"`.
    pub fn chmod(&self, path: &str, permissions: &str) -> Result<(), FsError> {
        let target = self.scope().resolve_existing(path)?;
        require_regular_file(&target, path)?;
        let mode = parse_permissions(permissions)?;

        set_mode(&target, mode).map_err(|e| FsError::io(path, e))?;

        info!("Changed mode of {} to {:o}", target.display(), mode);
        Ok(())
    }

    /// Creates a file that must not exist yet, creating missing parent
    /// directories on the way.
    pub fn create_new(&self, path: &str, content: &str) -> Result<(), FsError> {
        let target = self.scope().resolve_entry(path)?;
        let name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        validate_file_name(&name)?;

        if entry_exists(&target) {
            return Err(FsError::AlreadyExists(path.to_string()));
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| FsError::io(path, e))?;
        }

        safe_create(&target, content.as_bytes(), DEFAULT_FILE_MODE).map_err(|e| {
            if e.kind() == io::ErrorKind::AlreadyExists {
                FsError::AlreadyExists(path.to_string())
            } else {
                FsError::io(path, e)
            }
        })?;

        info!("Created file {} ({} bytes)", target.display(), content.len());
        Ok(())
    }

    /// Appends a newline followed by `content`.
    ///
    /// The whole file is rewritten through a staging file rather than opened
    /// in append mode.
    pub fn append(&self, path: &str, content: &str) -> Result<(), FsError> {
        let target = self.scope().resolve_existing(path)?;
        let metadata = require_regular_file(&target, path)?;

        let mut combined = fs::read(&target).map_err(|e| FsError::io(path, e))?;
        combined.reserve(content.len() + 1);
        combined.push(b'\n');
        combined.extend_from_slice(content.as_bytes());

        safe_write(&target, &combined, mode_of(&metadata)).map_err(|e| FsError::io(path, e))?;

        info!("Appended {} bytes to {}", content.len(), target.display());
        Ok(())
    }

    /// Replaces every occurrence of `old` with `new` and returns how many
    /// occurrences were replaced.
    pub fn replace(&self, path: &str, old: &str, new: &str) -> Result<usize, FsError> {
        if old.is_empty() {
            return Err(FsError::InvalidArgument("text to replace is empty".into()));
        }

        let target = self.scope().resolve_existing(path)?;
        let metadata = require_regular_file(&target, path)?;
        let content = read_text(&target, path)?;

        let occurrences = content.matches(old).count();
        if occurrences == 0 {
            debug!("Nothing to replace in {}", target.display());
            return Ok(0);
        }

        let updated = content.replace(old, new);
        safe_write(&target, updated.as_bytes(), mode_of(&metadata))
            .map_err(|e| FsError::io(path, e))?;

        info!("Replaced {} occurrence(s) in {}", occurrences, target.display());
        Ok(occurrences)
    }
}

fn read_text(target: &Path, label: &str) -> Result<String, FsError> {
    let bytes = fs::read(target).map_err(|e| FsError::io(label, e))?;
    String::from_utf8(bytes)
        .map_err(|e| FsError::io(label, io::Error::new(io::ErrorKind::InvalidData, e)))
}

/// Copies one confined regular file to another confined path.
///
/// Shared by single-file copy and the recursive directory copy.
pub(crate) fn copy_resolved_file(
    src: &Path,
    dst: &Path,
    source: &str,
    destination: &str,
) -> Result<(), FsError> {
    let metadata = require_regular_file(src, source)?;
    let existing = existing_regular_file(dst, destination)?;

    if src == dst {
        return Ok(());
    }

    let content = fs::read(src).map_err(|e| FsError::io(source, e))?;
    let mode = existing.as_ref().map(mode_of).unwrap_or_else(|| mode_of(&metadata));
    safe_write(dst, &content, mode).map_err(|e| FsError::io(destination, e))?;

    info!("Copied file {} -> {}", src.display(), dst.display());
    Ok(())
}

/// A resolved file move. The filesystem calls are passed in by the caller.
struct FileMove<'a> {
    src: &'a Path,
    dst: &'a Path,
    mode: u32,
    source: &'a str,
    destination: &'a str,
}

impl FileMove<'_> {
    fn run<R, D>(&self, rename: R, remove_source: D) -> Result<(), FsError>
    where
        R: FnOnce(&Path, &Path) -> io::Result<()>,
        D: FnOnce(&Path) -> io::Result<()>,
    {
        match rename(self.src, self.dst) {
            Ok(()) => {
                info!("Moved file {} -> {}", self.src.display(), self.dst.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
                debug!("Rename crosses devices, copying {} instead", self.src.display());
                self.by_copy(remove_source)
            }
            Err(e) => Err(FsError::io(self.source, e)),
        }
    }

    fn by_copy<D>(&self, remove_source: D) -> Result<(), FsError>
    where
        D: FnOnce(&Path) -> io::Result<()>,
    {
        let content = fs::read(self.src).map_err(|e| FsError::io(self.source, e))?;
        safe_write(self.dst, &content, self.mode).map_err(|e| FsError::io(self.destination, e))?;

        if let Err(e) = remove_source(self.src) {
            error!("Failed to remove {} after copying it: {}", self.src.display(), e);
            if let Err(rollback) = fs::remove_file(self.dst) {
                warn!("Rollback of {} failed: {}", self.dst.display(), rollback);
            }
            return Err(FsError::io(self.source, e));
        }

        info!("Moved file {} -> {} by copy", self.src.display(), self.dst.display());
        Ok(())
    }
}
