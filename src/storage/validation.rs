//! Path validation
//!
//! Lexical path normalization, the root confinement check, file name rules
//! and permission string parsing. Nothing in here touches the filesystem.

use std::path::{Component, Path, PathBuf};

use crate::error::FsError;

/// Maximum length of a single file name component, in characters.
pub const MAX_FILE_NAME_LENGTH: usize = 255;

/// Highest permission value accepted by chmod operations.
pub const MAX_PERMISSIONS: u32 = 0o777;

const INVALID_NAME_PATTERNS: [&str; 11] = ["/", "\\", ":", "*", "?", "\"", "<", ">", "|", "..", "~"];

/// Lexically normalizes a path.
///
/// Backslashes become `/`, empty and `.` segments are dropped and `..`
/// segments cancel the preceding normal segment. A `..` directly under the
/// filesystem root is dropped; a leading `..` on a relative path is kept.
/// An empty result is returned as `.`.
pub fn clean_path(raw: impl AsRef<Path>) -> PathBuf {
    let unified = raw.as_ref().to_string_lossy().replace('\\', "/");
    let mut cleaned = PathBuf::new();
    let mut depth = 0usize;
    let mut rooted = false;

    for component in Path::new(&unified).components() {
        match component {
            Component::Prefix(prefix) => cleaned.push(prefix.as_os_str()),
            Component::RootDir => {
                cleaned.push(Component::RootDir.as_os_str());
                rooted = true;
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if depth > 0 {
                    cleaned.pop();
                    depth -= 1;
                } else if !rooted {
                    cleaned.push("..");
                }
            }
            Component::Normal(part) => {
                cleaned.push(part);
                depth += 1;
            }
        }
    }

    if cleaned.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        cleaned
    }
}

/// Returns the path of `path` relative to `root`, or `None` when `path`
/// cannot be expressed below `root` without a parent traversal.
pub fn relative_to_root(root: &Path, path: &Path) -> Option<PathBuf> {
    let root = clean_path(root);
    let path = clean_path(path);

    let rel = path.strip_prefix(&root).ok()?;
    if rel
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_) | Component::RootDir))
    {
        return None;
    }
    Some(rel.to_path_buf())
}

/// Checks whether `path` lies inside `root` after normalizing both.
pub fn is_confined(root: &Path, path: &Path) -> bool {
    relative_to_root(root, path).is_some()
}

/// Renders a relative path with `/` separators regardless of host platform.
pub fn to_slash(rel: &Path) -> String {
    rel.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            Component::ParentDir => Some("..".to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Checks a single path component against the file naming rules.
pub fn is_valid_file_name(name: &str) -> bool {
    if name.is_empty() || name.starts_with('.') {
        return false;
    }
    if name.chars().count() > MAX_FILE_NAME_LENGTH {
        return false;
    }
    !INVALID_NAME_PATTERNS
        .iter()
        .any(|pattern| name.contains(pattern))
}

pub fn validate_file_name(name: &str) -> Result<(), FsError> {
    if is_valid_file_name(name) {
        Ok(())
    } else {
        Err(FsError::InvalidArgument(format!("invalid file name: {:?}", name)))
    }
}

/// Parses an octal permission string such as `"644"`.
///
/// Only octal digits are accepted (no sign, no `0o` prefix). Leading zeros
/// are allowed; the value may not exceed `0777`.
pub fn parse_permissions(permissions: &str) -> Result<u32, FsError> {
    if permissions.is_empty() || !permissions.chars().all(|c| ('0'..='7').contains(&c)) {
        return Err(FsError::InvalidArgument(format!(
            "invalid permissions format: {:?}",
            permissions
        )));
    }

    let mode = u32::from_str_radix(permissions, 8).map_err(|_| {
        FsError::InvalidArgument(format!("invalid permissions format: {:?}", permissions))
    })?;

    if mode > MAX_PERMISSIONS {
        return Err(FsError::InvalidArgument(format!(
            "invalid permissions value: {}",
            permissions
        )));
    }

    Ok(mode)
}
