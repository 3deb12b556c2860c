//! Filesystem engine
//!
//! Owns the confinement root and turns caller-supplied path strings into
//! absolute paths that are guaranteed to lie under it. The file, directory and
//! search operations are implemented on [`FsEngine`] in their own modules.

use log::info;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use crate::error::FsError;
use crate::storage::filesystem::entry_exists;
use crate::storage::validation::{clean_path, is_confined, relative_to_root, to_slash};

/// Root used when no override is configured.
pub const DEFAULT_ROOT: &str = "./workspace";

/// Scoped filesystem engine.
///
/// The root sits behind a reader/writer lock. Each operation takes one
/// [`RootScope`] snapshot up front and resolves and renders every path through
/// it, so an operation racing [`FsEngine::set_root`] works entirely under
/// either the old or the new root.
#[derive(Debug)]
pub struct FsEngine {
    root: RwLock<PathBuf>,
}

/// The root as seen by a single operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootScope {
    root: PathBuf,
}

impl FsEngine {
    /// Creates an engine confined to `root`.
    ///
    /// The root is made absolute and normalized; it does not have to exist yet.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, FsError> {
        let root = normalize_root(root.as_ref())?;
        info!("Filesystem engine confined to {}", root.display());
        Ok(Self {
            root: RwLock::new(root),
        })
    }

    /// Returns the current root.
    pub fn root(&self) -> PathBuf {
        self.root
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces the root for all subsequent operations.
    pub fn set_root(&self, root: impl AsRef<Path>) -> Result<(), FsError> {
        let root = normalize_root(root.as_ref())?;
        let mut guard = self.root.write().unwrap_or_else(PoisonError::into_inner);
        info!(
            "Changing confinement root from {} to {}",
            guard.display(),
            root.display()
        );
        *guard = root;
        Ok(())
    }

    /// Snapshots the root for one operation.
    pub fn scope(&self) -> RootScope {
        RootScope { root: self.root() }
    }
}

impl RootScope {
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves `raw` against the root and rejects anything outside it.
    pub fn resolve(&self, raw: &str) -> Result<PathBuf, FsError> {
        resolve_within(&self.root, raw)
    }

    /// Like [`RootScope::resolve`], additionally requiring that something
    /// exists at the resolved path.
    pub fn resolve_existing(&self, raw: &str) -> Result<PathBuf, FsError> {
        let path = self.resolve(raw)?;
        if !entry_exists(&path) {
            return Err(FsError::NotFound(raw.to_string()));
        }
        Ok(path)
    }

    /// Resolves a path that must name an entry strictly below the root.
    pub fn resolve_entry(&self, raw: &str) -> Result<PathBuf, FsError> {
        let path = self.resolve(raw)?;
        if path == self.root {
            return Err(FsError::AccessDenied(format!("{} (confinement root)", raw)));
        }
        Ok(path)
    }

    /// Resolves the source and destination of a two-path operation.
    pub fn resolve_pair(&self, source: &str, destination: &str) -> Result<(PathBuf, PathBuf), FsError> {
        Ok((self.resolve(source)?, self.resolve(destination)?))
    }

    /// Same as [`RootScope::resolve_pair`], but neither side may be the root.
    pub fn resolve_entry_pair(
        &self,
        source: &str,
        destination: &str,
    ) -> Result<(PathBuf, PathBuf), FsError> {
        Ok((self.resolve_entry(source)?, self.resolve_entry(destination)?))
    }

    /// Root-relative, `/`-separated rendering of a path below the root.
    ///
    /// A path outside the root renders as its file name only, never as a host
    /// path.
    pub fn display_relative(&self, path: &Path) -> String {
        match relative_to_root(&self.root, path) {
            Some(rel) => to_slash(&rel),
            None => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
        }
    }
}

fn normalize_root(root: &Path) -> Result<PathBuf, FsError> {
    if root.as_os_str().is_empty() {
        return Err(FsError::InvalidArgument("root path is empty".into()));
    }
    let absolute = std::path::absolute(root).map_err(|e| FsError::io(root.display().to_string(), e))?;
    Ok(clean_path(absolute))
}

fn resolve_within(root: &Path, raw: &str) -> Result<PathBuf, FsError> {
    let candidate = clean_path(root.join(clean_path(raw)));
    if !is_confined(root, &candidate) {
        return Err(FsError::AccessDenied(raw.to_string()));
    }
    Ok(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Arc;
    use std::thread;
    use tempfile::tempdir;

    #[test]
    fn test_resolve_relative_and_absolute() {
        let dir = tempdir().unwrap();
        let engine = FsEngine::new(dir.path()).unwrap();
        let root = engine.root();

        assert_eq!(engine.scope().resolve("a/b.txt").unwrap(), root.join("a/b.txt"));
        assert_eq!(engine.scope().resolve("").unwrap(), root);
        assert_eq!(engine.scope().resolve("./a/../c").unwrap(), root.join("c"));
        assert_eq!(engine.scope().resolve("a\\b.txt").unwrap(), root.join("a/b.txt"));

        let inside = root.join("x.txt");
        assert_eq!(engine.scope().resolve(&inside.to_string_lossy()).unwrap(), inside);
    }

    #[test]
    fn test_resolve_rejects_escapes() {
        let dir = tempdir().unwrap();
        let engine = FsEngine::new(dir.path().join("jail")).unwrap();

        for raw in ["..", "../x", "a/../../x", "/etc/passwd", "..\\x"] {
            assert!(
                matches!(engine.scope().resolve(raw), Err(FsError::AccessDenied(_))),
                "{:?} should be denied",
                raw
            );
        }

        let sibling = dir.path().join("jail2").join("f");
        assert!(matches!(
            engine.scope().resolve(&sibling.to_string_lossy()),
            Err(FsError::AccessDenied(_))
        ));
    }

    #[test]
    fn test_resolve_existing() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("here.txt"), b"x").unwrap();
        let engine = FsEngine::new(dir.path()).unwrap();

        assert!(engine.scope().resolve_existing("here.txt").is_ok());
        assert!(matches!(
            engine.scope().resolve_existing("gone.txt"),
            Err(FsError::NotFound(_))
        ));
        assert!(matches!(
            engine.scope().resolve_existing("../here.txt"),
            Err(FsError::AccessDenied(_))
        ));
    }

    #[test]
    fn test_resolve_entry_rejects_root() {
        let dir = tempdir().unwrap();
        let engine = FsEngine::new(dir.path()).unwrap();

        assert!(matches!(engine.scope().resolve_entry(""), Err(FsError::AccessDenied(_))));
        assert!(matches!(engine.scope().resolve_entry("a/.."), Err(FsError::AccessDenied(_))));
        assert!(engine.scope().resolve_entry("a").is_ok());
        assert!(matches!(
            engine.scope().resolve_entry_pair("a", "."),
            Err(FsError::AccessDenied(_))
        ));
    }

    #[test]
    fn test_empty_root_is_invalid() {
        assert!(matches!(FsEngine::new(""), Err(FsError::InvalidArgument(_))));
    }

    #[test]
    fn test_set_root_redirects_resolution() {
        let first = tempdir().unwrap();
        let second = tempdir().unwrap();
        let engine = FsEngine::new(first.path()).unwrap();

        engine.set_root(second.path()).unwrap();
        assert_eq!(engine.root(), clean_path(second.path()));
        assert!(engine.scope().resolve("f.txt").unwrap().starts_with(second.path()));
        assert!(matches!(
            engine.scope().resolve(&first.path().join("f.txt").to_string_lossy()),
            Err(FsError::AccessDenied(_))
        ));
    }

    #[test]
    fn test_concurrent_readers_see_a_whole_root() {
        let first = tempdir().unwrap();
        let second = tempdir().unwrap();
        let roots = [clean_path(first.path()), clean_path(second.path())];
        let engine = Arc::new(FsEngine::new(&roots[0]).unwrap());

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let engine = Arc::clone(&engine);
                let roots = roots.clone();
                thread::spawn(move || {
                    for _ in 0..500 {
                        let resolved = engine.scope().resolve("file.txt").unwrap();
                        assert!(roots.iter().any(|r| resolved == r.join("file.txt")));
                    }
                })
            })
            .collect();

        for i in 0..200 {
            engine.set_root(&roots[i % 2]).unwrap();
        }
        for reader in readers {
            reader.join().unwrap();
        }
    }

    #[test]
    fn test_display_relative() {
        let dir = tempdir().unwrap();
        let engine = FsEngine::new(dir.path()).unwrap();
        let scope = engine.scope();
        let path = scope.resolve("a/b/c.txt").unwrap();
        assert_eq!(scope.display_relative(&path), "a/b/c.txt");
        assert_eq!(scope.display_relative(Path::new("/elsewhere/host/file.txt")), "file.txt");
    }

    #[test]
    fn test_scope_outlives_set_root() {
        let first = tempdir().unwrap();
        let second = tempdir().unwrap();
        let engine = FsEngine::new(first.path()).unwrap();

        let scope = engine.scope();
        engine.set_root(second.path()).unwrap();

        assert_eq!(scope.root(), clean_path(first.path()));
        let path = scope.resolve("x/y.txt").unwrap();
        assert!(path.starts_with(first.path()));
        assert_eq!(scope.display_relative(&path), "x/y.txt");
        assert_ne!(engine.scope(), scope);
    }
}
