//! Directory operations
//!
//! Listing, creation, removal, move, recursive copy, permission changes and
//! entry counting for directories under the engine root.

use log::{debug, error, info, warn};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

use crate::error::FsError;
use crate::storage::engine::{FsEngine, RootScope};
use crate::storage::file_ops::copy_resolved_file;
use crate::storage::filesystem::{entry_exists, mode_of, require_directory, set_mode};
use crate::storage::results::CountResult;
use crate::storage::validation::{parse_permissions, to_slash, validate_file_name};

impl FsEngine {
    /// Lists a directory as root-relative `/`-separated paths.
    ///
    /// Entries come depth first, sorted by name within each directory. Without
    /// `include_subdirectories` only the immediate entries are returned:
    /// subdirectories are listed but not descended into.
    ///
    /// The listed directory itself is never part of the result, and the flat
    /// listing does not reach into subdirectories for their files.
    pub fn list(&self, directory: &str, include_subdirectories: bool) -> Result<Vec<String>, FsError> {
        let scope = self.scope();
        let base = scope.resolve_existing(directory)?;
        require_directory(&base, directory)?;

        let mut walker = WalkDir::new(&base).min_depth(1).sort_by_file_name();
        if !include_subdirectories {
            walker = walker.max_depth(1);
        }

        let mut entries = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|e| walk_error(&scope, directory, e))?;
            entries.push(scope.display_relative(entry.path()));
        }

        debug!("Listed {} - {} entries", base.display(), entries.len());
        Ok(entries)
    }

    /// Creates a directory and any missing parents. Succeeds without change
    /// if the directory already exists.
    ///
    /// Only the components that still have to be created are checked against
    /// the file-name rules.
    pub fn mkdir(&self, path: &str) -> Result<(), FsError> {
        let scope = self.scope();
        let target = scope.resolve(path)?;

        let mut current = scope.root().to_path_buf();
        let rel = scope.display_relative(&target);
        for component in Path::new(&rel).components() {
            if let Component::Normal(name) = component {
                current.push(name);
                if !is_directory(&current) {
                    validate_file_name(&name.to_string_lossy())?;
                }
            }
        }

        match fs::symlink_metadata(&target) {
            Ok(metadata) if metadata.is_dir() => {
                debug!("Directory {} already exists", target.display());
                return Ok(());
            }
            Ok(_) => return Err(FsError::AlreadyExists(path.to_string())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(FsError::io(path, e)),
        }

        fs::create_dir_all(&target).map_err(|e| FsError::io(path, e))?;
        info!("Created directory {}", target.display());
        Ok(())
    }

    /// Removes a directory and everything below it.
    pub fn rmdir(&self, path: &str) -> Result<(), FsError> {
        let target = self.scope().resolve_entry(path)?;
        require_directory(&target, path)?;

        fs::remove_dir_all(&target).map_err(|e| {
            error!("Failed to delete directory {}: {}", target.display(), e);
            FsError::io(path, e)
        })?;

        info!("Deleted directory {}", target.display());
        Ok(())
    }

    /// Renames a directory. The destination must not exist yet.
    pub fn move_dir(&self, source: &str, destination: &str) -> Result<(), FsError> {
        let (src, dst) = self.scope().resolve_entry_pair(source, destination)?;
        require_directory(&src, source)?;

        if dst.starts_with(&src) {
            return Err(FsError::InvalidArgument(format!(
                "cannot move {} into itself ({})",
                source, destination
            )));
        }
        if entry_exists(&dst) {
            return Err(FsError::AlreadyExists(destination.to_string()));
        }

        fs::rename(&src, &dst).map_err(|e| FsError::io(source, e))?;
        info!("Moved directory {} -> {}", src.display(), dst.display());
        Ok(())
    }

    /// Copies a directory tree.
    ///
    /// The destination may already exist; existing files with the same names
    /// are replaced. It may not lie inside the source. The source is checked
    /// for symlinks and other non-regular entries before anything is written,
    /// and directories the copy created are removed again if it fails.
    pub fn copy_dir(&self, source: &str, destination: &str) -> Result<(), FsError> {
        let scope = self.scope();
        let (src, dst) = scope.resolve_pair(source, destination)?;
        require_directory(&src, source)?;

        if dst.starts_with(&src) {
            return Err(FsError::InvalidArgument(format!(
                "cannot copy {} into itself ({})",
                source, destination
            )));
        }
        check_copyable(&scope, &src, source)?;

        let created = first_missing(&scope, &dst);
        if let Err(e) = copy_resolved_dir(&src, &dst, source, destination) {
            if let Some(created) = created {
                warn!("Copy into {} failed, removing {}", dst.display(), created.display());
                if let Err(cleanup) = fs::remove_dir_all(&created) {
                    error!("Failed to remove {}: {}", created.display(), cleanup);
                }
            }
            return Err(e);
        }

        info!("Copied directory {} -> {}", src.display(), dst.display());
        Ok(())
    }

    /// Sets the permission bits of a directory from an octal string.
    pub fn chmod_dir(&self, path: &str, permissions: &str) -> Result<(), FsError> {
        let target = self.scope().resolve_existing(path)?;
        require_directory(&target, path)?;
        let mode = parse_permissions(permissions)?;

        set_mode(&target, mode).map_err(|e| FsError::io(path, e))?;

        info!("Changed mode of directory {} to {:o}", target.display(), mode);
        Ok(())
    }

    /// Counts the immediate entries of a directory and sums the sizes of the
    /// regular files among them.
    pub fn count(&self, directory: &str) -> Result<CountResult, FsError> {
        let base = self.scope().resolve_existing(directory)?;
        require_directory(&base, directory)?;
        let mut result = CountResult::default();
        for entry in fs::read_dir(&base).map_err(|e| FsError::io(directory, e))? {
            let entry = entry.map_err(|e| FsError::io(directory, e))?;
            result.file_count += 1;

            let file_type = entry.file_type().map_err(|e| FsError::io(directory, e))?;
            if file_type.is_file() {
                let metadata = entry.metadata().map_err(|e| FsError::io(directory, e))?;
                result.total_size += metadata.len();
            }
        }

        debug!(
            "Counted {}: {} entries, {} bytes",
            base.display(),
            result.file_count,
            result.total_size
        );
        Ok(result)
    }
}

/// Rejects a copy source whose subtree holds anything but directories and
/// regular files.
fn check_copyable(scope: &RootScope, src: &Path, source: &str) -> Result<(), FsError> {
    for entry in WalkDir::new(src).min_depth(1) {
        let entry = entry.map_err(|e| walk_error(scope, source, e))?;
        let file_type = entry.file_type();
        if !file_type.is_dir() && !file_type.is_file() {
            let rel = entry.path().strip_prefix(src).map(to_slash).unwrap_or_default();
            return Err(FsError::NotRegularFile(join_label(source, &rel)));
        }
    }
    Ok(())
}

/// The outermost ancestor of `path` (itself included) that does not exist
/// yet, stopping at the root.
fn first_missing(scope: &RootScope, path: &Path) -> Option<PathBuf> {
    path.ancestors()
        .take_while(|p| *p != scope.root() && p.starts_with(scope.root()) && !entry_exists(p))
        .last()
        .map(Path::to_path_buf)
}

fn is_directory(path: &Path) -> bool {
    fs::symlink_metadata(path).map(|m| m.is_dir()).unwrap_or(false)
}

/// Pre-order recursive copy: the destination directory exists before any of
/// its children are copied.
fn copy_resolved_dir(src: &Path, dst: &Path, source: &str, destination: &str) -> Result<(), FsError> {
    let metadata = require_directory(src, source)?;
    fs::create_dir_all(dst).map_err(|e| FsError::io(destination, e))?;

    let mut children = fs::read_dir(src)
        .map_err(|e| FsError::io(source, e))?
        .collect::<Result<Vec<_>, io::Error>>()
        .map_err(|e| FsError::io(source, e))?;
    children.sort_by_key(|entry| entry.file_name());

    for child in children {
        let name = child.file_name();
        let child_src = src.join(&name);
        let child_dst = dst.join(&name);
        let child_source = join_label(source, &name.to_string_lossy());
        let child_destination = join_label(destination, &name.to_string_lossy());

        let file_type = child.file_type().map_err(|e| FsError::io(&child_source, e))?;
        if file_type.is_dir() {
            copy_resolved_dir(&child_src, &child_dst, &child_source, &child_destination)?;
        } else {
            copy_resolved_file(&child_src, &child_dst, &child_source, &child_destination)?;
        }
    }

    // Mode goes on last so a read-only source directory can still be filled.
    set_mode(dst, mode_of(&metadata)).map_err(|e| FsError::io(destination, e))?;
    Ok(())
}

fn join_label(parent: &str, name: &str) -> String {
    let parent = parent.trim_end_matches(['/', '\\']);
    if parent.is_empty() || parent == "." {
        name.to_string()
    } else {
        format!("{}/{}", parent, name)
    }
}

fn walk_error(scope: &RootScope, directory: &str, error: walkdir::Error) -> FsError {
    let label = error
        .path()
        .map(|p| scope.display_relative(p))
        .unwrap_or_else(|| directory.to_string());
    FsError::io(label, io::Error::from(error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{TempDir, tempdir};

    fn sandbox() -> (TempDir, FsEngine) {
        let dir = tempdir().unwrap();
        let engine = FsEngine::new(dir.path()).unwrap();
        (dir, engine)
    }

    fn populate(root: &Path) {
        fs::create_dir_all(root.join("docs/deep")).unwrap();
        fs::write(root.join("b.txt"), "b").unwrap();
        fs::write(root.join("a.txt"), "a").unwrap();
        fs::write(root.join("docs/readme.md"), "readme").unwrap();
        fs::write(root.join("docs/deep/notes.txt"), "notes").unwrap();
    }

    #[test]
    fn test_list_recursive_order() {
        let (dir, engine) = sandbox();
        populate(dir.path());

        let entries = engine.list("", true).unwrap();
        assert_eq!(
            entries,
            vec![
                "a.txt",
                "b.txt",
                "docs",
                "docs/deep",
                "docs/deep/notes.txt",
                "docs/readme.md"
            ]
        );
    }

    #[test]
    fn test_list_top_level_only() {
        let (dir, engine) = sandbox();
        populate(dir.path());

        assert_eq!(engine.list(".", false).unwrap(), vec!["a.txt", "b.txt", "docs"]);
        assert_eq!(
            engine.list("docs", false).unwrap(),
            vec!["docs/deep", "docs/readme.md"]
        );
    }

    #[test]
    fn test_list_errors() {
        let (dir, engine) = sandbox();
        populate(dir.path());

        assert!(matches!(engine.list("..", true), Err(FsError::AccessDenied(_))));
        assert!(matches!(engine.list("missing", true), Err(FsError::NotFound(_))));
        assert!(matches!(engine.list("a.txt", true), Err(FsError::NotADirectory(_))));
    }

    #[test]
    fn test_mkdir_is_idempotent() {
        let (dir, engine) = sandbox();

        engine.mkdir("x/y/z").unwrap();
        engine.mkdir("x/y/z").unwrap();
        assert!(dir.path().join("x/y/z").is_dir());
        assert_eq!(fs::read_dir(dir.path().join("x/y")).unwrap().count(), 1);
    }

    #[test]
    fn test_mkdir_rejections() {
        let (dir, engine) = sandbox();
        fs::write(dir.path().join("taken"), "file").unwrap();

        assert!(matches!(engine.mkdir("taken"), Err(FsError::AlreadyExists(_))));
        assert!(matches!(engine.mkdir("ok/.git"), Err(FsError::InvalidArgument(_))));
        assert!(matches!(engine.mkdir("../out"), Err(FsError::AccessDenied(_))));
        assert!(!dir.path().join("ok").exists());
    }

    #[test]
    fn test_mkdir_below_existing_hidden_directory() {
        let (dir, engine) = sandbox();
        fs::create_dir(dir.path().join(".config")).unwrap();

        engine.mkdir(".config/app").unwrap();
        assert!(dir.path().join(".config/app").is_dir());
        engine.mkdir(".config").unwrap();

        assert!(matches!(engine.mkdir(".hidden/x"), Err(FsError::InvalidArgument(_))));
        assert!(matches!(
            engine.mkdir(".config/.cache"),
            Err(FsError::InvalidArgument(_))
        ));
        assert!(!dir.path().join(".hidden").exists());
        assert!(!dir.path().join(".config/.cache").exists());
    }

    #[test]
    fn test_rmdir() {
        let (dir, engine) = sandbox();
        populate(dir.path());

        assert!(matches!(engine.rmdir("a.txt"), Err(FsError::NotADirectory(_))));
        assert!(matches!(engine.rmdir(""), Err(FsError::AccessDenied(_))));

        engine.rmdir("docs").unwrap();
        assert!(!dir.path().join("docs").exists());
        assert!(dir.path().join("a.txt").exists());
    }

    #[test]
    fn test_move_dir() {
        let (dir, engine) = sandbox();
        populate(dir.path());

        engine.move_dir("docs", "archive").unwrap();
        assert!(!dir.path().join("docs").exists());
        assert_eq!(
            fs::read_to_string(dir.path().join("archive/deep/notes.txt")).unwrap(),
            "notes"
        );
    }

    #[test]
    fn test_move_dir_checks_both_endpoints() {
        let (dir, engine) = sandbox();
        populate(dir.path());

        assert!(matches!(
            engine.move_dir("docs", "../stolen"),
            Err(FsError::AccessDenied(_))
        ));
        assert!(matches!(
            engine.move_dir("../elsewhere", "docs2"),
            Err(FsError::AccessDenied(_))
        ));
        assert!(matches!(
            engine.move_dir("docs", "docs/deep/inner"),
            Err(FsError::InvalidArgument(_))
        ));
        assert!(matches!(
            engine.move_dir("a.txt", "c"),
            Err(FsError::NotADirectory(_))
        ));
        fs::create_dir(dir.path().join("existing")).unwrap();
        assert!(matches!(
            engine.move_dir("docs", "existing"),
            Err(FsError::AlreadyExists(_))
        ));
        assert!(dir.path().join("docs/readme.md").exists());
    }

    #[test]
    fn test_copy_dir_is_complete() {
        let (dir, engine) = sandbox();
        populate(dir.path());

        engine.copy_dir("docs", "backup/docs").unwrap();

        let original = engine.list("docs", true).unwrap();
        for rel in original {
            let suffix = rel.strip_prefix("docs/").unwrap();
            let src = dir.path().join("docs").join(suffix);
            let dst = dir.path().join("backup/docs").join(suffix);
            if src.is_dir() {
                assert!(dst.is_dir(), "{} missing", dst.display());
            } else {
                assert_eq!(fs::read(&src).unwrap(), fs::read(&dst).unwrap());
            }
        }
        assert!(dir.path().join("docs/readme.md").exists());
    }

    #[test]
    fn test_copy_dir_rejections() {
        let (dir, engine) = sandbox();
        populate(dir.path());

        assert!(matches!(
            engine.copy_dir("docs", "docs/deep/again"),
            Err(FsError::InvalidArgument(_))
        ));
        assert!(matches!(
            engine.copy_dir("a.txt", "x"),
            Err(FsError::NotADirectory(_))
        ));
        assert!(matches!(
            engine.copy_dir("docs", "../outside"),
            Err(FsError::AccessDenied(_))
        ));
        assert!(!dir.path().join("x").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_dir_with_symlink_writes_nothing() {
        let (dir, engine) = sandbox();
        let src = dir.path().join("src");
        fs::create_dir(&src).unwrap();
        fs::write(src.join("a.txt"), "a").unwrap();
        std::os::unix::fs::symlink(src.join("a.txt"), src.join("b_link")).unwrap();
        fs::write(src.join("c.txt"), "c").unwrap();

        match engine.copy_dir("src", "dst") {
            Err(FsError::NotRegularFile(label)) => assert_eq!(label, "src/b_link"),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(!dir.path().join("dst").exists());

        match engine.copy_dir("src", "backup/nested/dst") {
            Err(FsError::NotRegularFile(_)) => {}
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(!dir.path().join("backup").exists());
    }

    #[test]
    fn test_first_missing_stops_at_existing_ancestor() {
        let (dir, engine) = sandbox();
        populate(dir.path());
        let scope = engine.scope();

        assert_eq!(
            first_missing(&scope, &dir.path().join("docs/new/deeper")),
            Some(dir.path().join("docs/new"))
        );
        assert_eq!(first_missing(&scope, &dir.path().join("docs")), None);
        assert_eq!(first_missing(&scope, scope.root()), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_dir_keeps_directory_mode() {
        use std::os::unix::fs::PermissionsExt;

        let (dir, engine) = sandbox();
        populate(dir.path());
        set_mode(&dir.path().join("docs/deep"), 0o750).unwrap();

        engine.copy_dir("docs", "copy").unwrap();
        let mode = fs::metadata(dir.path().join("copy/deep"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o750);
    }

    #[cfg(unix)]
    #[test]
    fn test_chmod_dir() {
        use std::os::unix::fs::PermissionsExt;

        let (dir, engine) = sandbox();
        populate(dir.path());

        engine.chmod_dir("docs", "700").unwrap();
        let mode = fs::metadata(dir.path().join("docs")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);

        assert!(matches!(
            engine.chmod_dir("docs", "abc"),
            Err(FsError::InvalidArgument(_))
        ));
        assert!(matches!(
            engine.chmod_dir("a.txt", "755"),
            Err(FsError::NotADirectory(_))
        ));
    }

    #[test]
    fn test_count_sums_regular_files() {
        let (dir, engine) = sandbox();
        fs::create_dir(dir.path().join("a")).unwrap();
        fs::write(dir.path().join("a/ten.bin"), vec![0u8; 10]).unwrap();
        fs::write(dir.path().join("a/twenty.bin"), vec![0u8; 20]).unwrap();

        let result = engine.count("a").unwrap();
        assert_eq!(
            result,
            CountResult {
                file_count: 2,
                total_size: 30
            }
        );

        fs::create_dir(dir.path().join("a/sub")).unwrap();
        fs::write(dir.path().join("a/sub/ignored.bin"), vec![0u8; 99]).unwrap();
        let result = engine.count("a").unwrap();
        assert_eq!(result.file_count, 3);
        assert_eq!(result.total_size, 30);
    }

    #[test]
    fn test_join_label() {
        assert_eq!(join_label("", "x"), "x");
        assert_eq!(join_label(".", "x"), "x");
        assert_eq!(join_label("a/b/", "x"), "a/b/x");
    }
}
