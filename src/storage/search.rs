//! Search operations
//!
//! Name and content substring search over the whole root subtree. Entries the
//! walk cannot read are logged and passed over; the search itself only fails
//! on an empty query.

use log::{debug, warn};
use std::fs;
use std::io;
use std::path::Path;
use walkdir::{DirEntry, WalkDir};

use crate::error::FsError;
use crate::storage::engine::{FsEngine, RootScope};
use crate::storage::results::ContentMatches;
use crate::storage::validation::is_confined;

impl FsEngine {
    /// Finds every entry below the root whose name contains `query`.
    pub fn find_by_name(&self, query: &str) -> Result<Vec<String>, FsError> {
        require_query(query)?;
        let scope = self.scope();
        let found = scan_names(&scope, query, walk(scope.root()));

        debug!("Name search for {:?}: {} match(es)", query, found.len());
        Ok(found)
    }

    /// Finds every regular file below the root whose content contains
    /// `query`. Files and directories that cannot be read are reported in
    /// [`ContentMatches::skipped`] rather than failing the search.
    pub fn find_by_content(&self, query: &str) -> Result<ContentMatches, FsError> {
        require_query(query)?;
        let scope = self.scope();
        let result = scan_contents(&scope, query, walk(scope.root()), |path| fs::read(path));

        debug!(
            "Content search for {:?}: {} match(es), {} skipped",
            query,
            result.matches.len(),
            result.skipped.len()
        );
        Ok(result)
    }
}

fn require_query(query: &str) -> Result<(), FsError> {
    if query.is_empty() {
        return Err(FsError::InvalidArgument("search query is empty".into()));
    }
    Ok(())
}

fn walk(root: &Path) -> walkdir::IntoIter {
    WalkDir::new(root).min_depth(1).sort_by_file_name().into_iter()
}

fn scan_names<I>(scope: &RootScope, query: &str, entries: I) -> Vec<String>
where
    I: IntoIterator<Item = walkdir::Result<DirEntry>>,
{
    let mut found = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                skipped_entry(scope, &e, "name");
                continue;
            }
        };
        if entry.file_name().to_string_lossy().contains(query) {
            found.push(scope.display_relative(entry.path()));
        }
    }
    found
}

fn scan_contents<I, F>(scope: &RootScope, query: &str, entries: I, read_file: F) -> ContentMatches
where
    I: IntoIterator<Item = walkdir::Result<DirEntry>>,
    F: Fn(&Path) -> io::Result<Vec<u8>>,
{
    let needle = query.as_bytes();
    let mut result = ContentMatches::default();

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                if let Some(rel) = skipped_entry(scope, &e, "content") {
                    result.skipped.push(rel);
                }
                continue;
            }
        };
        if !entry.file_type().is_file() || !is_confined(scope.root(), entry.path()) {
            continue;
        }

        let rel = scope.display_relative(entry.path());
        match read_file(entry.path()) {
            Ok(content) => {
                if contains(&content, needle) {
                    result.matches.push(rel);
                }
            }
            Err(e) => {
                warn!("Skipping unreadable file {} during content search: {}", rel, e);
                result.skipped.push(rel);
            }
        }
    }

    result
}

/// Logs a walk failure and returns the root-relative path it happened on.
fn skipped_entry(scope: &RootScope, error: &walkdir::Error, search: &str) -> Option<String> {
    let rel = error.path().map(|path| scope.display_relative(path));
    warn!(
        "Skipping {} during {} search: {}",
        rel.as_deref().unwrap_or("<unknown>"),
        search,
        error
    );
    rel
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    needle.len() <= haystack.len() && haystack.windows(needle.len()).any(|window| window == needle)
}
