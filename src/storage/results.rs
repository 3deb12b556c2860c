//! Storage result types
//!
//! Defines result structures returned by storage operations.

use serde::Serialize;

/// Result of counting the immediate entries of a directory
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CountResult {
    /// Number of immediate entries, directories included.
    pub file_count: usize,
    /// Combined size in bytes of the immediate regular files.
    pub total_size: u64,
}

/// Result of a content search
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContentMatches {
    /// Root-relative paths of files containing the query.
    pub matches: Vec<String>,
    /// Root-relative paths of files that could not be read.
    pub skipped: Vec<String>,
}
