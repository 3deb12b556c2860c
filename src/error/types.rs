//! Error types
//!
//! Defines the failure taxonomy for the scoped filesystem engine and the
//! request server wrapped around it.

use std::fmt;
use std::io;

/// Coarse failure kinds reported to callers.
///
/// Several `FsError` variants may share a kind: a directory operation that
/// hits a file and a file operation that hits a directory are both
/// `NotRegularFile`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    AccessDenied,
    NotFound,
    NotRegularFile,
    AlreadyExists,
    InvalidArgument,
    IoError,
}

impl ErrorKind {
    /// Stable snake_case name used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::AccessDenied => "access_denied",
            ErrorKind::NotFound => "not_found",
            ErrorKind::NotRegularFile => "not_regular_file",
            ErrorKind::AlreadyExists => "already_exists",
            ErrorKind::InvalidArgument => "invalid_argument",
            ErrorKind::IoError => "io_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storage engine errors
#[derive(Debug)]
pub enum FsError {
    AccessDenied(String),
    NotFound(String),
    NotRegularFile(String),
    NotADirectory(String),
    AlreadyExists(String),
    InvalidArgument(String),
    Io { path: String, source: io::Error },
}

impl FsError {
    /// Wraps an I/O failure together with the path it happened on.
    pub fn io(path: impl Into<String>, source: io::Error) -> Self {
        FsError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            FsError::AccessDenied(_) => ErrorKind::AccessDenied,
            FsError::NotFound(_) => ErrorKind::NotFound,
            FsError::NotRegularFile(_) | FsError::NotADirectory(_) => ErrorKind::NotRegularFile,
            FsError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            FsError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            FsError::Io { .. } => ErrorKind::IoError,
        }
    }
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FsError::AccessDenied(p) => write!(f, "Access denied: {}", p),
            FsError::NotFound(p) => write!(f, "No such file or directory: {}", p),
            FsError::NotRegularFile(p) => write!(f, "Not a regular file: {}", p),
            FsError::NotADirectory(p) => write!(f, "Not a directory: {}", p),
            FsError::AlreadyExists(p) => write!(f, "Already exists: {}", p),
            FsError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            FsError::Io { path, source } => write!(f, "IO error on {}: {}", path, source),
        }
    }
}

impl std::error::Error for FsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FsError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Request protocol errors
#[derive(Debug)]
pub enum ProtocolError {
    Malformed(String),
    /// Carries the configured limit.
    TooLong(usize),
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::Malformed(msg) => write!(f, "Malformed request: {}", msg),
            ProtocolError::TooLong(limit) => write!(f, "Request longer than {} bytes", limit),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// General server error that encompasses all error types
#[derive(Debug)]
pub enum ServerError {
    Fs(FsError),
    Config(String),
    IoError(io::Error),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerError::Fs(e) => write!(f, "Storage error: {}", e),
            ServerError::Config(e) => write!(f, "Configuration error: {}", e),
            ServerError::IoError(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for ServerError {}

impl From<FsError> for ServerError {
    fn from(error: FsError) -> Self {
        ServerError::Fs(error)
    }
}

impl From<config::ConfigError> for ServerError {
    fn from(error: config::ConfigError) -> Self {
        ServerError::Config(error.to_string())
    }
}

impl From<io::Error> for ServerError {
    fn from(error: io::Error) -> Self {
        ServerError::IoError(error)
    }
}
