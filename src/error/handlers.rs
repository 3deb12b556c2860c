//! Error handlers
//!
//! Logging and status-code mapping for errors crossing the request boundary.

use crate::error::types::{ErrorKind, FsError, ServerError};
use log::error;

/// Handle a server error
pub fn handle_error(err: &ServerError) {
    error!("Server Error: {}", err);
}

/// Convert a storage error to a response code
pub fn error_to_status_code(err: &FsError) -> u16 {
    match err.kind() {
        ErrorKind::AccessDenied => 550,
        ErrorKind::NotFound => 550,
        ErrorKind::NotRegularFile => 550,
        ErrorKind::AlreadyExists => 553,
        ErrorKind::InvalidArgument => 553,
        ErrorKind::IoError => 451,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_status_codes_follow_kind() {
        assert_eq!(error_to_status_code(&FsError::AccessDenied("x".into())), 550);
        assert_eq!(error_to_status_code(&FsError::NotADirectory("x".into())), 550);
        assert_eq!(error_to_status_code(&FsError::AlreadyExists("x".into())), 553);
        assert_eq!(
            error_to_status_code(&FsError::io("x", io::Error::other("disk full"))),
            451
        );
    }

    #[test]
    fn test_not_a_directory_shares_kind() {
        assert_eq!(
            FsError::NotADirectory("d".into()).kind(),
            ErrorKind::NotRegularFile
        );
    }
}
