//! Request parsing
//!
//! Turns one raw input line into a [`Request`].

use crate::error::ProtocolError;
use crate::protocol::Request;

/// Parses a single request line.
pub fn parse_request(raw: &str) -> Result<Request, ProtocolError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ProtocolError::Malformed("empty request".into()));
    }

    serde_json::from_str(trimmed).map_err(|e| ProtocolError::Malformed(e.to_string()))
}
