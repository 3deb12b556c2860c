//! Response handling
//!
//! Defines response codes and the JSON line written back for every request.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::FsError;
use crate::error::handlers::error_to_status_code;

/// Response codes
pub const OK: u16 = 200;
pub const READY: u16 = 220;
pub const GOODBYE: u16 = 221;
pub const TOO_MANY_CLIENTS: u16 = 421;
pub const ACTION_ABORTED: u16 = 451;
pub const BAD_REQUEST: u16 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Error,
}

/// One response line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub code: u16,
    pub status: Status,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
}

impl Response {
    pub fn ok(message: impl Into<String>) -> Self {
        Self::with_code(OK, message)
    }

    pub fn ok_with_data(message: impl Into<String>, data: Value) -> Self {
        Self {
            data,
            ..Self::ok(message)
        }
    }

    pub fn with_code(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            status: Status::Ok,
            message: message.into(),
            kind: None,
            data: Value::Null,
        }
    }

    pub fn error(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            status: Status::Error,
            message: message.into(),
            kind: None,
            data: Value::Null,
        }
    }

    pub fn from_fs_error(err: &FsError) -> Self {
        Self {
            kind: Some(err.kind().as_str().to_string()),
            ..Self::error(error_to_status_code(err), err.to_string())
        }
    }

    /// Serializes the response as a single `\n`-terminated line.
    pub fn to_line(&self) -> String {
        let mut line = serde_json::to_string(self).unwrap_or_else(|e| {
            format!(
                r#"{{"code":{},"status":"error","message":"unserializable response: {}"}}"#,
                ACTION_ABORTED, e
            )
        });
        line.push('\n');
        line
    }
}
