//! Module `commands`
//!
//! Defines the requests a client can send and the result type produced by
//! executing one.

use serde::Deserialize;

use crate::protocol::responses::Response;

/// A single request, sent by the client as one JSON object per line.
///
/// The `op` field selects the variant; the remaining fields are its
/// arguments. Paths are interpreted relative to the server root.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    List {
        #[serde(default)]
        directory: String,
        #[serde(default)]
        include_subdirectories: bool,
    },
    Read {
        path: String,
    },
    Write {
        path: String,
        content: String,
    },
    Edit {
        path: String,
        content: String,
    },
    Delete {
        path: String,
    },
    Move {
        source: String,
        destination: String,
    },
    Copy {
        source: String,
        destination: String,
    },
    Chmod {
        path: String,
        permissions: String,
    },
    Mkdir {
        path: String,
    },
    Rmdir {
        path: String,
    },
    MoveDir {
        source: String,
        destination: String,
    },
    CopyDir {
        source: String,
        destination: String,
    },
    ChmodDir {
        path: String,
        permissions: String,
    },
    Count {
        #[serde(default)]
        directory: String,
    },
    FindByName {
        query: String,
    },
    FindByContent {
        query: String,
    },
    Append {
        path: String,
        content: String,
    },
    Replace {
        path: String,
        old: String,
        new: String,
    },
    CreateNew {
        path: String,
        content: String,
    },
    Root,
    Quit,
}

/// Represents the outcome status of executing a request.
#[derive(Debug, PartialEq)]
pub enum CommandStatus {
    Success,
    Failure(String),
    CloseConnection,
}

/// Struct encapsulating the full result of a request execution.
#[derive(Debug)]
pub struct CommandResult {
    pub status: CommandStatus,
    pub response: Response,
}
