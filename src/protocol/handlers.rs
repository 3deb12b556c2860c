//! Request handlers
//!
//! Dispatches parsed requests to the filesystem engine and converts the
//! outcome into a response. These functions block on disk I/O and are run
//! on tokio's blocking pool by the client handler.

use log::{error, info};
use serde_json::{Value, json};

use crate::error::FsError;
use crate::protocol::responses::{GOODBYE, Response};
use crate::protocol::{CommandResult, CommandStatus, Request};
use crate::storage::FsEngine;

/// Executes one request against `engine`.
pub fn handle_request(engine: &FsEngine, request: Request) -> CommandResult {
    let outcome = match request {
        Request::Quit => {
            return CommandResult {
                status: CommandStatus::CloseConnection,
                response: Response::with_code(GOODBYE, "Goodbye"),
            };
        }
        Request::Root => Ok(Response::ok_with_data(
            "root",
            json!(engine.root().display().to_string()),
        )),
        Request::List {
            directory,
            include_subdirectories,
        } => engine
            .list(&directory, include_subdirectories)
            .map(|entries| Response::ok_with_data("list files success", json!(entries))),
        Request::Read { path } => engine
            .read(&path)
            .map(|content| Response::ok_with_data("read file success", Value::String(content))),
        Request::Write { path, content } => engine
            .write(&path, &content)
            .map(|_| Response::ok("write file success")),
        Request::Edit { path, content } => engine
            .edit(&path, &content)
            .map(|_| Response::ok("edit file success")),
        Request::Delete { path } => engine
            .delete(&path)
            .map(|_| Response::ok("delete file success")),
        Request::Move {
            source,
            destination,
        } => engine
            .move_file(&source, &destination)
            .map(|_| Response::ok("move file success")),
        Request::Copy {
            source,
            destination,
        } => engine
            .copy_file(&source, &destination)
            .map(|_| Response::ok("copy file success")),
        Request::Chmod { path, permissions } => engine
            .chmod(&path, &permissions)
            .map(|_| Response::ok("change file permissions success")),
        Request::Mkdir { path } => engine
            .mkdir(&path)
            .map(|_| Response::ok("create directory success")),
        Request::Rmdir { path } => engine
            .rmdir(&path)
            .map(|_| Response::ok("delete directory success")),
        Request::MoveDir {
            source,
            destination,
        } => engine
            .move_dir(&source, &destination)
            .map(|_| Response::ok("move directory success")),
        Request::CopyDir {
            source,
            destination,
        } => engine
            .copy_dir(&source, &destination)
            .map(|_| Response::ok("copy directory success")),
        Request::ChmodDir { path, permissions } => engine
            .chmod_dir(&path, &permissions)
            .map(|_| Response::ok("change directory permissions success")),
        Request::Count { directory } => engine.count(&directory).map(|count| {
            Response::ok_with_data(
                format!(
                    "number of files: {}, total size: {}",
                    count.file_count, count.total_size
                ),
                json!(count),
            )
        }),
        Request::FindByName { query } => engine
            .find_by_name(&query)
            .map(|found| Response::ok_with_data("find file success", json!(found))),
        Request::FindByContent { query } => engine
            .find_by_content(&query)
            .map(|found| Response::ok_with_data("find file content success", json!(found))),
        Request::Append { path, content } => engine
            .append(&path, &content)
            .map(|_| Response::ok("append file content success")),
        Request::Replace { path, old, new } => engine.replace(&path, &old, &new).map(|n| {
            Response::ok_with_data("replace file content success", json!({ "replaced": n }))
        }),
        Request::CreateNew { path, content } => engine
            .create_new(&path, &content)
            .map(|_| Response::ok(format!("create new file success {}", path))),
    };

    into_result(outcome)
}

fn into_result(outcome: Result<Response, FsError>) -> CommandResult {
    match outcome {
        Ok(response) => {
            info!("{} {}", response.code, response.message);
            CommandResult {
                status: CommandStatus::Success,
                response,
            }
        }
        Err(e) => {
            error!("Request failed: {}", e);
            CommandResult {
                status: CommandStatus::Failure(e.to_string()),
                response: Response::from_fs_error(&e),
            }
        }
    }
}
