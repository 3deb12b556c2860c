//! Request protocol
//!
//! Handles request parsing, dispatch to the engine, and response generation.
//! The wire format is one JSON object per line in each direction.

pub mod commands;
pub mod handlers;
pub mod parser;
pub mod responses;

pub use commands::{CommandResult, CommandStatus, Request};
pub use handlers::handle_request;
pub use parser::parse_request;
pub use responses::Response;
