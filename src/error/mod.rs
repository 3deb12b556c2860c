//! Error handling
//!
//! Defines error types and handling for the engine and server.

pub mod handlers;
pub mod types;

pub use types::*;
