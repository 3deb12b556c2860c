//! Client management
//!
//! Handles client connections, session bookkeeping, and session lifecycle.

pub mod handler;
pub mod registry;

pub use handler::handle_client;
pub use registry::{ClientRegistry, ClientSession};
