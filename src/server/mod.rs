//! Server core functionality
//!
//! Owns the listener, the shared filesystem engine and the client registry.

pub mod core;

pub use core::Server;
