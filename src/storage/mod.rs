//! Scoped file system storage
//!
//! Every file and directory operation is confined to a single root directory
//! and content changes are written atomically.

pub mod atomic;
pub mod dir_ops;
pub mod engine;
pub mod file_ops;
pub mod filesystem;
pub mod results;
pub mod search;
pub mod validation;

pub use atomic::safe_write;
pub use engine::{DEFAULT_ROOT, FsEngine, RootScope};
pub use results::{ContentMatches, CountResult};
pub use validation::{clean_path, is_confined, is_valid_file_name, parse_permissions};
