//! Configuration management for the rootfs server
//!
//! Separates startup configuration (requires restart) from runtime
//! configuration (shared behind a lock so it can change while serving).

use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::storage::DEFAULT_ROOT;

/// Prefix of environment variables overriding file settings, e.g.
/// `ROOTFS_SERVER_ROOT=/srv/files`.
pub const ENV_PREFIX: &str = "ROOTFS";

/// Config file looked up when no explicit path is given (`config.toml`).
pub const DEFAULT_CONFIG_FILE: &str = "config";

/// Complete server configuration as loaded from file and environment
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub server_root: String,
    pub max_request_length: usize,
    pub max_clients: usize,
}

/// Configuration that requires a restart to take effect
#[derive(Debug, Clone)]
pub struct StartupConfig {
    /// IP address to bind the request listener
    pub bind_address: String,

    /// Port for the request listener; 0 picks a free port
    pub port: u16,

    /// Confinement root for every filesystem operation
    pub server_root: String,

    /// Longest accepted request line in bytes
    pub max_request_length: usize,
}

/// Configuration that can be updated while the server is running
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Maximum concurrent clients
    pub max_clients: usize,
}

/// Thread-safe runtime configuration wrapper
pub type SharedRuntimeConfig = Arc<RwLock<RuntimeConfig>>;

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 2121,
            server_root: DEFAULT_ROOT.to_string(),
            max_request_length: 16 * 1024 * 1024,
            max_clients: 10,
        }
    }
}

impl ServerConfig {
    /// Load configuration from an optional TOML file with environment
    /// overrides. Missing keys fall back to [`ServerConfig::default`].
    pub fn load(config_path: Option<&str>) -> Result<Self, config::ConfigError> {
        let defaults = Self::default();

        let file = match config_path {
            Some(path) => File::with_name(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let settings = Config::builder()
            .set_default("bind_address", defaults.bind_address)?
            .set_default("port", i64::from(defaults.port))?
            .set_default("server_root", defaults.server_root)?
            .set_default("max_request_length", defaults.max_request_length as i64)?
            .set_default("max_clients", defaults.max_clients as i64)?
            .add_source(file)
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;

        let config: ServerConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Split into startup (immutable) and runtime (mutable) parts
    pub fn split(self) -> (StartupConfig, SharedRuntimeConfig) {
        let startup = StartupConfig {
            bind_address: self.bind_address,
            port: self.port,
            server_root: self.server_root,
            max_request_length: self.max_request_length,
        };
        let runtime = Arc::new(RwLock::new(RuntimeConfig {
            max_clients: self.max_clients,
        }));
        (startup, runtime)
    }

    /// Validation for all configuration values
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.bind_address.trim().is_empty() {
            return Err(config::ConfigError::Message(
                "bind_address cannot be empty".into(),
            ));
        }

        if self.server_root.trim().is_empty() {
            return Err(config::ConfigError::Message(
                "server_root cannot be empty".into(),
            ));
        }

        if self.max_request_length < 64 {
            return Err(config::ConfigError::Message(
                "max_request_length must be at least 64 bytes".into(),
            ));
        }

        if self.max_clients == 0 {
            return Err(config::ConfigError::Message(
                "max_clients must be greater than 0".into(),
            ));
        }

        Ok(())
    }
}

impl StartupConfig {
    /// Get bind address and port as socket address
    pub fn listen_socket(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    /// Get server root as PathBuf
    pub fn server_root_path(&self) -> PathBuf {
        PathBuf::from(&self.server_root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_are_valid() {
        assert!(ServerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
bind_address = "0.0.0.0"
port = 9000
server_root = "/srv/sandbox"
"#
        )
        .unwrap();

        let config = ServerConfig::load(Some(&file.path().to_string_lossy())).unwrap();
        assert_eq!(config.bind_address, "0.0.0.0");
        assert_eq!(config.port, 9000);
        assert_eq!(config.server_root, "/srv/sandbox");
        assert_eq!(config.max_clients, 10);

        let (startup, runtime) = config.split();
        assert_eq!(startup.listen_socket(), "0.0.0.0:9000");
        assert_eq!(startup.server_root_path(), PathBuf::from("/srv/sandbox"));
        assert_eq!(runtime.blocking_read().max_clients, 10);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "max_clients = 0").unwrap();
        assert!(ServerConfig::load(Some(&file.path().to_string_lossy())).is_err());

        let config = ServerConfig {
            server_root: "  ".into(),
            ..ServerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let file = NamedTempFile::new().unwrap();
        let missing = file.path().with_extension("absent.toml");
        assert!(ServerConfig::load(Some(&missing.to_string_lossy())).is_err());
    }
}
