//! rootfs server - Entry Point
//!
//! Serves scoped filesystem operations over a line-delimited JSON protocol.

use clap::Parser;
use log::{error, info};

use rootfs::Server;
use rootfs::config::ServerConfig;
use rootfs::error::{ServerError, handlers::handle_error};

#[derive(Parser, Debug)]
#[command(name = "rootfs", version, about = "Scoped filesystem operation server")]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Override the confinement root
    #[arg(short, long)]
    root: Option<String>,

    /// Override the bind address
    #[arg(short, long)]
    bind: Option<String>,

    /// Override the listening port
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() {
    // Initialize the logger (env_logger picks up RUST_LOG environment variable)
    env_logger::init();

    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            handle_error(&e);
            std::process::exit(1);
        }
    };

    info!("Launching rootfs server...");

    let (startup, runtime) = config.split();
    match Server::new(startup, runtime).await {
        Ok(server) => server.start().await,
        Err(e) => {
            error!("Server startup failed");
            handle_error(&e);
            std::process::exit(1);
        }
    }
}

fn load_config(cli: &Cli) -> Result<ServerConfig, ServerError> {
    let mut config = ServerConfig::load(cli.config.as_deref())?;

    if let Some(root) = &cli.root {
        config.server_root = root.clone();
    }
    if let Some(bind) = &cli.bind {
        config.bind_address = bind.clone();
    }
    if let Some(port) = cli.port {
        config.port = port;
    }

    config.validate()?;
    Ok(config)
}
