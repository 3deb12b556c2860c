use log::{error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

use crate::client::{ClientRegistry, handle_client};
use crate::config::{SharedRuntimeConfig, StartupConfig};
use crate::error::{FsError, ServerError};
use crate::protocol::Response;
use crate::protocol::responses::{READY, TOO_MANY_CLIENTS};
use crate::storage::FsEngine;

pub struct Server {
    client_registry: Arc<Mutex<ClientRegistry>>,
    engine: Arc<FsEngine>,
    listener: TcpListener,
    startup: StartupConfig,
    runtime: SharedRuntimeConfig,
}

impl Server {
    pub async fn new(startup: StartupConfig, runtime: SharedRuntimeConfig) -> Result<Self, ServerError> {
        let root = startup.server_root_path();
        std::fs::create_dir_all(&root).map_err(|e| {
            error!("Failed to create server root directory {}: {}", root.display(), e);
            FsError::io(root.display().to_string(), e)
        })?;

        let engine = Arc::new(FsEngine::new(&root)?);

        let socket = startup.listen_socket();
        let listener = match TcpListener::bind(&socket).await {
            Ok(listener) => {
                info!("Server bound to {}", socket);
                listener
            }
            Err(e) => {
                error!("Failed to bind to {}: {}", socket, e);
                return Err(e.into());
            }
        };

        Ok(Self {
            client_registry: Arc::new(Mutex::new(ClientRegistry::new())),
            engine,
            listener,
            startup,
            runtime,
        })
    }

    /// Address the listener actually bound, useful when the port was 0.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    pub async fn start(self) {
        info!(
            "Starting rootfs server on {} (max {} clients, root {})",
            self.startup.listen_socket(),
            self.runtime.read().await.max_clients,
            self.engine.root().display()
        );

        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    let client_registry = Arc::clone(&self.client_registry);
                    let engine = Arc::clone(&self.engine);
                    let runtime = Arc::clone(&self.runtime);
                    let max_request_length = self.startup.max_request_length;

                    // Spawn a task for each client so accept loop doesn't block
                    tokio::spawn(async move {
                        if let Err(e) = handle_new_client(
                            stream,
                            addr,
                            client_registry,
                            engine,
                            runtime,
                            max_request_length,
                        )
                        .await
                        {
                            warn!("Failed to handle client {}: {}", addr, e);
                        }
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                }
            }
        }
    }
}

/// Handles a new client: enforces the connection cap, greets, registers, and
/// hands off to the session handler.
async fn handle_new_client(
    mut stream: TcpStream,
    client_addr: SocketAddr,
    client_registry: Arc<Mutex<ClientRegistry>>,
    engine: Arc<FsEngine>,
    runtime: SharedRuntimeConfig,
    max_request_length: usize,
) -> Result<(), std::io::Error> {
    let max_clients = runtime.read().await.max_clients;

    {
        let mut clients = client_registry.lock().await;
        if !clients.try_insert(client_addr, max_clients) {
            drop(clients);
            warn!("Rejecting {}: client limit {} reached", client_addr, max_clients);
            let busy = Response::error(TOO_MANY_CLIENTS, "Too many connections. Try again later.");
            stream.write_all(busy.to_line().as_bytes()).await?;
            stream.flush().await?;
            return Ok(()); // Close connection
        }

        info!(
            "Accepted client: {} ({}/{} clients)",
            client_addr,
            clients.len(),
            max_clients
        );
    }

    let greeting = Response::with_code(READY, "Welcome to rootfs server");
    if let Err(e) = send_greeting(&mut stream, &greeting).await {
        client_registry.lock().await.remove(&client_addr);
        return Err(e);
    }

    handle_client(stream, client_addr, client_registry, engine, max_request_length).await;
    Ok(())
}

async fn send_greeting(stream: &mut TcpStream, greeting: &Response) -> Result<(), std::io::Error> {
    stream.write_all(greeting.to_line().as_bytes()).await?;
    stream.flush().await
}
