//! Client registry
//!
//! Tracks connected clients so the server can cap concurrent connections.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Bookkeeping for one connected client
#[derive(Debug, Clone)]
pub struct ClientSession {
    connected_at: Instant,
    requests: u64,
    failures: u64,
}

impl ClientSession {
    pub fn new() -> Self {
        Self {
            connected_at: Instant::now(),
            requests: 0,
            failures: 0,
        }
    }

    pub fn record(&mut self, succeeded: bool) {
        self.requests += 1;
        if !succeeded {
            self.failures += 1;
        }
    }

    pub fn requests(&self) -> u64 {
        self.requests
    }

    pub fn failures(&self) -> u64 {
        self.failures
    }

    pub fn connected_for(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

impl Default for ClientSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry for tracking active clients
pub struct ClientRegistry {
    clients: HashMap<SocketAddr, ClientSession>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self {
            clients: HashMap::new(),
        }
    }

    /// Registers `addr` unless `limit` clients are already connected.
    pub fn try_insert(&mut self, addr: SocketAddr, limit: usize) -> bool {
        if self.clients.len() >= limit {
            return false;
        }
        self.clients.insert(addr, ClientSession::new());
        true
    }

    pub fn remove(&mut self, addr: &SocketAddr) -> Option<ClientSession> {
        self.clients.remove(addr)
    }

    pub fn get_mut(&mut self, addr: &SocketAddr) -> Option<&mut ClientSession> {
        self.clients.get_mut(addr)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}
