//! TCP Server
//!
//! Accepts connections and runs each on its own thread.
//!
//! ```text
//! acceptor ──accept──► active < max? ──yes──► spawn Connection::handle
//!                            │
//!                            no ──► "-ERR max number of clients reached", close
//! ```
//!
//! Shutdown sets a flag polled by the acceptor, closes every live socket so
//! blocked readers wake up, and waits for all connection threads.

use std::collections::HashMap;
use std::io::{ErrorKind, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam::sync::WaitGroup;
use parking_lot::Mutex;

use crate::config::Config;
use crate::engine::Engine;
use crate::error::{DequeError, Result};
use super::Connection;

/// Reply sent to connections over the `max_connections` cap
pub const MAX_CLIENTS_REPLY: &[u8] = b"-ERR max number of clients reached\r\n";

/// How long the acceptor sleeps when no connection is pending
const ACCEPT_POLL: Duration = Duration::from_millis(10);

/// Live sockets by connection id, for closing on shutdown
type Registry = Arc<Mutex<HashMap<u64, TcpStream>>>;

/// Cloneable handle that stops a running [`Server`]
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandle {
    /// Ask the server to stop
    pub fn shutdown(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_shutdown(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// TCP server for DequeKV
pub struct Server {
    config: Config,
    engine: Arc<Engine>,
    listener: Option<TcpListener>,
    shutdown: ShutdownHandle,
    connections: Registry,
    next_id: AtomicU64,
}

impl Server {
    /// Create a new server with the given config and engine
    pub fn new(config: Config, engine: Arc<Engine>) -> Self {
        Self {
            config,
            engine,
            listener: None,
            shutdown: ShutdownHandle {
                flag: Arc::new(AtomicBool::new(false)),
            },
            connections: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
        }
    }

    /// Bind the listen address; returns the bound address (port 0 picks one)
    pub fn bind(&mut self) -> Result<SocketAddr> {
        let listener = TcpListener::bind(&self.config.listen_addr).map_err(|e| {
            DequeError::Network(format!("cannot bind {}: {}", self.config.listen_addr, e))
        })?;
        listener.set_nonblocking(true)?;
        let addr = listener.local_addr()?;
        self.listener = Some(listener);
        Ok(addr)
    }

    /// Address the server is bound to, once bound
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().and_then(|l| l.local_addr().ok())
    }

    /// Handle for stopping the server from another thread
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Number of connections currently being served
    pub fn active_connections(&self) -> usize {
        self.connections.lock().len()
    }

    /// Start the server (blocking until shutdown)
    pub fn run(&mut self) -> Result<()> {
        if self.listener.is_none() {
            self.bind()?;
        }
        let Some(listener) = self.listener.take() else {
            return Err(DequeError::Network("listener not bound".to_string()));
        };

        tracing::info!("Listening on {}", listener.local_addr()?);
        let workers = WaitGroup::new();

        while !self.shutdown.is_shutdown() {
            match listener.accept() {
                Ok((stream, addr)) => {
                    if let Err(e) = self.dispatch(stream, &workers) {
                        tracing::warn!("Failed to set up connection from {}: {}", addr, e);
                    }
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL),
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => {
                    tracing::warn!("Accept failed: {}", e);
                    thread::sleep(ACCEPT_POLL);
                }
            }
        }

        drop(listener);
        let open = {
            let connections = self.connections.lock();
            for stream in connections.values() {
                let _ = stream.shutdown(Shutdown::Both);
            }
            connections.len()
        };
        tracing::info!("Shutting down, waiting for {} connections", open);

        workers.wait();
        Ok(())
    }

    /// Signal the server to shutdown gracefully
    pub fn shutdown(&self) {
        self.shutdown.shutdown();
    }

    fn dispatch(&self, mut stream: TcpStream, workers: &WaitGroup) -> Result<()> {
        stream.set_nonblocking(false)?;

        if self.active_connections() >= self.config.max_connections {
            tracing::warn!(
                "Rejecting {:?}: {} connections open",
                stream.peer_addr().ok(),
                self.config.max_connections
            );
            let _ = stream.write_all(MAX_CLIENTS_REPLY);
            return Ok(());
        }

        let registered = stream.try_clone()?;
        let mut connection = Connection::new(stream, Arc::clone(&self.engine))?;
        connection.set_timeouts(self.config.read_timeout_ms, self.config.write_timeout_ms)?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.connections.lock().insert(id, registered);

        let registry = Arc::clone(&self.connections);
        let worker = workers.clone();
        let spawned = thread::Builder::new()
            .name(format!("conn-{}", id))
            .spawn(move || {
                if let Err(e) = connection.handle() {
                    tracing::debug!("Connection {} closed with error: {}", connection.peer_addr(), e);
                }
                registry.lock().remove(&id);
                drop(worker);
            });

        if let Err(e) = spawned {
            self.connections.lock().remove(&id);
            return Err(e.into());
        }
        Ok(())
    }
}
