//! Connection Handler
//!
//! Handles individual client connections.

use std::io::{BufReader, BufWriter, ErrorKind};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};

use crate::engine::Engine;
use crate::error::{DequeError, Result};
use crate::protocol::{read_request, write_reply, Command, Reply};

/// Handles a single client connection
pub struct Connection {
    /// TCP stream reader (buffered for efficiency)
    reader: BufReader<TcpStream>,

    /// TCP stream writer (buffered for efficiency)
    writer: BufWriter<TcpStream>,

    /// Bytes received but not yet decoded (pipelined requests)
    buffer: BytesMut,

    /// Reference to the command engine
    engine: Arc<Engine>,

    /// Largest bulk argument accepted
    max_bulk_len: usize,

    /// Peer address for logging
    peer_addr: String,
}

impl Connection {
    /// Create a new connection handler
    ///
    /// Sets up buffered I/O
    pub fn new(stream: TcpStream, engine: Arc<Engine>) -> Result<Self> {
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        // Disable Nagle's algorithm for low latency
        stream.set_nodelay(true)?;

        let read_stream = stream.try_clone()?;
        let max_bulk_len = engine.config().max_bulk_len;

        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(stream),
            buffer: BytesMut::with_capacity(4096),
            engine,
            max_bulk_len,
            peer_addr,
        })
    }

    /// Configure connection timeouts (0 = none)
    pub fn set_timeouts(&mut self, read_ms: u64, write_ms: u64) -> Result<()> {
        if read_ms > 0 {
            self.reader
                .get_ref()
                .set_read_timeout(Some(Duration::from_millis(read_ms)))?;
        }
        if write_ms > 0 {
            self.writer
                .get_ref()
                .set_write_timeout(Some(Duration::from_millis(write_ms)))?;
        }
        Ok(())
    }

    /// Handle the connection (blocking until closed)
    ///
    /// Reads requests in a loop and sends replies. Command errors are
    /// replied to and the loop continues; a malformed request gets an error
    /// reply and closes the connection.
    pub fn handle(&mut self) -> Result<()> {
        tracing::debug!("Connection established from {}", self.peer_addr);

        loop {
            let args = match read_request(&mut self.reader, &mut self.buffer, self.max_bulk_len) {
                Ok(Some(args)) => args,
                Ok(None) => {
                    tracing::debug!("Client {} disconnected", self.peer_addr);
                    return Ok(());
                }
                Err(DequeError::Io(ref e)) if is_disconnect(e.kind()) => {
                    tracing::debug!("Client {} went away: {}", self.peer_addr, e);
                    return Ok(());
                }
                Err(DequeError::Io(ref e))
                    if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
                {
                    tracing::debug!("Read timeout for client {}", self.peer_addr);
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!("Error reading from {}: {}", self.peer_addr, e);
                    let _ = write_reply(&mut self.writer, &Reply::from(&e));
                    return Err(e);
                }
            };

            let reply = self.execute(args);

            if let Err(e) = write_reply(&mut self.writer, &reply) {
                if let DequeError::Io(ref io_err) = e {
                    if is_disconnect(io_err.kind()) {
                        tracing::debug!(
                            "Client {} disconnected before the reply was sent: {}",
                            self.peer_addr,
                            e
                        );
                        return Ok(());
                    }
                }
                tracing::warn!("Error writing to {}: {}", self.peer_addr, e);
                return Err(e);
            }
        }
    }

    /// Parse and run one request, turning any failure into an error reply
    fn execute(&self, args: Vec<Bytes>) -> Reply {
        let result = Command::from_args(args).and_then(|command| {
            tracing::trace!("{} -> {}", self.peer_addr, command.name());
            self.engine.execute(command)
        });

        match result {
            Ok(reply) => reply,
            Err(e) => {
                if e.is_command_error() {
                    tracing::debug!("Command from {} failed: {}", self.peer_addr, e);
                } else {
                    tracing::warn!("Command from {} failed: {}", self.peer_addr, e);
                }
                Reply::from(&e)
            }
        }
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }
}

fn is_disconnect(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::UnexpectedEof
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
    )
}
