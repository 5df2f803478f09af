//! Blocking Client
//!
//! A minimal synchronous client used by the CLI and the integration tests.

use std::io::{BufReader, BufWriter};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use bytes::{Bytes, BytesMut};

use crate::error::{DequeError, Result};
use crate::protocol::{read_reply, write_request, Command, Reply};

/// One connection to a DequeKV server
pub struct Client {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
    buffer: BytesMut,
}

impl Client {
    /// Connect to `addr`
    pub fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .map_err(|e| DequeError::Network(format!("connect failed: {}", e)))?;
        stream.set_nodelay(true)?;

        Ok(Self {
            reader: BufReader::new(stream.try_clone()?),
            writer: BufWriter::new(stream),
            buffer: BytesMut::with_capacity(4096),
        })
    }

    /// Fail reads that take longer than `timeout`
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.reader.get_ref().set_read_timeout(timeout)?;
        Ok(())
    }

    /// Send raw arguments and wait for the reply
    ///
    /// Server-side errors come back as `Reply::Error`, not as `Err`.
    pub fn call<A: AsRef<[u8]>>(&mut self, args: &[A]) -> Result<Reply> {
        let args: Vec<Bytes> = args
            .iter()
            .map(|arg| Bytes::copy_from_slice(arg.as_ref()))
            .collect();
        write_request(&mut self.writer, &args)?;
        read_reply(&mut self.reader, &mut self.buffer)
    }

    /// Send a typed command and wait for the reply
    pub fn send(&mut self, command: &Command) -> Result<Reply> {
        write_request(&mut self.writer, &command.to_args())?;
        read_reply(&mut self.reader, &mut self.buffer)
    }

    /// Wait for a reply without sending anything (pipelining)
    pub fn read_reply(&mut self) -> Result<Reply> {
        read_reply(&mut self.reader, &mut self.buffer)
    }
}
