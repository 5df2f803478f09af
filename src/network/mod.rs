//! Network Module
//!
//! TCP server and client handling.
//!
//! ## Architecture
//! - Single acceptor thread
//! - One thread per connection, capped by `max_connections`
//! - Commands routed through Engine

mod server;
mod connection;

pub use server::{Server, ShutdownHandle, MAX_CLIENTS_REPLY};
pub use connection::Connection;
