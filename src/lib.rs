//! # DequeKV
//!
//! A network key-value server with double-ended lists:
//! - RESP wire protocol (arrays of bulk strings, inline commands)
//! - Scalar GET/SET and LPUSH/RPUSH/LPOP/RPOP/LINDEX/LSET/LRANGE/LLEN
//! - KEYS listing and a server-wide SEQ counter
//! - Every command runs in one snapshot-isolated transaction
//! - Optional Write-Ahead Logging (WAL) with crash recovery
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      TCP Server                              │
//! │               (thread per connection)                        │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ RESP request → Command
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                       Engine                                 │
//! │        scalar ops  │  list engine  │  type guard             │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ one transaction per command
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                  Store (MVCC, optimistic)                    │
//! └──────────┬──────────────────────────────────┬───────────────┘
//!            │                                  │
//!            ▼                                  ▼
//!   ┌─────────────────┐                ┌─────────────────┐
//!   │ Versioned Table │                │       WAL       │
//!   │    (RwLock)     │                │ (durable mode)  │
//!   └─────────────────┘                └─────────────────┘
//! ```
//!
//! ## Keyspace
//!
//! ```text
//! k               scalar value
//! $$$_k           list metadata  "L:<first>:<last>:<size>"
//! $$$_k:<index>   list element
//! $$$_            SEQ counter
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod wal;
pub mod kv;
pub mod keyspace;
pub mod metadata;
pub mod guard;
pub mod list;
pub mod glob;
pub mod protocol;
pub mod engine;
pub mod network;
pub mod client;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{DequeError, Result};
pub use config::{Config, WalSyncStrategy};
pub use engine::Engine;
pub use list::Direction;
pub use metadata::{ListMetadata, Metadata};
pub use protocol::{Command, Reply};
pub use client::Client;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of DequeKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
