//! Error types for DequeKV
//!
//! Provides a unified error type for all operations.
//!
//! Variants that reach clients render as the exact protocol error text, so
//! the command boundary can encode `err.to_string()` without translation.

use thiserror::Error;

/// Result type alias using DequeError
pub type Result<T> = std::result::Result<T, DequeError>;

/// Unified error type for DequeKV operations
#[derive(Debug, Error)]
pub enum DequeError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // WAL Errors
    // -------------------------------------------------------------------------
    #[error("WAL corruption detected: {0}")]
    WalCorruption(String),

    #[error("WAL write failed: {0}")]
    WalWrite(String),

    // -------------------------------------------------------------------------
    // Transaction Errors
    // -------------------------------------------------------------------------
    #[error("ERR transaction conflict, please retry")]
    TransactionConflict,

    #[error("ERR write attempted in a read-only transaction")]
    ReadOnlyTransaction,

    // -------------------------------------------------------------------------
    // Keyspace Errors
    // -------------------------------------------------------------------------
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,

    #[error("ERR no such key")]
    NoSuchKey,

    #[error("ERR index out of range")]
    IndexOutOfRange,

    #[error("ERR invalid list metadata: {0}")]
    InvalidMetadata(String),

    #[error("ERR nil key")]
    NilKey,

    #[error("ERR invalid list direction: {0}")]
    InvalidDirection(String),

    #[error("ERR list is too long")]
    ListTooLong,

    #[error("ERR key uses the reserved internal prefix")]
    ReservedKey,

    #[error("ERR sequence exhausted")]
    SequenceExhausted,

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Command Errors
    // -------------------------------------------------------------------------
    #[error("ERR unknown command '{0}'")]
    UnknownCommand(String),

    #[error("ERR wrong number of arguments for '{0}' command")]
    WrongArity(String),

    #[error("ERR value is not an integer or out of range")]
    NotAnInteger,

    #[error("ERR syntax error")]
    Syntax,

    // -------------------------------------------------------------------------
    // Network Errors
    // -------------------------------------------------------------------------
    #[error("Network error: {0}")]
    Network(String),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl DequeError {
    /// Whether the error is a per-command failure that leaves the connection usable
    pub fn is_command_error(&self) -> bool {
        !matches!(self, DequeError::Io(_) | DequeError::Protocol(_) | DequeError::Network(_))
    }
}

impl From<bincode::Error> for DequeError {
    fn from(e: bincode::Error) -> Self {
        DequeError::Serialization(e.to_string())
    }
}
