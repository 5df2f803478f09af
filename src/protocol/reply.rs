//! Reply definitions
//!
//! Represents replies sent to clients.

use bytes::Bytes;

use crate::error::DequeError;

/// A RESP reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// `+OK`
    Simple(String),

    /// `-ERR ...` (the text carries its own prefix word)
    Error(String),

    /// `:42`
    Integer(i64),

    /// `$3\r\nfoo`
    Bulk(Bytes),

    /// `$-1`, the absence of a value
    Null,

    /// `*2\r\n...`
    Array(Vec<Reply>),
}

impl Reply {
    /// The `+OK` reply
    pub fn ok() -> Self {
        Reply::Simple("OK".to_string())
    }

    /// An error reply with the given text
    pub fn error(message: impl Into<String>) -> Self {
        Reply::Error(message.into())
    }

    /// A bulk reply copied from a byte slice
    pub fn bulk(value: impl AsRef<[u8]>) -> Self {
        Reply::Bulk(Bytes::copy_from_slice(value.as_ref()))
    }

    /// Bulk if present, null otherwise
    pub fn from_optional(value: Option<Vec<u8>>) -> Self {
        match value {
            Some(value) => Reply::Bulk(Bytes::from(value)),
            None => Reply::Null,
        }
    }

    /// Whether this is an error reply
    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error(_))
    }
}

// Error replies must open with an upper-case code word
impl From<&DequeError> for Reply {
    fn from(err: &DequeError) -> Self {
        let text = err.to_string();
        if text.starts_with("ERR ") || text.starts_with("WRONGTYPE ") {
            Reply::Error(text)
        } else {
            Reply::Error(format!("ERR {}", text))
        }
    }
}
