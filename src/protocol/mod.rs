//! Protocol Module
//!
//! Defines the wire protocol for client-server communication: RESP
//! (REdis Serialization Protocol) requests and replies.
//!
//! ## Request Flow
//! ```text
//! bytes ──decode_request──► Vec<Bytes> ──Command::from_args──► Command
//!                                            │
//!                                  arity / integer checks
//!
//! Engine::execute(Command) ──► Reply ──encode_reply──► bytes
//! ```

mod command;
mod reply;
mod codec;

pub use command::{lookup, parse_integer, Command, CommandFlag, CommandSpec, COMMAND_TABLE};
pub use reply::Reply;
pub use codec::{
    decode_reply, decode_request, encode_reply, encode_request, read_reply, read_request,
    write_reply, write_request, DEFAULT_MAX_BULK_LEN, MAX_ARRAY_LEN, MAX_INLINE_LEN,
};
