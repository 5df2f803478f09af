//! Command definitions
//!
//! The command table and the typed commands parsed from request arguments.
//!
//! Every request is validated here, before the engine sees it:
//! 1. Look the name up in [`COMMAND_TABLE`] (case-insensitive)
//! 2. Check the argument count against the entry's arity
//! 3. Parse integer arguments

use bytes::Bytes;

use crate::error::{DequeError, Result};
use crate::list::Direction;
use super::Reply;

// =============================================================================
// Command Table
// =============================================================================

/// Behavioural flags reported by `COMMAND`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandFlag {
    Write,
    Readonly,
    DenyOom,
    Fast,
    Random,
    SortForScript,
    Loading,
    Stale,
}

impl CommandFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandFlag::Write => "write",
            CommandFlag::Readonly => "readonly",
            CommandFlag::DenyOom => "denyoom",
            CommandFlag::Fast => "fast",
            CommandFlag::Random => "random",
            CommandFlag::SortForScript => "sort_for_script",
            CommandFlag::Loading => "loading",
            CommandFlag::Stale => "stale",
        }
    }
}

/// Static description of one command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandSpec {
    /// Lower-case name
    pub name: &'static str,

    /// Exact argument count including the name; negative means "at least"
    pub arity: i8,

    pub flags: &'static [CommandFlag],

    /// Position of the first key argument (0 = none)
    pub first_key: i8,

    /// Position of the last key argument
    pub last_key: i8,

    /// Step between key arguments
    pub step: i8,
}

impl CommandSpec {
    /// Whether `argc` arguments (name included) satisfy the arity
    pub fn accepts(&self, argc: usize) -> bool {
        let arity = self.arity as i64;
        if arity >= 0 {
            argc as i64 == arity
        } else {
            argc as i64 >= -arity
        }
    }

    /// `[name, arity, [flags...], first_key, last_key, step]`
    pub fn to_reply(&self) -> Reply {
        Reply::Array(vec![
            Reply::bulk(self.name),
            Reply::Integer(self.arity as i64),
            Reply::Array(
                self.flags
                    .iter()
                    .map(|flag| Reply::Simple(flag.as_str().to_string()))
                    .collect(),
            ),
            Reply::Integer(self.first_key as i64),
            Reply::Integer(self.last_key as i64),
            Reply::Integer(self.step as i64),
        ])
    }
}

const fn spec(
    name: &'static str,
    arity: i8,
    flags: &'static [CommandFlag],
    first_key: i8,
    last_key: i8,
    step: i8,
) -> CommandSpec {
    CommandSpec {
        name,
        arity,
        flags,
        first_key,
        last_key,
        step,
    }
}

use CommandFlag::*;

/// Every command the server understands
pub static COMMAND_TABLE: &[CommandSpec] = &[
    spec("ping", -1, &[Fast, Stale], 0, 0, 0),
    spec("command", -1, &[Random, Loading, Stale], 0, 0, 0),
    spec("info", -1, &[Random, Loading, Stale], 0, 0, 0),
    spec("get", 2, &[Readonly, Fast], 1, 1, 1),
    spec("set", -3, &[Write, DenyOom], 1, 1, 1),
    spec("seq", 1, &[Write, DenyOom], 0, 0, 0),
    spec("keys", 2, &[Readonly, SortForScript], 0, 0, 0),
    spec("lpush", -3, &[Write, DenyOom, Fast], 1, 1, 1),
    spec("rpush", -3, &[Write, DenyOom, Fast], 1, 1, 1),
    spec("lpop", 2, &[Write, Fast], 1, 1, 1),
    spec("rpop", 2, &[Write, Fast], 1, 1, 1),
    spec("lindex", 3, &[Readonly, Fast], 1, 1, 1),
    spec("lset", 4, &[Fast, Write, DenyOom], 1, 1, 1),
    spec("lrange", 4, &[Readonly], 1, 1, 1),
    spec("llen", 2, &[Readonly, Fast], 1, 1, 1),
];

/// Find a command by name, ignoring ASCII case
pub fn lookup(name: &[u8]) -> Option<&'static CommandSpec> {
    COMMAND_TABLE
        .iter()
        .find(|spec| spec.name.as_bytes().eq_ignore_ascii_case(name))
}

// =============================================================================
// Parsed Commands
// =============================================================================

/// A validated command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Health check, optionally echoing a message
    Ping { message: Option<Bytes> },

    /// Server information
    Info,

    /// Dump the command table
    CommandList,

    /// Number of commands in the table
    CommandCount,

    /// Get a scalar value
    Get { key: Bytes },

    /// Set a scalar value
    Set { key: Bytes, value: Bytes },

    /// Next value of the server-wide sequence
    Seq,

    /// Keys matching a glob pattern
    Keys { pattern: Bytes },

    /// LPUSH / RPUSH
    Push {
        key: Bytes,
        values: Vec<Bytes>,
        direction: Direction,
    },

    /// LPOP / RPOP
    Pop { key: Bytes, direction: Direction },

    /// LINDEX
    Index { key: Bytes, index: i64 },

    /// LSET
    SetIndex { key: Bytes, index: i64, value: Bytes },

    /// LRANGE
    Range { key: Bytes, start: i64, end: i64 },

    /// LLEN
    Len { key: Bytes },
}

impl Command {
    /// Parse request arguments (command name first)
    pub fn from_args(mut args: Vec<Bytes>) -> Result<Self> {
        let Some(name) = args.first() else {
            return Err(DequeError::Protocol("empty request".to_string()));
        };

        let spec = lookup(name).ok_or_else(|| {
            DequeError::UnknownCommand(String::from_utf8_lossy(name).into_owned())
        })?;
        if !spec.accepts(args.len()) {
            return Err(DequeError::WrongArity(spec.name.to_string()));
        }

        let rest = args.split_off(1);
        let command = match (spec.name, rest.as_slice()) {
            ("ping", []) => Command::Ping { message: None },
            ("ping", [message]) => Command::Ping {
                message: Some(message.clone()),
            },
            // Section filters are accepted and ignored
            ("info", _) => Command::Info,
            ("command", []) => Command::CommandList,
            ("command", [sub]) if sub.eq_ignore_ascii_case(b"count") => Command::CommandCount,
            ("command", _) => return Err(DequeError::Syntax),
            ("get", [key]) => Command::Get { key: key.clone() },
            ("set", [key, value]) => Command::Set {
                key: key.clone(),
                value: value.clone(),
            },
            // Expiry and conditional options are not supported
            ("set", _) => return Err(DequeError::Syntax),
            ("seq", []) => Command::Seq,
            ("keys", [pattern]) => Command::Keys {
                pattern: pattern.clone(),
            },
            ("lpush", [key, values @ ..]) => Command::Push {
                key: key.clone(),
                values: values.to_vec(),
                direction: Direction::Left,
            },
            ("rpush", [key, values @ ..]) => Command::Push {
                key: key.clone(),
                values: values.to_vec(),
                direction: Direction::Right,
            },
            ("lpop", [key]) => Command::Pop {
                key: key.clone(),
                direction: Direction::Left,
            },
            ("rpop", [key]) => Command::Pop {
                key: key.clone(),
                direction: Direction::Right,
            },
            ("lindex", [key, index]) => Command::Index {
                key: key.clone(),
                index: parse_integer(index)?,
            },
            ("lset", [key, index, value]) => Command::SetIndex {
                key: key.clone(),
                index: parse_integer(index)?,
                value: value.clone(),
            },
            ("lrange", [key, start, end]) => Command::Range {
                key: key.clone(),
                start: parse_integer(start)?,
                end: parse_integer(end)?,
            },
            ("llen", [key]) => Command::Len { key: key.clone() },
            _ => return Err(DequeError::WrongArity(spec.name.to_string())),
        };

        Ok(command)
    }

    /// Upper-case command name as sent on the wire
    pub fn name(&self) -> &'static str {
        match self {
            Command::Ping { .. } => "PING",
            Command::Info => "INFO",
            Command::CommandList | Command::CommandCount => "COMMAND",
            Command::Get { .. } => "GET",
            Command::Set { .. } => "SET",
            Command::Seq => "SEQ",
            Command::Keys { .. } => "KEYS",
            Command::Push {
                direction: Direction::Left,
                ..
            } => "LPUSH",
            Command::Push { .. } => "RPUSH",
            Command::Pop {
                direction: Direction::Left,
                ..
            } => "LPOP",
            Command::Pop { .. } => "RPOP",
            Command::Index { .. } => "LINDEX",
            Command::SetIndex { .. } => "LSET",
            Command::Range { .. } => "LRANGE",
            Command::Len { .. } => "LLEN",
        }
    }

    /// Request arguments that parse back into this command
    pub fn to_args(&self) -> Vec<Bytes> {
        let mut args = vec![Bytes::from_static(self.name().as_bytes())];
        match self {
            Command::Ping { message } => args.extend(message.iter().cloned()),
            Command::Info | Command::CommandList | Command::Seq => {}
            Command::CommandCount => args.push(Bytes::from_static(b"COUNT")),
            Command::Get { key } | Command::Len { key } | Command::Pop { key, .. } => {
                args.push(key.clone())
            }
            Command::Keys { pattern } => args.push(pattern.clone()),
            Command::Set { key, value } => {
                args.push(key.clone());
                args.push(value.clone());
            }
            Command::Push { key, values, .. } => {
                args.push(key.clone());
                args.extend(values.iter().cloned());
            }
            Command::Index { key, index } => {
                args.push(key.clone());
                args.push(integer_arg(*index));
            }
            Command::SetIndex { key, index, value } => {
                args.push(key.clone());
                args.push(integer_arg(*index));
                args.push(value.clone());
            }
            Command::Range { key, start, end } => {
                args.push(key.clone());
                args.push(integer_arg(*start));
                args.push(integer_arg(*end));
            }
        }
        args
    }
}

/// Signed decimal without a leading '+', as the protocol writes integers
pub fn parse_integer(arg: &[u8]) -> Result<i64> {
    if arg.first() == Some(&b'+') {
        return Err(DequeError::NotAnInteger);
    }
    std::str::from_utf8(arg)
        .ok()
        .and_then(|text| text.parse::<i64>().ok())
        .ok_or(DequeError::NotAnInteger)
}

fn integer_arg(value: i64) -> Bytes {
    Bytes::from(value.to_string())
}
