//! DequeKV CLI Client
//!
//! Command-line interface for interacting with DequeKV.

use bytes::Bytes;
use clap::{Parser, Subcommand};
use dequekv::{Client, Command, Direction, Reply};

/// DequeKV CLI
#[derive(Parser, Debug)]
#[command(name = "dequekv-cli")]
#[command(about = "CLI for the DequeKV server")]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:6379")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ping the server
    Ping {
        /// Message to echo back
        message: Option<String>,
    },

    /// Show server information
    Info,

    /// Get a value by key
    Get { key: String },

    /// Set a key-value pair
    Set { key: String, value: String },

    /// Draw the next value of the server-wide sequence
    Seq,

    /// List keys matching a glob pattern
    Keys {
        #[arg(default_value = "*")]
        pattern: String,
    },

    /// Push values onto the head of a list
    Lpush {
        key: String,
        #[arg(required = true)]
        values: Vec<String>,
    },

    /// Push values onto the tail of a list
    Rpush {
        key: String,
        #[arg(required = true)]
        values: Vec<String>,
    },

    /// Remove and print the head of a list
    Lpop { key: String },

    /// Remove and print the tail of a list
    Rpop { key: String },

    /// Print the element at an index (negative counts from the tail)
    Lindex {
        key: String,
        #[arg(allow_hyphen_values = true)]
        index: i64,
    },

    /// Overwrite the element at an index
    Lset {
        key: String,
        #[arg(allow_hyphen_values = true)]
        index: i64,
        value: String,
    },

    /// Print the elements between two indices, inclusive
    Lrange {
        key: String,
        #[arg(allow_hyphen_values = true)]
        start: i64,
        #[arg(allow_hyphen_values = true)]
        end: i64,
    },

    /// Print the length of a list
    Llen { key: String },
}

impl Commands {
    fn into_command(self) -> Command {
        let bytes = |s: String| Bytes::from(s.into_bytes());
        let all = |v: Vec<String>| v.into_iter().map(bytes).collect::<Vec<Bytes>>();

        match self {
            Commands::Ping { message } => Command::Ping {
                message: message.map(bytes),
            },
            Commands::Info => Command::Info,
            Commands::Get { key } => Command::Get { key: bytes(key) },
            Commands::Set { key, value } => Command::Set {
                key: bytes(key),
                value: bytes(value),
            },
            Commands::Seq => Command::Seq,
            Commands::Keys { pattern } => Command::Keys {
                pattern: bytes(pattern),
            },
            Commands::Lpush { key, values } => Command::Push {
                key: bytes(key),
                values: all(values),
                direction: Direction::Left,
            },
            Commands::Rpush { key, values } => Command::Push {
                key: bytes(key),
                values: all(values),
                direction: Direction::Right,
            },
            Commands::Lpop { key } => Command::Pop {
                key: bytes(key),
                direction: Direction::Left,
            },
            Commands::Rpop { key } => Command::Pop {
                key: bytes(key),
                direction: Direction::Right,
            },
            Commands::Lindex { key, index } => Command::Index {
                key: bytes(key),
                index,
            },
            Commands::Lset { key, index, value } => Command::SetIndex {
                key: bytes(key),
                index,
                value: bytes(value),
            },
            Commands::Lrange { key, start, end } => Command::Range {
                key: bytes(key),
                start,
                end,
            },
            Commands::Llen { key } => Command::Len { key: bytes(key) },
        }
    }
}

fn main() {
    let args = Args::parse();

    let mut client = match Client::connect(&args.server) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Could not connect to {}: {}", args.server, e);
            std::process::exit(1);
        }
    };

    match client.send(&args.command.into_command()) {
        Ok(reply) => {
            let failed = reply.is_error();
            print_reply(&reply, 0);
            if failed {
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("Request failed: {}", e);
            std::process::exit(1);
        }
    }
}

/// Print a reply the way redis-cli does
fn print_reply(reply: &Reply, depth: usize) {
    let indent = "   ".repeat(depth);
    match reply {
        Reply::Simple(text) => println!("{}{}", indent, text),
        Reply::Error(text) => println!("{}(error) {}", indent, text),
        Reply::Integer(value) => println!("{}(integer) {}", indent, value),
        Reply::Bulk(value) => println!("{}\"{}\"", indent, String::from_utf8_lossy(value)),
        Reply::Null => println!("{}(nil)", indent),
        Reply::Array(items) if items.is_empty() => println!("{}(empty array)", indent),
        Reply::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                match item {
                    Reply::Array(_) => {
                        println!("{}{})", indent, i + 1);
                        print_reply(item, depth + 1);
                    }
                    _ => {
                        print!("{}{}) ", indent, i + 1);
                        print_reply(item, 0);
                    }
                }
            }
        }
    }
}
