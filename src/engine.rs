//! Engine Module
//!
//! The command engine that owns the store and runs every operation.
//!
//! ## Responsibilities
//! - Open the store (in memory or recovered from the WAL)
//! - Run each scalar and list operation in exactly one transaction
//! - Route parsed commands and build their replies
//! - Sync the WAL on close

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use bytes::Bytes;

use crate::config::Config;
use crate::error::{DequeError, Result};
use crate::glob::glob_match;
use crate::guard;
use crate::keyspace::{list_item_key, INTERNAL_PREFIX, SEQUENCE_KEY};
use crate::kv::Store;
use crate::list::{self, Direction};
use crate::metadata::ListMetadata;
use crate::protocol::{Command, Reply, COMMAND_TABLE};

/// The command engine
///
/// ## Concurrency Model
///
/// The engine is shared by every connection (`Arc<Engine>`). Reads run in
/// read-only transactions and never block. Mutations run in read-write
/// transactions; two that touch the same list race optimistically and the
/// loser fails with `TransactionConflict`, which is returned to its caller
/// unchanged.
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// Transactional store holding scalars and lists
    store: Store,

    started: Instant,

    commands_processed: AtomicU64,
}

impl Engine {
    /// Open or create an engine with the given config
    pub fn open(config: Config) -> Result<Self> {
        let store = Store::open(&config)?;
        tracing::info!(
            "Engine opened ({}), {} keys",
            if store.is_durable() { "durable" } else { "in-memory" },
            store.key_count()
        );

        Ok(Self {
            config,
            store,
            started: Instant::now(),
            commands_processed: AtomicU64::new(0),
        })
    }

    /// Fresh in-memory engine with default settings
    pub fn in_memory() -> Self {
        Self {
            config: Config::default(),
            store: Store::in_memory(),
            started: Instant::now(),
            commands_processed: AtomicU64::new(0),
        }
    }

    /// Execute a command
    ///
    /// Routes commands to appropriate handlers
    pub fn execute(&self, command: Command) -> Result<Reply> {
        self.commands_processed.fetch_add(1, Ordering::Relaxed);

        match command {
            Command::Ping { message: None } => Ok(Reply::Simple("PONG".to_string())),
            Command::Ping { message: Some(message) } => Ok(Reply::Bulk(message)),
            Command::Info => Ok(Reply::Bulk(Bytes::from(self.info()))),
            Command::CommandList => Ok(Reply::Array(
                COMMAND_TABLE.iter().map(|spec| spec.to_reply()).collect(),
            )),
            Command::CommandCount => Ok(Reply::Integer(COMMAND_TABLE.len() as i64)),
            Command::Get { key } => self.get(&key).map(Reply::from_optional),
            Command::Set { key, value } => {
                self.set(&key, &value)?;
                Ok(Reply::ok())
            }
            Command::Seq => self.next_sequence().map(Reply::Integer),
            Command::Keys { pattern } => self.keys(&pattern).map(|names| {
                Reply::Array(names.into_iter().map(|name| Reply::Bulk(Bytes::from(name))).collect())
            }),
            Command::Push {
                key,
                values,
                direction,
            } => self
                .push(&key, &values, direction)
                .map(|size| Reply::Integer(size as i64)),
            Command::Pop { key, direction } => self.pop(&key, direction).map(Reply::from_optional),
            Command::Index { key, index } => self.index(&key, index).map(Reply::from_optional),
            Command::SetIndex { key, index, value } => {
                self.set_index(&key, index, &value)?;
                Ok(Reply::ok())
            }
            Command::Range { key, start, end } => self.range(&key, start, end).map(|values| {
                Reply::Array(values.into_iter().map(|v| Reply::Bulk(Bytes::from(v))).collect())
            }),
            Command::Len { key } => self.len(&key).map(|size| Reply::Integer(size as i64)),
        }
    }

    // =========================================================================
    // Scalar Operations
    // =========================================================================

    /// Get a scalar value by key
    ///
    /// `WrongType` if the key holds a list.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        guard::ensure_user_key(key)?;
        self.store.view(|txn| {
            guard::ensure_not_list(txn, key)?;
            txn.get(key)
        })
    }

    /// Set a scalar value
    ///
    /// `WrongType` if the key holds a list.
    pub fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        guard::ensure_user_key(key)?;
        self.store.update(|txn| {
            guard::ensure_not_list(txn, key)?;
            txn.set(key, value)
        })
    }

    /// Next value of the server-wide sequence, starting at 0
    ///
    /// Concurrent callers race like any other read-modify-write; the loser
    /// gets `TransactionConflict`.
    pub fn next_sequence(&self) -> Result<i64> {
        self.store.update(|txn| {
            let current = match txn.get(SEQUENCE_KEY)? {
                Some(raw) => <[u8; 8]>::try_from(raw.as_slice())
                    .map(i64::from_be_bytes)
                    .map_err(|_| {
                        DequeError::InvalidMetadata(format!(
                            "sequence record has {} bytes",
                            raw.len()
                        ))
                    })?,
                None => 0,
            };
            let next = current.checked_add(1).ok_or(DequeError::SequenceExhausted)?;
            txn.set(SEQUENCE_KEY, &next.to_be_bytes())?;
            Ok(current)
        })
    }

    /// Names of scalars and lists matching a glob `pattern`, sorted
    ///
    /// Internal records stay hidden: a list shows up once under its own name,
    /// and the sequence counter not at all.
    pub fn keys(&self, pattern: &[u8]) -> Result<Vec<Vec<u8>>> {
        let records = self.store.view(|txn| txn.scan_prefix(b""))?;

        let mut names: Vec<Vec<u8>> = records
            .iter()
            .filter_map(|(key, value)| {
                let name = match key.strip_prefix(INTERNAL_PREFIX) {
                    None => key.as_slice(),
                    Some(name) if is_list_anchor(&records, name, value) => name,
                    Some(_) => return None,
                };
                glob_match(pattern, name).then(|| name.to_vec())
            })
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    // =========================================================================
    // List Operations
    // =========================================================================

    /// LPUSH / RPUSH: push values in order, returning the new length
    pub fn push<V: AsRef<[u8]>>(&self, key: &[u8], values: &[V], direction: Direction) -> Result<u32> {
        self.store.update(|txn| list::push(txn, key, values, direction))
    }

    /// LPOP / RPOP
    pub fn pop(&self, key: &[u8], direction: Direction) -> Result<Option<Vec<u8>>> {
        self.store.update(|txn| list::pop(txn, key, direction))
    }

    /// LINDEX
    pub fn index(&self, key: &[u8], index: i64) -> Result<Option<Vec<u8>>> {
        self.store.view(|txn| list::index(txn, key, index))
    }

    /// LSET
    pub fn set_index(&self, key: &[u8], index: i64, value: &[u8]) -> Result<()> {
        self.store.update(|txn| list::set(txn, key, index, value))
    }

    /// LRANGE
    pub fn range(&self, key: &[u8], start: i64, end: i64) -> Result<Vec<Vec<u8>>> {
        self.store.view(|txn| list::range(txn, key, start, end))
    }

    /// LLEN
    pub fn len(&self, key: &[u8]) -> Result<u32> {
        self.store.view(|txn| list::len(txn, key))
    }

    /// Close the engine gracefully
    ///
    /// Syncs the WAL so every acknowledged commit is on disk
    pub fn close(self) -> Result<()> {
        self.store.sync()?;
        tracing::info!(
            "Engine closed after {} commands",
            self.commands_processed.load(Ordering::Relaxed)
        );
        Ok(())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// The underlying store
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Commands executed since the engine was opened
    pub fn commands_processed(&self) -> u64 {
        self.commands_processed.load(Ordering::Relaxed)
    }

    /// `INFO` text: `# Section` headers and `field:value` lines
    pub fn info(&self) -> String {
        let mode = if self.store.is_durable() { "durable" } else { "in-memory" };
        format!(
            "# Server\r\n\
             dequekv_version:{}\r\n\
             uptime_in_seconds:{}\r\n\
             storage_mode:{}\r\n\
             \r\n\
             # Stats\r\n\
             total_commands_processed:{}\r\n\
             last_commit_ts:{}\r\n\
             active_transactions:{}\r\n\
             \r\n\
             # Keyspace\r\n\
             store_keys:{}\r\n\
             store_bytes:{}\r\n",
            crate::VERSION,
            self.started.elapsed().as_secs(),
            mode,
            self.commands_processed.load(Ordering::Relaxed),
            self.store.last_committed_ts(),
            self.store.active_transactions(),
            self.store.key_count(),
            self.store.size_bytes(),
        )
    }
}

/// Whether `$$$_{name}` holding `value` is a list's metadata record rather
/// than an element: it must parse, be consistent and have its head element
fn is_list_anchor(records: &[(Vec<u8>, Vec<u8>)], name: &[u8], value: &[u8]) -> bool {
    if name.is_empty() {
        return false;
    }
    let Ok(meta) = ListMetadata::unmarshal(value) else {
        return false;
    };
    let head = list_item_key(name, meta.first);
    meta.is_consistent()
        && records
            .binary_search_by(|(key, _)| key.as_slice().cmp(head.as_slice()))
            .is_ok()
}
