//! Store
//!
//! Owns the versioned table, the timestamp oracle and the optional WAL.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::config::Config;
use crate::error::{DequeError, Result};
use crate::wal::{Operation, WalRecovery, WalWriter};
use super::table::{Entry, VersionedTable};
use super::transaction::Transaction;

/// Transactional key-value store
///
/// ## Concurrency Model: Optimistic, Snapshot-Isolated
///
/// - **Reads** never block writers: a transaction reads the version chain
///   at its read timestamp under a short table read lock.
/// - **Commits** are serialized by `commit`, which also guards the WAL:
///   conflict check → WAL append → apply → publish timestamp.
/// - A commit becomes visible only when `last_committed` is advanced, after
///   every write of the batch is installed.
pub struct Store {
    table: VersionedTable,

    /// Highest timestamp whose writes are fully installed
    last_committed: AtomicU64,

    /// Commit lock; holds the WAL writer in durable mode
    commit: Mutex<Option<WalWriter>>,

    /// Read timestamps of live transactions → count
    active_reads: Mutex<BTreeMap<u64, usize>>,

    /// WAL size that triggers a rewrite from live data
    wal_compact_threshold: u64,
}

impl Store {
    const WAL_FILENAME: &'static str = "wal.log";

    /// Create an empty store that keeps everything in memory
    pub fn in_memory() -> Self {
        Self::with_parts(VersionedTable::new(), 0, None, u64::MAX)
    }

    /// Open a store as described by `config`
    ///
    /// In durable mode:
    /// 1. Create the data directory
    /// 2. Recover the WAL, truncating any torn tail
    /// 3. Replay every recovered batch as one commit
    /// 4. Continue appending after the last valid LSN
    pub fn open(config: &Config) -> Result<Self> {
        let Some(data_dir) = &config.data_dir else {
            return Ok(Self::in_memory());
        };

        fs::create_dir_all(data_dir)?;
        let wal_path = data_dir.join(Self::WAL_FILENAME);

        let table = VersionedTable::new();
        let mut last_ts = 0;
        let mut last_lsn = 0;

        if wal_path.exists() {
            let (entries, recovery) = WalRecovery::recover(&wal_path)?;

            if recovery.entries_recovered > 0 || recovery.entries_corrupted > 0 {
                tracing::info!(
                    "WAL recovery: {} entries recovered, {} corrupted, last_lsn={}",
                    recovery.entries_recovered,
                    recovery.entries_corrupted,
                    recovery.last_lsn
                );
            }

            for entry in entries {
                last_ts += 1;
                table.apply(last_ts, entry.batch.into_iter().map(into_write));
            }
            table.prune_all(last_ts);
            last_lsn = recovery.last_lsn;
        }

        let wal = WalWriter::resume(&wal_path, config.wal_sync_strategy, last_lsn)?;
        Ok(Self::with_parts(table, last_ts, Some(wal), config.wal_compact_threshold))
    }

    fn with_parts(
        table: VersionedTable,
        last_ts: u64,
        wal: Option<WalWriter>,
        wal_compact_threshold: u64,
    ) -> Self {
        Self {
            table,
            last_committed: AtomicU64::new(last_ts),
            commit: Mutex::new(wal),
            active_reads: Mutex::new(BTreeMap::new()),
            wal_compact_threshold,
        }
    }

    /// Start a transaction reading the latest committed state
    pub fn begin(&self, read_write: bool) -> Transaction<'_> {
        let mut active = self.active_reads.lock();
        let read_ts = self.last_committed.load(Ordering::Acquire);
        *active.entry(read_ts).or_insert(0) += 1;
        Transaction::new(self, read_ts, read_write)
    }

    /// Run `f` in a read-only transaction
    pub fn view<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Transaction<'_>) -> Result<T>,
    {
        let mut txn = self.begin(false);
        f(&mut txn)
    }

    /// Run `f` in a read-write transaction, committing if it returns `Ok`
    ///
    /// An `Err` from `f` discards every buffered write.
    pub fn update<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Transaction<'_>) -> Result<T>,
    {
        let mut txn = self.begin(true);
        let value = f(&mut txn)?;
        txn.commit()?;
        Ok(value)
    }

    /// Drop every version no live transaction can see
    pub fn gc(&self) {
        self.table.prune_all(self.watermark());
    }

    /// Force the WAL to disk (no-op in memory)
    pub fn sync(&self) -> Result<()> {
        if let Some(wal) = self.commit.lock().as_mut() {
            wal.sync()?;
        }
        Ok(())
    }

    /// Rewrite the WAL as a single batch of the live key set
    pub fn compact_wal(&self) -> Result<()> {
        let mut guard = self.commit.lock();
        match guard.as_mut() {
            Some(wal) => self.rewrite_wal(wal),
            None => Ok(()),
        }
    }

    /// Timestamp of the latest visible commit
    pub fn last_committed_ts(&self) -> u64 {
        self.last_committed.load(Ordering::Acquire)
    }

    /// Number of keys with retained versions (includes unpruned tombstones)
    pub fn key_count(&self) -> usize {
        self.table.key_count()
    }

    /// Approximate bytes held by retained versions
    pub fn size_bytes(&self) -> usize {
        self.table.size()
    }

    /// Whether commits are logged to disk
    pub fn is_durable(&self) -> bool {
        self.commit.lock().is_some()
    }

    /// Number of transactions currently open
    pub fn active_transactions(&self) -> usize {
        self.active_reads.lock().values().sum()
    }

    // =========================================================================
    // Transaction Support
    // =========================================================================

    pub(crate) fn table(&self) -> &VersionedTable {
        &self.table
    }

    pub(crate) fn release_read_ts(&self, read_ts: u64) {
        let mut active = self.active_reads.lock();
        if let Some(count) = active.get_mut(&read_ts) {
            *count -= 1;
            if *count == 0 {
                active.remove(&read_ts);
            }
        }
    }

    pub(crate) fn commit_writes(
        &self,
        read_ts: u64,
        reads: &HashSet<Vec<u8>>,
        scanned: &[Vec<u8>],
        pending: BTreeMap<Vec<u8>, Entry>,
    ) -> Result<u64> {
        let mut wal = self.commit.lock();

        let conflicted = reads
            .iter()
            .any(|key| self.table.latest_commit_ts(key).map_or(false, |ts| ts > read_ts))
            || scanned
                .iter()
                .any(|prefix| self.table.has_commit_after_in_prefix(prefix, read_ts));
        if conflicted {
            tracing::debug!("commit rejected: snapshot {} is stale", read_ts);
            return Err(DequeError::TransactionConflict);
        }

        let commit_ts = self.last_committed.load(Ordering::Acquire) + 1;

        if let Some(writer) = wal.as_mut() {
            let batch = pending
                .iter()
                .map(|(key, entry)| match entry {
                    Entry::Value(value) => Operation::Put {
                        key: key.clone(),
                        value: value.clone(),
                    },
                    Entry::Tombstone => Operation::Delete { key: key.clone() },
                })
                .collect();
            writer.append(batch)?;
        }

        let keys: Vec<Vec<u8>> = pending.keys().cloned().collect();
        self.table.apply(commit_ts, pending);
        self.last_committed.store(commit_ts, Ordering::Release);

        let watermark = self.watermark();
        self.table.prune_keys(keys.iter().map(Vec::as_slice), watermark);

        // The commit is visible from here on; a failed rewrite keeps the
        // current log, which still holds every entry
        if let Some(writer) = wal.as_mut() {
            if writer.size_bytes() > self.wal_compact_threshold {
                if let Err(e) = self.rewrite_wal(writer) {
                    tracing::warn!("WAL compaction after commit {} failed: {}", commit_ts, e);
                }
            }
        }

        Ok(commit_ts)
    }

    /// Oldest timestamp any live or future reader can hold
    fn watermark(&self) -> u64 {
        let active = self.active_reads.lock();
        let latest = self.last_committed.load(Ordering::Acquire);
        active.keys().next().copied().map_or(latest, |oldest| oldest.min(latest))
    }

    /// Called with the commit lock held
    fn rewrite_wal(&self, wal: &mut WalWriter) -> Result<()> {
        let ts = self.last_committed.load(Ordering::Acquire);
        let batch: Vec<Operation> = self
            .table
            .scan_prefix(b"", ts)
            .into_iter()
            .map(|(key, value)| Operation::Put { key, value })
            .collect();
        let live = batch.len();

        let before = wal.size_bytes();
        wal.rewrite(batch)?;
        tracing::info!(
            "WAL {} compacted: {} -> {} bytes, {} live keys",
            wal.path().display(),
            before,
            wal.size_bytes(),
            live
        );
        Ok(())
    }
}

fn into_write(op: Operation) -> (Vec<u8>, Entry) {
    match op {
        Operation::Put { key, value } => (key, Entry::Value(value)),
        Operation::Delete { key } => (key, Entry::Tombstone),
    }
}
