//! Transactions
//!
//! A transaction reads from the snapshot at its read timestamp and buffers
//! its writes until commit.

use std::collections::{BTreeMap, HashSet};
use std::ops::Bound;

use crate::error::{DequeError, Result};
use super::store::Store;
use super::table::Entry;

/// A snapshot-isolated unit of work against a [`Store`]
///
/// Dropping an uncommitted transaction discards it.
pub struct Transaction<'a> {
    store: &'a Store,
    read_ts: u64,
    read_write: bool,

    /// Buffered writes, visible to this transaction only
    pending: BTreeMap<Vec<u8>, Entry>,

    /// Keys read from the snapshot (read-write transactions only)
    reads: HashSet<Vec<u8>>,

    /// Prefixes scanned from the snapshot (read-write transactions only)
    scanned: Vec<Vec<u8>>,

    finished: bool,
}

impl<'a> Transaction<'a> {
    pub(crate) fn new(store: &'a Store, read_ts: u64, read_write: bool) -> Self {
        Self {
            store,
            read_ts,
            read_write,
            pending: BTreeMap::new(),
            reads: HashSet::new(),
            scanned: Vec::new(),
            finished: false,
        }
    }

    /// Timestamp of the snapshot this transaction reads
    pub fn read_ts(&self) -> u64 {
        self.read_ts
    }

    /// Whether writes are allowed
    pub fn is_read_write(&self) -> bool {
        self.read_write
    }

    /// Get a value by key
    pub fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if let Some(entry) = self.pending.get(key) {
            return Ok(match entry {
                Entry::Value(value) => Some(value.clone()),
                Entry::Tombstone => None,
            });
        }

        if self.read_write {
            self.reads.insert(key.to_vec());
        }
        Ok(self.store.table().get(key, self.read_ts))
    }

    /// Check whether a key holds a value
    pub fn contains(&mut self, key: &[u8]) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Put a key-value pair
    pub fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.ensure_writable()?;
        self.pending.insert(key.to_vec(), Entry::Value(value.to_vec()));
        Ok(())
    }

    /// Delete a key
    pub fn delete(&mut self, key: &[u8]) -> Result<()> {
        self.ensure_writable()?;
        self.pending.insert(key.to_vec(), Entry::Tombstone);
        Ok(())
    }

    /// Live pairs whose key starts with `prefix`, in key order
    ///
    /// Buffered writes shadow the snapshot.
    pub fn scan_prefix(&mut self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        if self.read_write {
            self.scanned.push(prefix.to_vec());
        }

        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> = self
            .store
            .table()
            .scan_prefix(prefix, self.read_ts)
            .into_iter()
            .collect();

        let pending = self
            .pending
            .range::<[u8], _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(prefix));
        for (key, entry) in pending {
            match entry {
                Entry::Value(value) => {
                    merged.insert(key.clone(), value.clone());
                }
                Entry::Tombstone => {
                    merged.remove(key);
                }
            }
        }

        Ok(merged.into_iter().collect())
    }

    /// Commit buffered writes, returning the commit timestamp
    ///
    /// Fails with `TransactionConflict` if anything this transaction read
    /// was changed by a transaction that committed after `read_ts`. Nothing
    /// is applied in that case and the caller decides whether to retry.
    pub fn commit(mut self) -> Result<u64> {
        self.finished = true;

        if !self.read_write || self.pending.is_empty() {
            self.store.release_read_ts(self.read_ts);
            return Ok(self.read_ts);
        }

        let pending = std::mem::take(&mut self.pending);
        let result = self
            .store
            .commit_writes(self.read_ts, &self.reads, &self.scanned, pending);
        self.store.release_read_ts(self.read_ts);
        result
    }

    /// Abandon the transaction without applying anything
    pub fn discard(mut self) {
        self.finish_discard();
    }

    fn finish_discard(&mut self) {
        if !self.finished {
            self.finished = true;
            self.pending.clear();
            self.store.release_read_ts(self.read_ts);
        }
    }

    fn ensure_writable(&self) -> Result<()> {
        if !self.read_write {
            return Err(DequeError::ReadOnlyTransaction);
        }
        Ok(())
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        self.finish_discard();
    }
}
