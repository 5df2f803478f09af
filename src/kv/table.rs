//! Versioned table implementation
//!
//! BTreeMap of version chains with RwLock for concurrency.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;

/// Entry stored in a version
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    /// A live value
    Value(Vec<u8>),

    /// A tombstone (deleted key)
    Tombstone,
}

/// One committed state of a key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    /// Commit timestamp that produced this state
    pub commit_ts: u64,

    pub entry: Entry,
}

/// Ordered map of version chains, oldest version first in each chain
pub struct VersionedTable {
    data: RwLock<BTreeMap<Vec<u8>, Vec<Version>>>,

    /// Approximate size in bytes of all retained versions
    size: AtomicUsize,
}

impl VersionedTable {
    /// Create a new empty table
    pub fn new() -> Self {
        Self {
            data: RwLock::new(BTreeMap::new()),
            size: AtomicUsize::new(0),
        }
    }

    /// Value visible to a reader at `read_ts`
    pub fn get(&self, key: &[u8], read_ts: u64) -> Option<Vec<u8>> {
        let data = self.data.read();
        data.get(key).and_then(|chain| visible(chain, read_ts))
    }

    /// Commit timestamp of the newest version of `key`
    pub fn latest_commit_ts(&self, key: &[u8]) -> Option<u64> {
        let data = self.data.read();
        data.get(key).and_then(|chain| chain.last()).map(|v| v.commit_ts)
    }

    /// Whether any key under `prefix` has a version committed after `ts`
    pub fn has_commit_after_in_prefix(&self, prefix: &[u8], ts: u64) -> bool {
        let data = self.data.read();
        let found = prefix_range(&data, prefix)
            .any(|(_, chain)| chain.last().map_or(false, |v| v.commit_ts > ts));
        found
    }

    /// Live pairs under `prefix` as of `read_ts`, in key order
    pub fn scan_prefix(&self, prefix: &[u8], read_ts: u64) -> Vec<(Vec<u8>, Vec<u8>)> {
        let data = self.data.read();
        prefix_range(&data, prefix)
            .filter_map(|(key, chain)| visible(chain, read_ts).map(|value| (key.clone(), value)))
            .collect()
    }

    /// Install a batch of writes at `commit_ts`
    pub fn apply<I>(&self, commit_ts: u64, writes: I)
    where
        I: IntoIterator<Item = (Vec<u8>, Entry)>,
    {
        let mut data = self.data.write();
        for (key, entry) in writes {
            let added = version_size(&key, &entry);
            data.entry(key).or_default().push(Version { commit_ts, entry });
            self.size.fetch_add(added, Ordering::Relaxed);
        }
    }

    /// Drop versions of `keys` that no reader at or after `watermark` can see
    pub fn prune_keys<'a, I>(&self, keys: I, watermark: u64)
    where
        I: IntoIterator<Item = &'a [u8]>,
    {
        let mut data = self.data.write();
        for key in keys {
            self.prune_one(&mut data, key, watermark);
        }
    }

    /// Prune every chain in the table
    pub fn prune_all(&self, watermark: u64) {
        let mut data = self.data.write();
        let keys: Vec<Vec<u8>> = data.keys().cloned().collect();
        for key in keys {
            self.prune_one(&mut data, &key, watermark);
        }
    }

    /// Number of keys with at least one retained version
    pub fn key_count(&self) -> usize {
        self.data.read().len()
    }

    /// Get approximate size in bytes
    pub fn size(&self) -> usize {
        self.size.load(Ordering::Relaxed)
    }

    /// Check if the table holds no versions at all
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    fn prune_one(&self, data: &mut BTreeMap<Vec<u8>, Vec<Version>>, key: &[u8], watermark: u64) {
        let Some(chain) = data.get_mut(key) else {
            return;
        };

        // Newest version a reader at `watermark` still needs
        let keep_from = match chain.iter().rposition(|v| v.commit_ts <= watermark) {
            Some(idx) if chain[idx].entry == Entry::Tombstone => idx + 1,
            Some(idx) => idx,
            None => 0,
        };

        if keep_from > 0 {
            let freed: usize = chain.drain(..keep_from).map(|v| version_size(key, &v.entry)).sum();
            self.size.fetch_sub(freed, Ordering::Relaxed);
        }
        if chain.is_empty() {
            data.remove(key);
        }
    }
}

impl Default for VersionedTable {
    fn default() -> Self {
        Self::new()
    }
}

fn visible(chain: &[Version], read_ts: u64) -> Option<Vec<u8>> {
    chain
        .iter()
        .rev()
        .find(|v| v.commit_ts <= read_ts)
        .and_then(|v| match &v.entry {
            Entry::Value(value) => Some(value.clone()),
            Entry::Tombstone => None,
        })
}

fn prefix_range<'a>(
    data: &'a BTreeMap<Vec<u8>, Vec<Version>>,
    prefix: &'a [u8],
) -> impl Iterator<Item = (&'a Vec<u8>, &'a Vec<Version>)> + 'a {
    data.range::<[u8], _>((Bound::Included(prefix), Bound::Unbounded))
        .take_while(move |(key, _)| key.starts_with(prefix))
}

fn version_size(key: &[u8], entry: &Entry) -> usize {
    let value_len = match entry {
        Entry::Value(v) => v.len(),
        Entry::Tombstone => 0,
    };
    key.len() + value_len + std::mem::size_of::<Version>()
}
