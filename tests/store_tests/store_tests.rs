//! Tests for the Transactional Store
//!
//! These tests verify:
//! - Read-your-writes and snapshot isolation
//! - Optimistic conflict detection on keys and scanned prefixes
//! - Read-only enforcement and discard on error
//! - Version garbage collection
//! - WAL durability, recovery and compaction

use std::sync::{Arc, Barrier};
use std::thread;

use dequekv::config::{Config, WalSyncStrategy};
use dequekv::error::DequeError;
use dequekv::kv::Store;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_store() -> (TempDir, Config) {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp_dir.path())
        .wal_sync_strategy(WalSyncStrategy::EveryWrite)
        .build();
    (temp_dir, config)
}

fn put(store: &Store, key: &[u8], value: &[u8]) {
    store.update(|txn| txn.set(key, value)).unwrap();
}

fn get(store: &Store, key: &[u8]) -> Option<Vec<u8>> {
    store.view(|txn| txn.get(key)).unwrap()
}

// =============================================================================
// Basic Transaction Tests
// =============================================================================

#[test]
fn test_read_your_writes() {
    let store = Store::in_memory();
    let mut txn = store.begin(true);

    txn.set(b"k", b"v").unwrap();
    assert_eq!(txn.get(b"k").unwrap(), Some(b"v".to_vec()));
    assert_eq!(get(&store, b"k"), None);

    txn.commit().unwrap();
    assert_eq!(get(&store, b"k"), Some(b"v".to_vec()));
}

#[test]
fn test_delete_hides_value() {
    let store = Store::in_memory();
    put(&store, b"k", b"v");

    store.update(|txn| txn.delete(b"k")).unwrap();
    assert_eq!(get(&store, b"k"), None);
    assert!(!store.view(|txn| txn.contains(b"k")).unwrap());
}

#[test]
fn test_commit_timestamps_increase() {
    let store = Store::in_memory();
    assert_eq!(store.last_committed_ts(), 0);

    put(&store, b"a", b"1");
    put(&store, b"b", b"2");
    assert_eq!(store.last_committed_ts(), 2);

    // Read-only and empty commits do not consume a timestamp
    store.view(|txn| txn.get(b"a")).unwrap();
    store.update(|_| Ok(())).unwrap();
    assert_eq!(store.last_committed_ts(), 2);
}

#[test]
fn test_read_only_rejects_writes() {
    let store = Store::in_memory();
    let result = store.view(|txn| txn.set(b"k", b"v"));
    assert!(matches!(result, Err(DequeError::ReadOnlyTransaction)));

    let result = store.view(|txn| txn.delete(b"k"));
    assert!(matches!(result, Err(DequeError::ReadOnlyTransaction)));
}

#[test]
fn test_update_error_discards_writes() {
    let store = Store::in_memory();
    let result: Result<(), DequeError> = store.update(|txn| {
        txn.set(b"k", b"v")?;
        Err(DequeError::NoSuchKey)
    });

    assert!(matches!(result, Err(DequeError::NoSuchKey)));
    assert_eq!(get(&store, b"k"), None);
    assert_eq!(store.active_transactions(), 0);
}

#[test]
fn test_dropped_transaction_is_discarded() {
    let store = Store::in_memory();
    {
        let mut txn = store.begin(true);
        txn.set(b"k", b"v").unwrap();
        assert_eq!(store.active_transactions(), 1);
    }
    assert_eq!(store.active_transactions(), 0);
    assert_eq!(get(&store, b"k"), None);
}

#[test]
fn test_scan_prefix_merges_pending() {
    let store = Store::in_memory();
    store
        .update(|txn| {
            txn.set(b"p:1", b"a")?;
            txn.set(b"p:2", b"b")?;
            txn.set(b"q:1", b"c")
        })
        .unwrap();

    let mut txn = store.begin(true);
    txn.delete(b"p:1").unwrap();
    txn.set(b"p:3", b"d").unwrap();

    let scanned = txn.scan_prefix(b"p:").unwrap();
    assert_eq!(
        scanned,
        vec![
            (b"p:2".to_vec(), b"b".to_vec()),
            (b"p:3".to_vec(), b"d".to_vec()),
        ]
    );
}

// =============================================================================
// Isolation Tests
// =============================================================================

#[test]
fn test_snapshot_isolation() {
    let store = Store::in_memory();
    put(&store, b"k", b"old");

    let mut reader = store.begin(false);
    put(&store, b"k", b"new");
    put(&store, b"other", b"x");

    assert_eq!(reader.get(b"k").unwrap(), Some(b"old".to_vec()));
    assert_eq!(reader.get(b"other").unwrap(), None);
    reader.discard();

    assert_eq!(get(&store, b"k"), Some(b"new".to_vec()));
}

#[test]
fn test_conflict_on_read_key() {
    let store = Store::in_memory();
    put(&store, b"counter", b"1");

    let mut txn = store.begin(true);
    let seen = txn.get(b"counter").unwrap();
    assert_eq!(seen, Some(b"1".to_vec()));

    put(&store, b"counter", b"5");

    txn.set(b"counter", b"2").unwrap();
    assert!(matches!(txn.commit(), Err(DequeError::TransactionConflict)));
    assert_eq!(get(&store, b"counter"), Some(b"5".to_vec()));
}

#[test]
fn test_conflict_on_absent_key_created_concurrently() {
    let store = Store::in_memory();

    let mut txn = store.begin(true);
    assert!(!txn.contains(b"k").unwrap());
    put(&store, b"k", b"theirs");

    txn.set(b"k", b"mine").unwrap();
    assert!(matches!(txn.commit(), Err(DequeError::TransactionConflict)));
}

#[test]
fn test_conflict_on_scanned_prefix() {
    let store = Store::in_memory();

    let mut txn = store.begin(true);
    assert!(txn.scan_prefix(b"p:").unwrap().is_empty());
    put(&store, b"p:new", b"x");

    txn.set(b"summary", b"0").unwrap();
    assert!(matches!(txn.commit(), Err(DequeError::TransactionConflict)));
}

#[test]
fn test_blind_writes_do_not_conflict() {
    let store = Store::in_memory();

    let mut txn = store.begin(true);
    put(&store, b"k", b"first");
    txn.set(b"k", b"second").unwrap();

    txn.commit().unwrap();
    assert_eq!(get(&store, b"k"), Some(b"second".to_vec()));
}

#[test]
fn test_disjoint_keys_commit_independently() {
    let store = Store::in_memory();

    let mut a = store.begin(true);
    let mut b = store.begin(true);
    a.get(b"a").unwrap();
    b.get(b"b").unwrap();
    a.set(b"a", b"1").unwrap();
    b.set(b"b", b"2").unwrap();

    a.commit().unwrap();
    b.commit().unwrap();
    assert_eq!(get(&store, b"a"), Some(b"1".to_vec()));
    assert_eq!(get(&store, b"b"), Some(b"2".to_vec()));
}

#[test]
fn test_concurrent_increments_lose_nothing() {
    let store = Arc::new(Store::in_memory());
    put(&store, b"n", b"0");

    let threads = 4;
    let per_thread = 50;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let mut done = 0;
                while done < per_thread {
                    let result = store.update(|txn| {
                        let current = txn.get(b"n")?.unwrap();
                        let n: u64 = String::from_utf8(current).unwrap().parse().unwrap();
                        txn.set(b"n", (n + 1).to_string().as_bytes())
                    });
                    match result {
                        Ok(()) => done += 1,
                        Err(DequeError::TransactionConflict) => continue,
                        Err(e) => panic!("unexpected error: {}", e),
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(
        get(&store, b"n"),
        Some((threads * per_thread).to_string().into_bytes())
    );
}

// =============================================================================
// Garbage Collection Tests
// =============================================================================

#[test]
fn test_gc_drops_overwritten_versions() {
    let store = Store::in_memory();
    for i in 0..100 {
        put(&store, b"k", i.to_string().as_bytes());
    }
    let before = store.size_bytes();

    store.gc();
    assert!(store.size_bytes() < before);
    assert_eq!(store.key_count(), 1);
    assert_eq!(get(&store, b"k"), Some(b"99".to_vec()));
}

#[test]
fn test_gc_removes_deleted_keys() {
    let store = Store::in_memory();
    put(&store, b"k", b"v");
    store.update(|txn| txn.delete(b"k")).unwrap();

    store.gc();
    assert_eq!(store.key_count(), 0);
    assert_eq!(store.size_bytes(), 0);
}

#[test]
fn test_gc_keeps_versions_visible_to_readers() {
    let store = Store::in_memory();
    put(&store, b"k", b"old");

    let mut reader = store.begin(false);
    store.update(|txn| txn.delete(b"k")).unwrap();
    store.gc();

    assert_eq!(reader.get(b"k").unwrap(), Some(b"old".to_vec()));
    drop(reader);

    store.gc();
    assert_eq!(store.key_count(), 0);
}

// =============================================================================
// Durability Tests
// =============================================================================

#[test]
fn test_in_memory_is_not_durable() {
    let store = Store::open(&Config::default()).unwrap();
    assert!(!store.is_durable());
    store.sync().unwrap();
    store.compact_wal().unwrap();
}

#[test]
fn test_reopen_recovers_commits() {
    let (_temp, config) = setup_temp_store();
    {
        let store = Store::open(&config).unwrap();
        assert!(store.is_durable());
        put(&store, b"a", b"1");
        put(&store, b"b", b"2");
        store.update(|txn| txn.delete(b"a")).unwrap();
        put(&store, b"b", b"3");
    }

    let store = Store::open(&config).unwrap();
    assert_eq!(get(&store, b"a"), None);
    assert_eq!(get(&store, b"b"), Some(b"3".to_vec()));
    assert_eq!(store.key_count(), 1);
    assert_eq!(store.last_committed_ts(), 4);

    // New commits continue after the recovered ones
    put(&store, b"c", b"4");
    assert_eq!(store.last_committed_ts(), 5);
}

#[test]
fn test_batch_is_atomic_across_restart() {
    let (_temp, config) = setup_temp_store();
    {
        let store = Store::open(&config).unwrap();
        store
            .update(|txn| {
                txn.set(b"x", b"1")?;
                txn.set(b"y", b"2")
            })
            .unwrap();
    }

    let store = Store::open(&config).unwrap();
    assert_eq!(get(&store, b"x"), Some(b"1".to_vec()));
    assert_eq!(get(&store, b"y"), Some(b"2".to_vec()));
    assert_eq!(store.last_committed_ts(), 1);
}

#[test]
fn test_conflicted_commit_is_not_logged() {
    let (_temp, config) = setup_temp_store();
    {
        let store = Store::open(&config).unwrap();
        let mut txn = store.begin(true);
        txn.get(b"k").unwrap();
        put(&store, b"k", b"winner");
        txn.set(b"k", b"loser").unwrap();
        assert!(txn.commit().is_err());
    }

    let store = Store::open(&config).unwrap();
    assert_eq!(get(&store, b"k"), Some(b"winner".to_vec()));
}

#[test]
fn test_wal_compaction_keeps_live_data() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp_dir.path())
        .wal_compact_threshold(512)
        .build();
    let wal_path = temp_dir.path().join("wal.log");

    {
        let store = Store::open(&config).unwrap();
        for i in 0..200 {
            put(&store, b"hot", format!("value-{}", i).as_bytes());
        }
        put(&store, b"gone", b"x");
        store.update(|txn| txn.delete(b"gone")).unwrap();
        store.sync().unwrap();
    }
    assert!(std::fs::metadata(&wal_path).unwrap().len() < 2048);

    let store = Store::open(&config).unwrap();
    assert_eq!(get(&store, b"hot"), Some(b"value-199".to_vec()));
    assert_eq!(get(&store, b"gone"), None);
}

#[test]
fn test_failed_compaction_does_not_fail_commit() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp_dir.path())
        .wal_compact_threshold(0)
        .build();
    // The rewrite target cannot be created
    std::fs::create_dir(temp_dir.path().join("wal.compact")).unwrap();

    {
        let store = Store::open(&config).unwrap();
        let commit = store.update(|txn| txn.set(b"k", b"v"));
        assert!(commit.is_ok());
        assert_eq!(get(&store, b"k"), Some(b"v".to_vec()));

        put(&store, b"k2", b"v2");
        store.sync().unwrap();
    }

    let store = Store::open(&config).unwrap();
    assert_eq!(get(&store, b"k"), Some(b"v".to_vec()));
    assert_eq!(get(&store, b"k2"), Some(b"v2".to_vec()));
}

#[test]
fn test_explicit_compaction() {
    let (_temp, config) = setup_temp_store();
    {
        let store = Store::open(&config).unwrap();
        for i in 0..50 {
            put(&store, format!("k{}", i % 5).as_bytes(), i.to_string().as_bytes());
        }
        store.compact_wal().unwrap();
    }

    let store = Store::open(&config).unwrap();
    assert_eq!(store.key_count(), 5);
    assert_eq!(get(&store, b"k4"), Some(b"49".to_vec()));
}
