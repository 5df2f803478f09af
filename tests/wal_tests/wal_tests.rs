//! Tests for the Write-Ahead Log
//!
//! These tests verify:
//! - Entry framing (header layout, CRC, length checks)
//! - Writer LSN assignment, sync accounting, truncate and rewrite
//! - Reader iteration and torn-tail detection
//! - Recovery truncation and verify mode

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use dequekv::config::WalSyncStrategy;
use dequekv::error::DequeError;
use dequekv::wal::{Operation, WalEntry, WalReader, WalRecovery, WalWriter, HEADER_SIZE};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_wal() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let wal_path = temp_dir.path().join("test.wal");
    (temp_dir, wal_path)
}

fn put(key: &str, value: &str) -> Operation {
    Operation::Put {
        key: key.as_bytes().to_vec(),
        value: value.as_bytes().to_vec(),
    }
}

/// Write `count` single-put batches using WalWriter
fn write_entries_via_writer(path: &Path, count: usize) {
    let mut writer = WalWriter::open(path, WalSyncStrategy::EveryWrite).unwrap();
    for i in 0..count {
        writer
            .append(vec![put(&format!("key{}", i), &format!("value{}", i))])
            .unwrap();
    }
}

fn append_raw(path: &Path, bytes: &[u8]) {
    let mut file = OpenOptions::new().append(true).open(path).unwrap();
    file.write_all(bytes).unwrap();
    file.sync_all().unwrap();
}

// =============================================================================
// Entry Tests
// =============================================================================

#[test]
fn test_entry_header_layout() {
    let entry = WalEntry::new(7, vec![put("k", "v")]);
    let frame = entry.serialize().unwrap();

    assert_eq!(&frame[0..8], &7u64.to_be_bytes());
    let len = u32::from_be_bytes([frame[12], frame[13], frame[14], frame[15]]) as usize;
    assert_eq!(frame.len(), HEADER_SIZE + len);

    let crc = u32::from_be_bytes([frame[8], frame[9], frame[10], frame[11]]);
    assert_eq!(crc, WalEntry::compute_crc(&frame[HEADER_SIZE..]));
}

#[test]
fn test_entry_batch_survives_framing() {
    let batch = vec![
        put("a", "1"),
        Operation::Delete {
            key: b"b".to_vec(),
        },
        put("c", ""),
    ];
    let entry = WalEntry::new(3, batch.clone());
    let decoded = WalEntry::deserialize(&entry.serialize().unwrap()).unwrap();

    assert_eq!(decoded.lsn, 3);
    assert_eq!(decoded.batch, batch);
}

#[test]
fn test_entry_crc_mismatch() {
    let mut frame = WalEntry::new(1, vec![put("k", "v")]).serialize().unwrap();
    let last = frame.len() - 1;
    frame[last] ^= 0xff;

    assert!(matches!(
        WalEntry::deserialize(&frame),
        Err(DequeError::WalCorruption(_))
    ));
}

#[test]
fn test_entry_short_frame() {
    let frame = WalEntry::new(1, vec![put("k", "v")]).serialize().unwrap();
    assert!(matches!(
        WalEntry::deserialize(&frame[..HEADER_SIZE - 1]),
        Err(DequeError::WalCorruption(_))
    ));
    assert!(matches!(
        WalEntry::deserialize(&frame[..frame.len() - 1]),
        Err(DequeError::WalCorruption(_))
    ));
}

#[test]
fn test_operation_key() {
    assert_eq!(put("k", "v").key(), b"k");
    assert_eq!(Operation::Delete { key: b"d".to_vec() }.key(), b"d");
}

// =============================================================================
// Writer Tests
// =============================================================================

#[test]
fn test_writer_assigns_sequential_lsns() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();

    assert_eq!(writer.current_lsn(), 1);
    assert_eq!(writer.append(vec![put("a", "1")]).unwrap(), 1);
    assert_eq!(writer.append(vec![put("b", "2")]).unwrap(), 2);
    assert_eq!(writer.current_lsn(), 3);
}

#[test]
fn test_writer_size_matches_file() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
    writer.append(vec![put("a", "1"), put("b", "2")]).unwrap();

    assert_eq!(writer.size_bytes(), fs::metadata(&wal_path).unwrap().len());
}

#[test]
fn test_writer_every_n_entries_resets_counter() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut writer =
        WalWriter::open(&wal_path, WalSyncStrategy::EveryNEntries { count: 3 }).unwrap();

    writer.append(vec![put("a", "1")]).unwrap();
    writer.append(vec![put("b", "2")]).unwrap();
    assert_eq!(writer.uncommitted_count(), 2);

    writer.append(vec![put("c", "3")]).unwrap();
    assert_eq!(writer.uncommitted_count(), 0);
}

#[test]
fn test_writer_reopen_continues_lsn() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries_via_writer(&wal_path, 4);

    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
    assert_eq!(writer.append(vec![put("x", "y")]).unwrap(), 5);
}

#[test]
fn test_writer_truncate() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
    writer.append(vec![put("a", "1")]).unwrap();

    writer.truncate().unwrap();
    assert_eq!(writer.size_bytes(), 0);
    assert_eq!(fs::metadata(&wal_path).unwrap().len(), 0);

    // LSNs keep increasing after a truncate
    assert_eq!(writer.append(vec![put("b", "2")]).unwrap(), 2);
}

#[test]
fn test_writer_rewrite_replaces_contents() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
    for i in 0..10 {
        writer.append(vec![put("k", &i.to_string())]).unwrap();
    }

    let lsn = writer.rewrite(vec![put("k", "9")]).unwrap();
    assert_eq!(lsn, 11);
    writer.append(vec![put("z", "1")]).unwrap();
    drop(writer);

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].batch, vec![put("k", "9")]);
    assert_eq!(result.last_lsn, 12);
    assert!(!wal_path.with_extension("compact").exists());
}

// =============================================================================
// Reader Tests
// =============================================================================

#[test]
fn test_reader_empty_file() {
    let (_temp, wal_path) = setup_temp_wal();
    File::create(&wal_path).unwrap();

    let mut reader = WalReader::open(&wal_path).unwrap();
    assert!(reader.next_entry().unwrap().is_none());
    assert_eq!(reader.position(), 0);
}

#[test]
fn test_reader_iterates_in_order() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries_via_writer(&wal_path, 5);

    let lsns: Vec<u64> = WalReader::open(&wal_path)
        .unwrap()
        .entries()
        .map(|entry| entry.unwrap().lsn)
        .collect();
    assert_eq!(lsns, vec![1, 2, 3, 4, 5]);
}

#[test]
fn test_reader_torn_header() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries_via_writer(&wal_path, 2);
    append_raw(&wal_path, &[0u8; HEADER_SIZE / 2]);

    let mut reader = WalReader::open(&wal_path).unwrap();
    assert!(reader.next_entry().unwrap().is_some());
    assert!(reader.next_entry().unwrap().is_some());
    assert!(matches!(reader.next_entry(), Err(DequeError::WalCorruption(_))));
}

#[test]
fn test_reader_iterator_stops_after_error() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries_via_writer(&wal_path, 1);
    append_raw(&wal_path, b"garbage");

    let results: Vec<_> = WalReader::open(&wal_path).unwrap().entries().collect();
    assert_eq!(results.len(), 2);
    assert!(results[0].is_ok());
    assert!(results[1].is_err());
}

// =============================================================================
// Recovery Tests
// =============================================================================

#[test]
fn test_recover_clean_wal() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries_via_writer(&wal_path, 3);

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();
    assert_eq!(entries.len(), 3);
    assert_eq!(result.entries_recovered, 3);
    assert_eq!(result.entries_corrupted, 0);
    assert_eq!(result.last_lsn, 3);
    assert!(!result.was_truncated);
}

#[test]
fn test_recover_truncates_partial_tail() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries_via_writer(&wal_path, 3);
    let clean_len = fs::metadata(&wal_path).unwrap().len();

    let frame = WalEntry::new(4, vec![put("torn", "write")]).serialize().unwrap();
    append_raw(&wal_path, &frame[..frame.len() - 3]);

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();
    assert_eq!(entries.len(), 3);
    assert_eq!(result.entries_corrupted, 1);
    assert!(result.was_truncated);
    assert_eq!(fs::metadata(&wal_path).unwrap().len(), clean_len);

    // A second pass finds nothing left to repair
    let (_, again) = WalRecovery::recover(&wal_path).unwrap();
    assert!(!again.was_truncated);
    assert_eq!(again.entries_recovered, 3);
}

#[test]
fn test_recover_stops_at_crc_mismatch() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries_via_writer(&wal_path, 1);

    let mut bad = WalEntry::new(2, vec![put("bad", "crc")]).serialize().unwrap();
    bad[HEADER_SIZE] ^= 0x55;
    append_raw(&wal_path, &bad);
    append_raw(&wal_path, &WalEntry::new(3, vec![put("after", "bad")]).serialize().unwrap());

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(result.last_lsn, 1);
    assert!(result.was_truncated);
}

#[test]
fn test_verify_does_not_modify_file() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries_via_writer(&wal_path, 2);
    append_raw(&wal_path, b"tail");
    let len_before = fs::metadata(&wal_path).unwrap().len();

    let result = WalRecovery::verify(&wal_path).unwrap();
    assert_eq!(result.entries_recovered, 2);
    assert_eq!(result.entries_corrupted, 1);
    assert!(!result.was_truncated);
    assert_eq!(fs::metadata(&wal_path).unwrap().len(), len_before);
}
