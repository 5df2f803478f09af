//! Tests for the Metadata Codec
//!
//! These tests verify:
//! - The exact `L:<first>:<last>:<size>` text form
//! - Round trips across signed and unsigned extremes
//! - Rejection of malformed records (field count, bad hex, unknown tag)
//! - The consistency check used when loading a list

use dequekv::error::DequeError;
use dequekv::metadata::{ListMetadata, Metadata, LIST_TAG};

// =============================================================================
// Helper Functions
// =============================================================================

fn meta(first: i64, last: i64, size: u32) -> ListMetadata {
    ListMetadata { first, last, size }
}

fn assert_invalid(data: &[u8]) {
    match Metadata::unmarshal(data) {
        Err(DequeError::InvalidMetadata(_)) => {}
        other => panic!("expected InvalidMetadata for {:?}, got {:?}", data, other),
    }
}

// =============================================================================
// Marshal Tests
// =============================================================================

#[test]
fn test_marshal_single_element() {
    assert_eq!(meta(0, 0, 1).marshal(), b"L:0:0:1".to_vec());
}

#[test]
fn test_marshal_negative_first() {
    assert_eq!(meta(-1, 0, 2).marshal(), b"L:-1:0:2".to_vec());
}

#[test]
fn test_marshal_uses_lowercase_hex() {
    assert_eq!(meta(-16, 15, 32).marshal(), b"L:-10:f:20".to_vec());
}

#[test]
fn test_marshal_starts_with_tag() {
    let data = Metadata::List(meta(3, 4, 2)).marshal();
    assert_eq!(data[0], LIST_TAG);
}

// =============================================================================
// Round Trip Tests
// =============================================================================

#[test]
fn test_round_trip_extremes() {
    let cases = [
        meta(0, 0, 1),
        meta(-1, 0, 2),
        meta(i64::MIN, i64::MIN, 1),
        meta(i64::MAX, i64::MAX, 1),
        meta(-5, -1, 5),
        meta(100, 100 + u32::MAX as i64 - 1, u32::MAX),
    ];

    for m in cases {
        let decoded = Metadata::unmarshal(&m.marshal()).unwrap().into_list().unwrap();
        assert_eq!(decoded, m, "round trip of {:?}", m);
    }
}

// =============================================================================
// Malformed Record Tests
// =============================================================================

#[test]
fn test_unmarshal_empty() {
    assert_invalid(b"");
}

#[test]
fn test_unmarshal_unknown_tag() {
    assert_invalid(b"H:0:0:1");
}

#[test]
fn test_unmarshal_wrong_field_count() {
    assert_invalid(b"L:0:0");
    assert_invalid(b"L:0:0:1:5");
    assert_invalid(b"L");
}

#[test]
fn test_unmarshal_bad_hex() {
    assert_invalid(b"L:zz:0:1");
    assert_invalid(b"L:0:0:g");
    assert_invalid(b"L:0::1");
    assert_invalid(b"L:+1:1:1");
}

#[test]
fn test_unmarshal_size_negative() {
    assert_invalid(b"L:0:0:-1");
}

#[test]
fn test_unmarshal_size_overflow() {
    assert_invalid(b"L:0:0:100000000");
}

#[test]
fn test_unmarshal_first_overflow() {
    assert_invalid(b"L:-8000000000000001:0:1");
}

#[test]
fn test_unmarshal_not_utf8() {
    assert_invalid(&[b'L', b':', 0xff, b':', b'0', b':', b'1']);
}

// =============================================================================
// Consistency Tests
// =============================================================================

#[test]
fn test_consistency() {
    assert!(meta(0, 0, 1).is_consistent());
    assert!(meta(-3, 2, 6).is_consistent());
    assert!(meta(i64::MIN, i64::MIN + 1, 2).is_consistent());

    assert!(!meta(0, 0, 0).is_consistent());
    assert!(!meta(0, 0, 2).is_consistent());
    assert!(!meta(2, 0, 1).is_consistent());
    assert!(!meta(i64::MIN, i64::MAX, u32::MAX).is_consistent());
}
