//! Keyspace Layout
//!
//! How logical keys map onto store keys.
//!
//! ```text
//! scalar      k                      → value
//! list meta   $$$_k                  → "L:<first>:<last>:<size>"
//! list item   $$$_k:<hex index>      → element
//! sequence    $$$_                   → next SEQ value, i64 big-endian
//! ```
//!
//! Indices are rendered as signed lowercase hex (`-1`, `-a`, `1f`), so item
//! keys do not sort in numeric order; the engine reads items by point lookup
//! and never depends on their key order.

/// Prefix of every internal (non-scalar) record
pub const INTERNAL_PREFIX: &[u8] = b"$$$_";

/// Store key of the `SEQ` counter
///
/// The bare prefix is unreachable from user commands: scalar keys may not
/// start with it and list names may not be empty.
pub const SEQUENCE_KEY: &[u8] = INTERNAL_PREFIX;

/// Separator between a list key and an item index
pub const ITEM_SEPARATOR: u8 = b':';

/// Whether a user-supplied key would alias internal records
pub fn is_reserved(key: &[u8]) -> bool {
    key.starts_with(INTERNAL_PREFIX)
}

/// Store key of a list's metadata record: `$$$_{key}`
pub fn list_meta_key(key: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(INTERNAL_PREFIX.len() + key.len());
    result.extend_from_slice(INTERNAL_PREFIX);
    result.extend_from_slice(key);
    result
}

/// Store key of the item at logical `index`: `$$$_{key}:{hex index}`
pub fn list_item_key(key: &[u8], index: i64) -> Vec<u8> {
    let hex = format_hex(index);
    let mut result = Vec::with_capacity(INTERNAL_PREFIX.len() + key.len() + 1 + hex.len());
    result.extend_from_slice(INTERNAL_PREFIX);
    result.extend_from_slice(key);
    result.push(ITEM_SEPARATOR);
    result.extend_from_slice(hex.as_bytes());
    result
}

/// Signed base-16 text: a leading `-` and the magnitude, never two's complement
pub fn format_hex(value: i64) -> String {
    if value < 0 {
        format!("-{:x}", value.unsigned_abs())
    } else {
        format!("{:x}", value)
    }
}
