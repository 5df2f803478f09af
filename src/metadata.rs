//! Metadata Codec
//!
//! Anchor records for collection keys, tagged by their first byte.
//!
//! ## Format
//! ```text
//! L:<first>:<last>:<size>
//! │   │       │      └── element count, unsigned hex
//! │   │       └───────── logical index of rightmost element, signed hex
//! │   └───────────────── logical index of leftmost element, signed hex
//! └───────────────────── type tag
//! ```
//!
//! The tag selects the decoder, so new collection types add a variant and a
//! tag without touching the list path.

use crate::error::{DequeError, Result};
use crate::keyspace::format_hex;

/// Tag byte of list metadata
pub const LIST_TAG: u8 = b'L';

const FIELD_SEPARATOR: char = ':';

/// Metadata of any collection type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metadata {
    List(ListMetadata),
}

/// Bounds and size of a non-empty list
///
/// Invariant: `first <= last` and `last - first + 1 == size`. An empty list
/// has no metadata record at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListMetadata {
    /// Logical index of the leftmost element
    pub first: i64,

    /// Logical index of the rightmost element
    pub last: i64,

    /// Number of elements
    pub size: u32,
}

impl Metadata {
    /// Serialize with the leading type tag
    pub fn marshal(&self) -> Vec<u8> {
        match self {
            Metadata::List(list) => list.marshal(),
        }
    }

    /// Decode by dispatching on the leading tag byte
    pub fn unmarshal(data: &[u8]) -> Result<Self> {
        match data.first() {
            Some(&LIST_TAG) => ListMetadata::unmarshal(data).map(Metadata::List),
            Some(&tag) => Err(DequeError::InvalidMetadata(format!(
                "unsupported type tag 0x{:02x}",
                tag
            ))),
            None => Err(DequeError::InvalidMetadata("empty record".to_string())),
        }
    }

    /// The list variant
    pub fn into_list(self) -> Result<ListMetadata> {
        match self {
            Metadata::List(list) => Ok(list),
        }
    }
}

impl ListMetadata {
    /// Metadata of a freshly created list: one slot at index 0, nothing in it yet
    pub fn seed() -> Self {
        Self {
            first: 0,
            last: 0,
            size: 0,
        }
    }

    /// `L:<hex first>:<hex last>:<hex size>`
    pub fn marshal(&self) -> Vec<u8> {
        format!(
            "{}{sep}{}{sep}{}{sep}{:x}",
            LIST_TAG as char,
            format_hex(self.first),
            format_hex(self.last),
            self.size,
            sep = FIELD_SEPARATOR
        )
        .into_bytes()
    }

    /// Parse `L:<hex first>:<hex last>:<hex size>`
    ///
    /// Exactly four fields are required and every numeric field must be
    /// valid base-16 within range; anything else is `InvalidMetadata`.
    pub fn unmarshal(data: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(data)
            .map_err(|_| DequeError::InvalidMetadata("not valid UTF-8".to_string()))?;

        let fields: Vec<&str> = text.split(FIELD_SEPARATOR).collect();
        if fields.len() != 4 {
            return Err(DequeError::InvalidMetadata(format!(
                "expected 4 fields, found {}",
                fields.len()
            )));
        }
        if fields[0].as_bytes() != [LIST_TAG] {
            return Err(DequeError::InvalidMetadata(format!("bad list tag '{}'", fields[0])));
        }

        let first = parse_signed(fields[1], "first")?;
        let last = parse_signed(fields[2], "last")?;
        let size = parse_unsigned(fields[3], "size")?;

        Ok(Self { first, last, size })
    }

    /// Whether `first`, `last` and `size` agree with each other
    pub fn is_consistent(&self) -> bool {
        self.size > 0
            && self.first <= self.last
            && (self.last as i128 - self.first as i128 + 1) == self.size as i128
    }
}

// `from_str_radix` accepts a leading '+', which the format never writes
fn parse_signed(field: &str, name: &str) -> Result<i64> {
    if field.starts_with('+') {
        return Err(invalid_field(name, field));
    }
    i64::from_str_radix(field, 16).map_err(|_| invalid_field(name, field))
}

fn parse_unsigned(field: &str, name: &str) -> Result<u32> {
    if field.starts_with('+') {
        return Err(invalid_field(name, field));
    }
    u32::from_str_radix(field, 16).map_err(|_| invalid_field(name, field))
}

fn invalid_field(name: &str, field: &str) -> DequeError {
    DequeError::InvalidMetadata(format!("field '{}' is not base-16: '{}'", name, field))
}
