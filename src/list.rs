//! List Engine
//!
//! Double-ended lists encoded as a metadata record plus one store record
//! per element.
//!
//! ## Index Space
//! ```text
//!        LPUSH ◄──                          ──► RPUSH
//!   ... │ -2 │ -1 │  0 │  1 │  2 │ ...
//!            first            last
//! ```
//! The first element of a new list lands on logical index 0. Left pushes
//! take `first - 1`, right pushes `last + 1`; pops release the end slot.
//! When the last element is popped the metadata record is deleted, so the
//! next push starts again at 0.
//!
//! Every function here runs inside the caller's transaction; the
//! [`Engine`](crate::Engine) gives each public operation its own.

use std::fmt;
use std::str::FromStr;

use crate::error::{DequeError, Result};
use crate::guard;
use crate::keyspace::{list_item_key, list_meta_key};
use crate::kv::Transaction;
use crate::metadata::{ListMetadata, Metadata};

/// End of the list an operation works on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
}

impl FromStr for Direction {
    type Err = DequeError;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("left") {
            Ok(Direction::Left)
        } else if s.eq_ignore_ascii_case("right") {
            Ok(Direction::Right)
        } else {
            Err(DequeError::InvalidDirection(s.to_string()))
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Left => f.write_str("left"),
            Direction::Right => f.write_str("right"),
        }
    }
}

/// Push `values` in order onto one end, returning the new length
///
/// `push(k, [a, b], Left)` on an empty list yields `[b, a]`; with `Right`
/// it yields `[a, b]`. Pushing nothing leaves the list untouched.
pub fn push<V: AsRef<[u8]>>(
    txn: &mut Transaction<'_>,
    key: &[u8],
    values: &[V],
    direction: Direction,
) -> Result<u32> {
    let existing = load(txn, key)?;
    if values.is_empty() {
        return Ok(existing.map_or(0, |meta| meta.size));
    }

    let mut meta = existing.unwrap_or_else(ListMetadata::seed);
    for value in values {
        let slot = if meta.size == 0 {
            meta.first
        } else {
            match direction {
                Direction::Left => {
                    meta.first = meta.first.checked_sub(1).ok_or(DequeError::ListTooLong)?;
                    meta.first
                }
                Direction::Right => {
                    meta.last = meta.last.checked_add(1).ok_or(DequeError::ListTooLong)?;
                    meta.last
                }
            }
        };
        meta.size = meta.size.checked_add(1).ok_or(DequeError::ListTooLong)?;

        // A fresh slot can still be taken by another list's record when names
        // contain ':' (the metadata of "a:1" is item 1 of "a")
        let item_key = list_item_key(key, slot);
        if txn.contains(&item_key)? {
            tracing::warn!(
                "list '{}': slot {} is already occupied",
                String::from_utf8_lossy(key),
                slot
            );
            return Err(DequeError::InvalidMetadata(format!(
                "slot {} of list '{}' is already occupied",
                slot,
                String::from_utf8_lossy(key)
            )));
        }
        txn.set(&item_key, value.as_ref())?;
    }

    store_meta(txn, key, &meta)?;
    Ok(meta.size)
}

/// Remove and return the element at one end; `None` if the list is absent
pub fn pop(txn: &mut Transaction<'_>, key: &[u8], direction: Direction) -> Result<Option<Vec<u8>>> {
    let Some(mut meta) = load(txn, key)? else {
        return Ok(None);
    };

    let slot = match direction {
        Direction::Left => meta.first,
        Direction::Right => meta.last,
    };
    let item_key = list_item_key(key, slot);
    let value = read_item(txn, key, slot, &item_key)?;
    txn.delete(&item_key)?;

    if meta.size == 1 {
        txn.delete(&list_meta_key(key))?;
    } else {
        match direction {
            Direction::Left => meta.first += 1,
            Direction::Right => meta.last -= 1,
        }
        meta.size -= 1;
        store_meta(txn, key, &meta)?;
    }

    Ok(Some(value))
}

/// Element at `index` (negative counts from the tail)
///
/// An absent list is `NoSuchKey`; an index outside `[-size, size-1]` is `None`.
pub fn index(txn: &mut Transaction<'_>, key: &[u8], index: i64) -> Result<Option<Vec<u8>>> {
    let meta = load(txn, key)?.ok_or(DequeError::NoSuchKey)?;
    let Some(slot) = resolve(&meta, index) else {
        return Ok(None);
    };

    let item_key = list_item_key(key, slot);
    read_item(txn, key, slot, &item_key).map(Some)
}

/// Overwrite the element at `index` in place
///
/// An absent list is `NoSuchKey`; an index outside `[-size, size-1]` is
/// `IndexOutOfRange`.
pub fn set(txn: &mut Transaction<'_>, key: &[u8], index: i64, value: &[u8]) -> Result<()> {
    let meta = load(txn, key)?.ok_or(DequeError::NoSuchKey)?;
    let slot = resolve(&meta, index).ok_or(DequeError::IndexOutOfRange)?;
    txn.set(&list_item_key(key, slot), value)
}

/// Elements between `start` and `end` inclusive, clamped to the list bounds
///
/// Never fails for an absent list or an empty selection; both yield `[]`.
pub fn range(txn: &mut Transaction<'_>, key: &[u8], start: i64, end: i64) -> Result<Vec<Vec<u8>>> {
    let Some(meta) = load(txn, key)? else {
        return Ok(Vec::new());
    };

    let from = resolve_unbounded(&meta, start).max(meta.first as i128);
    let to = resolve_unbounded(&meta, end).min(meta.last as i128);
    if to < from {
        return Ok(Vec::new());
    }

    // Both bounds now lie within [first, last]
    let (from, to) = (from as i64, to as i64);
    let mut values = Vec::with_capacity((to - from + 1) as usize);
    for slot in from..=to {
        let item_key = list_item_key(key, slot);
        values.push(read_item(txn, key, slot, &item_key)?);
    }
    Ok(values)
}

/// Number of elements; 0 if the list is absent
pub fn len(txn: &mut Transaction<'_>, key: &[u8]) -> Result<u32> {
    Ok(load(txn, key)?.map_or(0, |meta| meta.size))
}

/// Metadata of the list under `key`, after the type guard
///
/// A record that does not decode, or whose fields disagree, is a hard
/// `InvalidMetadata` error.
pub fn load(txn: &mut Transaction<'_>, key: &[u8]) -> Result<Option<ListMetadata>> {
    if key.is_empty() {
        return Err(DequeError::NilKey);
    }
    guard::ensure_user_key(key)?;
    guard::ensure_not_scalar(txn, key)?;

    let Some(raw) = txn.get(&list_meta_key(key))? else {
        return Ok(None);
    };

    let meta = Metadata::unmarshal(&raw)?.into_list()?;
    if !meta.is_consistent() {
        tracing::warn!(
            "inconsistent list metadata for {:?}: {}",
            String::from_utf8_lossy(key),
            String::from_utf8_lossy(&raw)
        );
        return Err(DequeError::InvalidMetadata(format!(
            "bounds {}..{} disagree with size {}",
            meta.first, meta.last, meta.size
        )));
    }
    Ok(Some(meta))
}

fn store_meta(txn: &mut Transaction<'_>, key: &[u8], meta: &ListMetadata) -> Result<()> {
    txn.set(&list_meta_key(key), &Metadata::List(*meta).marshal())
}

fn read_item(txn: &mut Transaction<'_>, key: &[u8], slot: i64, item_key: &[u8]) -> Result<Vec<u8>> {
    txn.get(item_key)?.ok_or_else(|| {
        tracing::warn!(
            "list {:?} is missing its item at index {}",
            String::from_utf8_lossy(key),
            slot
        );
        DequeError::InvalidMetadata(format!("item at logical index {} is missing", slot))
    })
}

/// Logical index of position `index`, if it lies inside the list
fn resolve(meta: &ListMetadata, index: i64) -> Option<i64> {
    let size = meta.size as i64;
    if index >= size || index < -size {
        return None;
    }
    Some(if index < 0 {
        meta.last + (index + 1)
    } else {
        meta.first + index
    })
}

/// Logical index of position `index` without range checks
fn resolve_unbounded(meta: &ListMetadata, index: i64) -> i128 {
    if index < 0 {
        meta.last as i128 + index as i128 + 1
    } else {
        meta.first as i128 + index as i128
    }
}
