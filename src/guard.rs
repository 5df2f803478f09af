//! Type Guard
//!
//! A key name holds at most one representation: a scalar value or a list.
//! Each check runs inside the caller's transaction, so in a read-write
//! transaction the probed key joins the conflict set and a concurrent
//! change of representation aborts the commit.

use crate::error::{DequeError, Result};
use crate::keyspace::{is_reserved, list_meta_key};
use crate::kv::Transaction;

/// Fail with `ReservedKey` if `key` would alias internal records
pub fn ensure_user_key(key: &[u8]) -> Result<()> {
    if is_reserved(key) {
        return Err(DequeError::ReservedKey);
    }
    Ok(())
}

/// Fail with `WrongType` if a scalar value lives under `key`
pub fn ensure_not_scalar(txn: &mut Transaction<'_>, key: &[u8]) -> Result<()> {
    if txn.contains(key)? {
        return Err(DequeError::WrongType);
    }
    Ok(())
}

/// Fail with `WrongType` if a list lives under `key`
pub fn ensure_not_list(txn: &mut Transaction<'_>, key: &[u8]) -> Result<()> {
    if txn.contains(&list_meta_key(key))? {
        return Err(DequeError::WrongType);
    }
    Ok(())
}
