//! Transactional Key-Value Store
//!
//! Multi-version, in-memory ordered storage with snapshot isolation,
//! optimistic conflict detection and optional WAL durability.
//!
//! ## Responsibilities
//! - Point get/set/delete and ordered prefix scans inside transactions
//! - Snapshot reads pinned at a read timestamp
//! - Reject read-write commits whose reads were overwritten concurrently
//! - Log each commit batch before it becomes visible (durable mode)
//!
//! ## Data Structure Choice
//! Using BTreeMap wrapped in RwLock, each key holding its version chain:
//! - Ordered keys for prefix scans
//! - Old versions pruned once no active reader can see them
//!
//! ```text
//!   begin ──► read_ts = last committed
//!     │
//!     ├─ get/scan  ──► newest version <= read_ts (pending writes first)
//!     ├─ set/delete ─► buffered in the transaction
//!     ▼
//!   commit ──► [commit lock] conflict check ─► WAL append ─► apply @ ts+1
//! ```

mod table;
mod transaction;
mod store;

pub use table::{Entry, Version, VersionedTable};
pub use transaction::Transaction;
pub use store::Store;
