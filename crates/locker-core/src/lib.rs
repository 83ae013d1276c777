//! Core types for the hierarchical lock service.
//!
//! This crate holds everything that does not depend on a transport:
//! - `PathKey`: a resource path made of string segments
//! - `LockState`: the lock and partial-lock maps with the locking rules
//! - `HierarchicalLockStore`: serialized access to `LockState` with persistence
//! - `SnapshotStore`: where the state is kept between restarts

mod error;
mod lock;
mod path;
mod snapshot;

pub use error::LockerError;
pub use lock::{
    HierarchicalLockStore, LockEntry, LockOutcome, LockRecord, LockState, UnlockOutcome,
    UnlockRejection, ANONYMOUS_OWNER,
};
pub use path::PathKey;
pub use snapshot::{
    EphemeralSnapshotStore, FileSnapshotStore, MemorySnapshotStore, PartialLockEntry, Snapshot,
    SnapshotLock, SnapshotStore,
};
