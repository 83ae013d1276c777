mod file;
mod memory;
mod traits;

pub use file::FileSnapshotStore;
pub use memory::{EphemeralSnapshotStore, MemorySnapshotStore};
pub use traits::SnapshotStore;

use serde::{Deserialize, Serialize};

use crate::lock::LockRecord;
use crate::path::PathKey;

/// Current snapshot schema version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Serialized form of the lock table and partial-lock index.
///
/// Entries are kept in path order so that equal states produce equal files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Schema version
    #[serde(default = "default_version")]
    pub version: u32,
    /// Full locks
    #[serde(default)]
    pub locks: Vec<SnapshotLock>,
    /// Ancestors marked by `lock_parents`, with the full paths covering them
    #[serde(default)]
    pub partial_locks: Vec<PartialLockEntry>,
}

fn default_version() -> u32 {
    SNAPSHOT_VERSION
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            locks: Vec::new(),
            partial_locks: Vec::new(),
        }
    }
}

/// One full lock in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotLock {
    pub path: PathKey,
    #[serde(flatten)]
    pub record: LockRecord,
}

/// One partially locked ancestor in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialLockEntry {
    pub ancestor: PathKey,
    pub holders: Vec<PathKey>,
}
