use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::path::PathKey;
use crate::snapshot::{PartialLockEntry, Snapshot, SnapshotLock};

/// A full lock held directly on a path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    /// Caller-supplied identity of the holder.
    pub owner_id: String,
    /// Secret required to release the lock.
    pub token: String,
    /// Ancestors of the path are reported as locked while this lock is held.
    pub lock_parents: bool,
    /// Descendants of the path cannot be locked while this lock is held.
    pub lock_children: bool,
    pub locked_at: DateTime<Utc>,
}

impl LockRecord {
    /// Create a record with a fresh random token.
    pub fn new(owner_id: impl Into<String>, lock_parents: bool, lock_children: bool) -> Self {
        Self {
            owner_id: owner_id.into(),
            token: uuid::Uuid::new_v4().to_string(),
            lock_parents,
            lock_children,
            locked_at: Utc::now(),
        }
    }
}

/// Public view of a held lock. Never carries the token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockEntry {
    pub path: PathKey,
    pub owner_id: String,
    pub lock_parents: bool,
    pub lock_children: bool,
    pub locked_at: DateTime<Utc>,
}

/// The lock table and the partial-lock index derived from it.
///
/// `partial_locks` maps an ancestor to the full paths whose `lock_parents`
/// flag covers it. Every holder listed there is a key of `locks`, and the
/// ancestor entry disappears with its last holder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockState {
    locks: BTreeMap<PathKey, LockRecord>,
    partial_locks: BTreeMap<PathKey, BTreeSet<PathKey>>,
}

impl LockState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Who blocks `path` from being locked, if anyone.
    ///
    /// A partially locked path reports the owner of its smallest covering
    /// full path. Otherwise the walk goes from the root down and stops at the
    /// first lock that either sits on `path` itself or locks its children.
    pub fn is_locked(&self, path: &PathKey) -> Option<&str> {
        if let Some(holders) = self.partial_locks.get(path) {
            if let Some(record) = holders.iter().find_map(|full| self.locks.get(full)) {
                return Some(&record.owner_id);
            }
        }

        for prefix in path.lineage() {
            if let Some(record) = self.locks.get(&prefix) {
                if record.lock_children || prefix == *path {
                    return Some(&record.owner_id);
                }
            }
        }

        None
    }

    pub fn get(&self, path: &PathKey) -> Option<&LockRecord> {
        self.locks.get(path)
    }

    /// Store a full lock and index it under its ancestors.
    ///
    /// Callers check [`is_locked`](Self::is_locked) first; an existing record
    /// on the same path is replaced.
    pub fn insert(&mut self, path: PathKey, record: LockRecord) {
        if record.lock_parents {
            for ancestor in path.ancestors() {
                self.partial_locks
                    .entry(ancestor)
                    .or_default()
                    .insert(path.clone());
            }
        }
        self.locks.insert(path, record);
    }

    /// Drop a full lock and its partial-lock index entries.
    pub fn remove(&mut self, path: &PathKey) -> Option<LockRecord> {
        let record = self.locks.remove(path)?;
        if record.lock_parents {
            for ancestor in path.ancestors() {
                if let Some(holders) = self.partial_locks.get_mut(&ancestor) {
                    holders.remove(path);
                    if holders.is_empty() {
                        self.partial_locks.remove(&ancestor);
                    }
                }
            }
        }
        Some(record)
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    /// Full paths currently covering `ancestor`, smallest first.
    pub fn partial_holders(&self, ancestor: &PathKey) -> Option<&BTreeSet<PathKey>> {
        self.partial_locks.get(ancestor)
    }

    /// All held locks ordered by path.
    pub fn entries(&self) -> Vec<LockEntry> {
        self.locks
            .iter()
            .map(|(path, record)| LockEntry {
                path: path.clone(),
                owner_id: record.owner_id.clone(),
                lock_parents: record.lock_parents,
                lock_children: record.lock_children,
                locked_at: record.locked_at,
            })
            .collect()
    }

    pub fn to_snapshot(&self) -> Snapshot {
        Snapshot {
            locks: self
                .locks
                .iter()
                .map(|(path, record)| SnapshotLock {
                    path: path.clone(),
                    record: record.clone(),
                })
                .collect(),
            partial_locks: self
                .partial_locks
                .iter()
                .map(|(ancestor, holders)| PartialLockEntry {
                    ancestor: ancestor.clone(),
                    holders: holders.iter().cloned().collect(),
                })
                .collect(),
            ..Snapshot::default()
        }
    }

    /// Rebuild state from a snapshot.
    ///
    /// The stored partial-lock index is kept only if it matches the one
    /// implied by the stored locks; otherwise the derived index wins.
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let mut state = Self::new();
        for SnapshotLock { path, record } in snapshot.locks {
            if state.locks.contains_key(&path) {
                warn!("Snapshot lists {} more than once, keeping the last entry", path);
                state.remove(&path);
            }
            state.insert(path, record);
        }

        let stored: BTreeMap<PathKey, BTreeSet<PathKey>> = snapshot
            .partial_locks
            .into_iter()
            .map(|entry| (entry.ancestor, entry.holders.into_iter().collect()))
            .collect();

        if stored != state.partial_locks {
            warn!(
                "Snapshot partial-lock index is inconsistent with its locks ({} stored vs {} derived entries), rebuilding",
                stored.len(),
                state.partial_locks.len()
            );
        }

        state
    }
}
