use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::traits::SnapshotStore;
use super::Snapshot;
use crate::error::LockerError;

/// Discards every snapshot. Used when the service runs without a file.
#[derive(Debug, Clone, Copy, Default)]
pub struct EphemeralSnapshotStore;

impl EphemeralSnapshotStore {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SnapshotStore for EphemeralSnapshotStore {
    fn store_type(&self) -> &'static str {
        "ephemeral"
    }

    fn is_persistent(&self) -> bool {
        false
    }

    async fn load(&self) -> Result<Option<Snapshot>, LockerError> {
        Ok(None)
    }

    async fn save(&self, _snapshot: &Snapshot) -> Result<(), LockerError> {
        Ok(())
    }
}

/// Keeps the last snapshot in memory and counts saves.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    latest: Mutex<Option<Snapshot>>,
    saves: AtomicUsize,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful saves so far.
    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// The last saved snapshot, if any.
    pub fn latest(&self) -> Option<Snapshot> {
        self.latest
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    fn store_type(&self) -> &'static str {
        "memory"
    }

    fn is_persistent(&self) -> bool {
        false
    }

    async fn load(&self) -> Result<Option<Snapshot>, LockerError> {
        Ok(self.latest())
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<(), LockerError> {
        *self
            .latest
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(snapshot.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
