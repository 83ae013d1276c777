use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument, warn};

use super::state::{LockEntry, LockRecord, LockState};
use crate::error::LockerError;
use crate::path::PathKey;
use crate::snapshot::SnapshotStore;

/// Owner reported when the caller does not identify itself.
pub const ANONYMOUS_OWNER: &str = "?";

/// Result of a lock attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockOutcome {
    /// The lock was granted; `token` releases it.
    Granted { token: String },
    /// The path is blocked by another lock.
    Denied { locked_by: String },
}

impl LockOutcome {
    pub fn is_granted(&self) -> bool {
        matches!(self, LockOutcome::Granted { .. })
    }

    pub fn token(&self) -> Option<&str> {
        match self {
            LockOutcome::Granted { token } => Some(token),
            LockOutcome::Denied { .. } => None,
        }
    }
}

/// Why an unlock was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockRejection {
    NotLocked,
    BadToken,
}

impl UnlockRejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnlockRejection::NotLocked => "not_locked",
            UnlockRejection::BadToken => "bad_token",
        }
    }
}

/// Result of an unlock attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockOutcome {
    Released,
    Rejected(UnlockRejection),
}

impl UnlockOutcome {
    pub fn is_released(&self) -> bool {
        matches!(self, UnlockOutcome::Released)
    }
}

/// Exclusive locks over hierarchical paths, persisted after every change.
///
/// Mutations hold the write guard across the snapshot save, so the
/// check-then-act sequence and the write are a single critical section.
/// Queries share the read guard and never observe a half-applied change.
///
/// If a save fails the in-memory change is rolled back before the error is
/// returned, keeping memory equal to the last durable snapshot.
pub struct HierarchicalLockStore {
    state: RwLock<LockState>,
    snapshots: Arc<dyn SnapshotStore>,
}

impl HierarchicalLockStore {
    /// Create an empty store that persists through `snapshots`.
    pub fn new(snapshots: Arc<dyn SnapshotStore>) -> Self {
        Self::with_state(LockState::new(), snapshots)
    }

    pub fn with_state(state: LockState, snapshots: Arc<dyn SnapshotStore>) -> Self {
        Self {
            state: RwLock::new(state),
            snapshots,
        }
    }

    /// Create a store from the last saved snapshot.
    ///
    /// A missing snapshot is a fresh start. An unreadable one is logged and
    /// also treated as a fresh start.
    pub async fn load(snapshots: Arc<dyn SnapshotStore>) -> Self {
        let state = match snapshots.load().await {
            Ok(Some(snapshot)) => {
                let state = LockState::from_snapshot(snapshot);
                info!(
                    "Loaded {} lock(s) from {} snapshot store",
                    state.len(),
                    snapshots.store_type()
                );
                state
            }
            Ok(None) => {
                debug!("No snapshot found in {} store, starting empty", snapshots.store_type());
                LockState::new()
            }
            Err(e) => {
                warn!("Failed to load snapshot, starting empty: {}", e);
                LockState::new()
            }
        };
        Self::with_state(state, snapshots)
    }

    /// Whether snapshots outlive the process.
    pub fn is_persistent(&self) -> bool {
        self.snapshots.is_persistent()
    }

    /// Lock `path` for `owner_id`.
    ///
    /// Fails with [`LockOutcome::Denied`] when the path itself, a
    /// child-locking ancestor, or a parent-locking descendant holds it.
    #[instrument(skip(self), level = "debug")]
    pub async fn lock(
        &self,
        path: &PathKey,
        owner_id: &str,
        lock_parents: bool,
        lock_children: bool,
    ) -> Result<LockOutcome, LockerError> {
        let mut state = self.state.write().await;

        if let Some(holder) = state.is_locked(path) {
            debug!("Lock on {} denied to {}: held by {}", path, owner_id, holder);
            return Ok(LockOutcome::Denied {
                locked_by: holder.to_string(),
            });
        }

        let record = LockRecord::new(owner_id, lock_parents, lock_children);
        let token = record.token.clone();
        state.insert(path.clone(), record);

        if let Err(e) = self.snapshots.save(&state.to_snapshot()).await {
            error!("Failed to persist lock on {}, rolling back: {}", path, e);
            state.remove(path);
            return Err(e);
        }

        debug!(
            "Locked {} for {} (parents: {}, children: {})",
            path, owner_id, lock_parents, lock_children
        );
        Ok(LockOutcome::Granted { token })
    }

    /// Release the lock on exactly `path` if `token` matches.
    #[instrument(skip(self, token), level = "debug")]
    pub async fn unlock(&self, path: &PathKey, token: &str) -> Result<UnlockOutcome, LockerError> {
        let mut state = self.state.write().await;

        let rejection = match state.get(path) {
            None => Some(UnlockRejection::NotLocked),
            Some(record) if record.token != token => Some(UnlockRejection::BadToken),
            Some(_) => None,
        };
        if let Some(reason) = rejection {
            debug!("Unlock of {} rejected: {}", path, reason.as_str());
            return Ok(UnlockOutcome::Rejected(reason));
        }

        let Some(record) = state.remove(path) else {
            return Err(LockerError::Internal(format!("lock on {} vanished", path)));
        };

        if let Err(e) = self.snapshots.save(&state.to_snapshot()).await {
            error!("Failed to persist unlock of {}, rolling back: {}", path, e);
            state.insert(path.clone(), record);
            return Err(e);
        }

        debug!("Unlocked {} (held by {})", path, record.owner_id);
        Ok(UnlockOutcome::Released)
    }

    /// Who blocks `path`, if anyone. Read-only.
    pub async fn status(&self, path: &PathKey) -> Option<String> {
        self.state.read().await.is_locked(path).map(str::to_string)
    }

    /// Every held lock, ordered by path.
    pub async fn list(&self) -> Vec<LockEntry> {
        self.state.read().await.entries()
    }

    pub async fn lock_count(&self) -> usize {
        self.state.read().await.len()
    }

    /// Copy of the current state.
    pub async fn state(&self) -> LockState {
        self.state.read().await.clone()
    }
}
