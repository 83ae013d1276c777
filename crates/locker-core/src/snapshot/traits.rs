use async_trait::async_trait;

use super::Snapshot;
use crate::error::LockerError;

/// Where the lock state is kept between restarts.
///
/// The store calls `load` once at startup and `save` after every successful
/// mutation, while still holding its write guard.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Returns the store identifier (e.g., "file", "ephemeral").
    fn store_type(&self) -> &'static str;

    /// Whether saved snapshots survive a restart.
    fn is_persistent(&self) -> bool {
        true
    }

    /// Read the last saved snapshot.
    ///
    /// # Returns
    /// * `Ok(None)` - Nothing has been saved yet
    /// * `Ok(Some(snapshot))` - The last saved state
    /// * `Err(_)` - The snapshot exists but could not be read or decoded
    async fn load(&self) -> Result<Option<Snapshot>, LockerError>;

    /// Replace the saved snapshot.
    ///
    /// A concurrent reader must see either the previous or the new snapshot,
    /// never a partial write.
    async fn save(&self, snapshot: &Snapshot) -> Result<(), LockerError>;
}
