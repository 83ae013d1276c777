mod state;
mod store;

pub use state::{LockEntry, LockRecord, LockState};
pub use store::{
    HierarchicalLockStore, LockOutcome, UnlockOutcome, UnlockRejection, ANONYMOUS_OWNER,
};
