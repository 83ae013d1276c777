use thiserror::Error;

/// Errors that can occur in the lock service.
///
/// Refused locks and bad unlock tokens are not errors; they come back as
/// [`crate::LockOutcome`] and [`crate::UnlockOutcome`] values.
#[derive(Error, Debug)]
pub enum LockerError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Persistence failure: {0}")]
    Persistence(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
