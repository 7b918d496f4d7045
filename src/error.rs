//! Error taxonomy for the engine
//!
//! Storage failures propagate unmodified; domain errors signal contract
//! misuse and are never retried; sync errors split into per-item rejections
//! and pass-level failures.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("store is not open")]
    NotInitialized,

    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _)
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Self::ConstraintViolation(err.to_string())
            }
            _ => Self::Io(err.to_string()),
        }
    }
}

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("no active session")]
    NoActiveSession,

    #[error("active session has no sets to undo")]
    EmptySession,

    #[error("invalid set: {0}")]
    InvalidSet(String),
}

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("not authenticated")]
    Unauthenticated,

    #[error("network error: {0}")]
    Network(String),

    #[error("remote rejected record: {0}")]
    Rejected(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl SyncError {
    /// Pass-level failures abort the whole sync pass; anything else is
    /// swallowed per item and retried on the next pass.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Unauthenticated | Self::Network(_) | Self::Storage(_))
    }
}

/// Engine-level error for session state machine operations
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Domain(#[from] DomainError),
}
