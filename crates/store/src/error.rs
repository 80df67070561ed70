use thiserror::Error;

use crate::Version;

/// Errors that can occur when interacting with a store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A conditional write named a version that is no longer current.
    #[error("Concurrency conflict for {record} {id}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        record: &'static str,
        id: String,
        expected: Version,
        actual: Version,
    },

    /// The record to update does not exist.
    #[error("{record} not found: {id}")]
    NotFound { record: &'static str, id: String },

    /// An account with this email already exists.
    #[error("An account already exists for {0}")]
    DuplicateEmail(String),

    /// The store refused the operation (used by the in-memory store's fault injection).
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A stored row could not be mapped back into a record.
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Returns true if this error is a failed version check.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::ConcurrencyConflict { .. })
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
