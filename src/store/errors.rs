//! Error types for the conversation store.

use thiserror::Error;

/// Conversation store error type.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A stored row could not be mapped back into a record.
    #[error("invalid record: {0}")]
    InvalidRecord(String),
    /// The backing store refused the call.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// `SQLite` storage error (sync).
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// `SQLite` storage error (async).
    #[error("tokio-rusqlite error: {0}")]
    TokioSqlite(#[from] tokio_rusqlite::Error),
}

/// Convenience result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
