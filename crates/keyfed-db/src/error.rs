//! Error types for the infection store.

/// Errors that can occur while reading or writing infection records.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A database operation failed.
    #[error("store database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A connection could not be checked out of the pool.
    #[error("store pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// A stored region list could not be encoded or decoded.
    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A continuation token could not be decoded.
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),
}
