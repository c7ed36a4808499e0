//! Error types for record retrieval.

/// Errors that can occur while reading records.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// No pooled connection became available.
    #[error("database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// A query failed.
    #[error("database query error: {0}")]
    Query(#[from] rusqlite::Error),

    /// The cursor is not one this store issued.
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),

    /// A stored row carries a record type this build does not know.
    #[error("unknown record type {0} in row {1}")]
    UnknownRecordType(i64, i64),

    /// A hash was requested for an empty record set.
    #[error("cannot compute a hash for an empty record set")]
    EmptyRecordSet,
}
