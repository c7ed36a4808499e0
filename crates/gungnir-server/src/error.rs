//! Query errors and their HTTP classification.

use axum::http::StatusCode;
use gungnir_db::DbError;
use thiserror::Error;

/// Non-standard status used when the client goes away before a response.
const CLIENT_CLOSED_REQUEST: u16 = 499;

/// Classification of a failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Internal,
    Cancelled,
    Timeout,
    BadRequest,
}

impl ErrorKind {
    /// Status code sent for this kind.
    pub fn status_code(self) -> StatusCode {
        match self {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::Cancelled => StatusCode::from_u16(CLIENT_CLOSED_REQUEST)
                .unwrap_or(StatusCode::REQUEST_TIMEOUT),
            ErrorKind::Timeout => StatusCode::NO_CONTENT,
            ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
        }
    }
}

/// Failure of an event or status query.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("failed to get records for device {device_id} (cursor {cursor:?}): {source}")]
    Store {
        device_id: String,
        cursor: Option<String>,
        #[source]
        source: DbError,
    },

    #[error("no events found for device {device_id}")]
    NoEvents { device_id: String },

    #[error("no state events found for device {device_id}")]
    NoStateEvents { device_id: String },

    #[error("request for device {device_id} after {cursor} was cancelled")]
    Cancelled { device_id: String, cursor: String },

    #[error("long poll for device {device_id} after {cursor} expired after {timeout_ms}ms")]
    Timeout {
        device_id: String,
        cursor: String,
        timeout_ms: u128,
    },

    #[error("blocking task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl QueryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            QueryError::Store { .. } | QueryError::Task(_) => ErrorKind::Internal,
            QueryError::NoEvents { .. } | QueryError::NoStateEvents { .. } => ErrorKind::NotFound,
            QueryError::Cancelled { .. } => ErrorKind::Cancelled,
            QueryError::Timeout { .. } => ErrorKind::Timeout,
        }
    }
}
