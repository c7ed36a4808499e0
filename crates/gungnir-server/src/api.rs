//! Device event and status endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use gungnir_types::Status;
use serde::Deserialize;
use thiserror::Error;

use crate::error::{ErrorKind, QueryError};
use crate::partners::{filter_events, PartnerContext};
use crate::AppState;

/// Response header carrying the cursor for the returned events.
pub const HASH_HEADER: &str = "X-Codex-Hash";

/// Response header carrying the error string of a failed request.
pub const ERROR_HEADER: &str = "X-Codex-Error";

/// Error returned by handlers.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ApiError {
    kind: ErrorKind,
    message: String,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.kind.status_code();

        let mut headers = HeaderMap::new();
        match HeaderValue::from_str(&self.message) {
            Ok(value) => {
                headers.insert(ERROR_HEADER, value);
            }
            Err(_) => {
                tracing::debug!(error = %self.message, "error message is not a valid header value");
            }
        }

        if status == StatusCode::NO_CONTENT {
            return (status, headers).into_response();
        }

        let body = Json(serde_json::json!({
            "error": self.message
        }));

        (status, headers, body).into_response()
    }
}

/// Query parameters for the events endpoint.
#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    /// Cursor from a previous response's hash header.
    pub after: Option<String>,
}

/// Handler for `GET /api/v1/device/{deviceID}/events`.
///
/// Without `after`, returns the latest events. With `after`, returns events
/// stored since that cursor, long-polling until some arrive.
pub async fn get_events_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(partners): Extension<PartnerContext>,
    Path(device_id): Path<String>,
    Query(query): Query<EventsQuery>,
) -> Result<Response, ApiError> {
    let device_id = normalize_device_id(&device_id)?;

    let result = match query.after.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        Some(cursor) => {
            let cancel = state.shutdown.child_token();
            state
                .service
                .get_device_info_after_hash(&device_id, cursor, &cancel)
                .await
        }
        None => state.service.get_device_info(&device_id).await,
    };
    let (events, hash) = result.inspect_err(log_query_error)?;

    let events = filter_events(events, &partners.0);
    let mut response = Json(events).into_response();
    if !hash.is_empty() {
        if let Ok(value) = HeaderValue::from_str(&hash) {
            response.headers_mut().insert(HASH_HEADER, value);
        }
    }
    Ok(response)
}

/// Handler for `GET /api/v1/device/{deviceID}/status`.
pub async fn get_status_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(device_id): Path<String>,
) -> Result<Json<Status>, ApiError> {
    let device_id = normalize_device_id(&device_id)?;
    let status = state
        .service
        .get_status_info(&device_id)
        .await
        .inspect_err(log_query_error)?;
    Ok(Json(status))
}

/// Lower-cases a device id, rejecting blank ids as not found.
fn normalize_device_id(raw: &str) -> Result<String, ApiError> {
    let id = raw.trim().to_lowercase();
    if id.is_empty() {
        return Err(ApiError::new(ErrorKind::NotFound, "missing device id"));
    }
    Ok(id)
}

fn log_query_error(err: &QueryError) {
    match err.kind() {
        ErrorKind::Internal => tracing::error!(error = %err, "device query failed"),
        _ => tracing::debug!(error = %err, "device query returned no data"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_ids_are_lower_cased() {
        assert_eq!(
            normalize_device_id("MAC:AABBCCDDEEFF").unwrap(),
            "mac:aabbccddeeff"
        );
        let err = normalize_device_id("  ").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn timeout_response_has_no_body_but_carries_error_header() {
        let response = ApiError::new(ErrorKind::Timeout, "long poll timeout expired").into_response();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            response.headers().get(ERROR_HEADER).unwrap(),
            "long poll timeout expired"
        );
    }

    #[test]
    fn cancelled_response_uses_client_closed_status() {
        let response = ApiError::new(ErrorKind::Cancelled, "cancelled").into_response();
        assert_eq!(response.status().as_u16(), 499);
        assert!(response.headers().contains_key(ERROR_HEADER));
    }

    #[test]
    fn unprintable_message_still_produces_response() {
        let response = ApiError::new(ErrorKind::Internal, "bad\nvalue").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!response.headers().contains_key(ERROR_HEADER));
    }
}
