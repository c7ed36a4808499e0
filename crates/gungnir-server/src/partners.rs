//! Partner-based visibility of events.

use axum::{body::Body, http::Request, middleware::Next, response::Response};
use gungnir_types::Event;

use crate::api::ApiError;
use crate::error::ErrorKind;

/// Header carrying the caller's partner ids, comma separated.
pub const PARTNER_ID_HEADER: &str = "X-Xmidt-Partner-Id";

/// Partner id granting access to every event.
pub const WILDCARD: &str = "*";

/// The caller's partner ids, stored in request extensions.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PartnerContext(pub Vec<String>);

impl PartnerContext {
    /// Parses a comma separated header value. Blank entries are dropped.
    pub fn parse(value: &str) -> Self {
        Self(
            value
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Middleware resolving the caller's partner ids from [`PARTNER_ID_HEADER`].
///
/// Rejects the request with 400 when the header is missing, unreadable, or
/// names no partner.
pub async fn partner_middleware(mut req: Request<Body>, next: Next) -> Result<Response, ApiError> {
    let partners = req
        .headers()
        .get(PARTNER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(PartnerContext::parse)
        .unwrap_or_default();

    if partners.is_empty() {
        return Err(ApiError::new(
            ErrorKind::BadRequest,
            "unable to retrieve partner ids from request",
        ));
    }

    req.extensions_mut().insert(partners);
    Ok(next.run(req).await)
}

/// Keeps the events visible to `partners`, preserving order.
///
/// The wildcard partner sees everything. Otherwise an event is visible when
/// its partner ids share at least one exact entry with `partners`.
/// Placeholders for unreadable records carry no partner ids, so only wildcard
/// callers receive them.
pub fn filter_events(events: Vec<Event>, partners: &[String]) -> Vec<Event> {
    if partners.iter().any(|p| p == WILDCARD) {
        return events;
    }
    events
        .into_iter()
        .filter(|event| {
            event
                .message
                .partner_ids
                .iter()
                .any(|id| partners.contains(id))
        })
        .collect()
}
