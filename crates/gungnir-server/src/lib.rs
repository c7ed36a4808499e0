//! Gungnir server library logic.

pub mod api;
pub mod config;
pub mod decode;
pub mod error;
pub mod events;
pub mod measures;
pub mod partners;
pub mod status;

use axum::{routing::get, Extension, Json, Router};
use events::EventQueryService;
use measures::{Measures, MeasuresSnapshot};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Event and status queries.
    pub service: Arc<EventQueryService>,
    /// Counters updated by the service, read by `/metrics`.
    pub measures: Arc<Measures>,
    /// Cancelled on shutdown. Long polls wait on a child of this token.
    pub shutdown: CancellationToken,
}

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Counter snapshot handler.
async fn metrics(Extension(state): Extension<Arc<AppState>>) -> Json<MeasuresSnapshot> {
    Json(state.measures.snapshot())
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    let partner_routes = Router::new()
        .route(
            "/api/v1/device/{deviceID}/events",
            get(api::get_events_handler),
        )
        .layer(axum::middleware::from_fn(partners::partner_middleware));

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route(
            "/api/v1/device/{deviceID}/status",
            get(api::get_status_handler),
        )
        .merge(partner_routes)
        .layer(TraceLayer::new_for_http())
        .layer(Extension(Arc::new(state)))
}
