//! HTTP API routes and handlers.
//!
//! This module contains all HTTP endpoint implementations organized by domain:
//! - `health` - Service health checks
//! - `locations` - Location report ingestion
//! - `tracking` - Per-subject tracking state
//! - `error` - API error types
//! - `openapi` - OpenAPI specification generation

use axum::routing::{get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::ws;

pub mod error;
pub mod health;
pub mod locations;
pub mod openapi;
pub mod tracking;

pub use error::{ApiError, ApiResult, ErrorResponse};
pub use openapi::get_openapi_json;

/// Creates the combined router with all endpoints.
///
/// # Route Structure
///
/// ```text
/// /health                              - Health check
/// /ws                                  - WebSocket transport
/// /api
/// ├── /locations                       - Submit a location report
/// ├── /subjects/{subject_id}/tracking  - Tracking state of a subject
/// └── /openapi.json                    - OpenAPI specification
/// ```
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .route("/ws", get(ws::ws_handler))
        .nest(
            "/api",
            Router::new()
                .route("/locations", post(locations::submit_location))
                .route(
                    "/subjects/{subject_id}/tracking",
                    get(tracking::get_tracking),
                )
                .route("/openapi.json", get(openapi::get_openapi_spec)),
        )
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
