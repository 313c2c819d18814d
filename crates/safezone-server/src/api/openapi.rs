//! OpenAPI specification generation for the safezone API.
//!
//! The WebSocket endpoint at `/ws` is not described here; its message
//! formats are documented in [`crate::ws`].

use axum::Json;
use safezone_core::{
    AlertKind, Coordinate, LocationReport, Position, ProcessOutcome, StatusUpdate, SubjectId,
    TrackingSnapshot,
};
use utoipa::OpenApi;

use super::error::ErrorResponse;
use super::health::HealthResponse;

/// Serve the OpenAPI specification as JSON.
///
/// This endpoint is available at `/api/openapi.json`.
pub async fn get_openapi_spec() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Returns the OpenAPI specification as a pretty-printed string.
/// Used by the gen-openapi binary.
///
/// # Errors
///
/// Returns an error if the document cannot be serialized.
pub fn get_openapi_json() -> serde_json::Result<String> {
    ApiDoc::openapi().to_pretty_json()
}

/// Main OpenAPI document structure for safezone.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "safezone API",
        version = "0.1.0",
        description = r#"
# safezone API

safezone watches the reported location of people under care and alerts their
family contact when they leave their safe zone, when the zone is switched off,
or when they stop moving for too long.

## Overview

- **Location reports** arrive over the `/ws` WebSocket or `POST /api/locations`.
- **Status updates** are pushed to every WebSocket client after each report.
- **Alerts** are debounced: one on leaving the zone, then reminders at the
  configured interval until the subject is back inside.
"#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "/", description = "Local safezone server")
    ),
    tags(
        (name = "system", description = "Health checks"),
        (name = "locations", description = "Location report ingestion"),
        (name = "tracking", description = "Per-subject tracking state")
    ),
    paths(
        super::health::health_check,
        super::locations::submit_location,
        super::tracking::get_tracking,
    ),
    components(
        schemas(
            ErrorResponse,
            HealthResponse,
            LocationReport,
            Coordinate,
            Position,
            SubjectId,
            ProcessOutcome,
            AlertKind,
            TrackingSnapshot,
            StatusUpdate,
        )
    )
)]
pub struct ApiDoc;
