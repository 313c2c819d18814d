//! HTTP ingestion of location reports.

use axum::extract::State;
use axum::Json;
use safezone_core::{LocationProcessor, LocationReport, ProcessOutcome};

use super::error::{ApiError, ApiResult, ErrorResponse};
use crate::state::AppState;

/// Submit a location report.
///
/// Same processing as a WebSocket `location` message, but rejected reports
/// are answered with an error instead of being dropped silently.
#[utoipa::path(
    post,
    path = "/api/locations",
    tag = "locations",
    operation_id = "submitLocation",
    summary = "Submit a location report",
    description = "Evaluates the report against the subject's safe zone, broadcasts \
        the resulting status update, and schedules or cancels alerts. Coordinates \
        may be numbers or numeric strings.",
    request_body = LocationReport,
    responses(
        (status = 200, description = "Report processed", body = ProcessOutcome),
        (status = 400, description = "Coordinates are not numbers", body = ErrorResponse),
        (status = 404, description = "Unknown subject", body = ErrorResponse),
        (status = 422, description = "Stored zone is unusable", body = ErrorResponse),
        (status = 500, description = "Directory unavailable", body = ErrorResponse)
    )
)]
pub async fn submit_location(
    State(state): State<AppState>,
    Json(report): Json<LocationReport>,
) -> ApiResult<Json<ProcessOutcome>> {
    state
        .processor()
        .process_checked(&report)
        .await
        .map(Json)
        .map_err(|e| {
            LocationProcessor::log_rejection(&report.id, &e);
            ApiError::from(e)
        })
}
