//! Tracking state inspection.

use axum::extract::{Path, State};
use axum::Json;
use safezone_core::{SafezoneError, SubjectId, TrackingSnapshot};

use super::error::{ApiResult, ErrorResponse};
use crate::state::AppState;

/// Get the tracking state of a subject.
///
/// Timer fields carry the generation of the running timer, or `null`.
/// Subjects that have never reported are unknown.
#[utoipa::path(
    get,
    path = "/api/subjects/{subject_id}/tracking",
    tag = "tracking",
    operation_id = "getTracking",
    summary = "Inspect a subject's tracking state",
    description = "Returns the last known position, how long the subject has been \
        still, and which alert timers are currently running.",
    params(
        ("subject_id" = String, Path, description = "Internal subject id")
    ),
    responses(
        (status = 200, description = "Tracking state", body = TrackingSnapshot),
        (status = 404, description = "Subject has never been tracked", body = ErrorResponse)
    )
)]
pub async fn get_tracking(
    State(state): State<AppState>,
    Path(subject_id): Path<String>,
) -> ApiResult<Json<TrackingSnapshot>> {
    state
        .processor()
        .store()
        .snapshot(&SubjectId::new(subject_id.as_str()))
        .map(Json)
        .ok_or_else(|| SafezoneError::SubjectNotFound(subject_id).into())
}
