//! Shared types and OpenAPI schemas.
//!
//! Wire types for inbound reports and outbound status updates live here so the
//! server crate and the engine agree on a single shape.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{Result, SafezoneError};
use crate::geo::Position;
use crate::zone::ZoneEvaluation;

/// Event name carried by every status update broadcast.
pub const LOCATION_UPDATE_EVENT: &str = "subject-location-update";

/// Internal identifier of a tracked subject.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct SubjectId(pub String);

impl SubjectId {
    /// Create a subject id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SubjectId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// A tracked subject as known to the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Subject {
    /// Internal id, used as the key of tracking state and in broadcasts.
    pub id: SubjectId,

    /// Id carried by location reports from the subject's device.
    pub external_id: String,

    /// Display name used in alert messages.
    pub name: String,

    /// Destination (phone number) of the family contact that receives alerts.
    #[serde(default)]
    pub contact: Option<String>,
}

/// A single coordinate as sent by a device: either a JSON number or a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum Coordinate {
    /// Numeric coordinate.
    Number(f64),
    /// Coordinate encoded as text, e.g. `"40.4168"`.
    Text(String),
}

impl Coordinate {
    /// Parse into finite degrees.
    ///
    /// # Errors
    ///
    /// Returns [`SafezoneError::InvalidCoordinate`] for unparsable or non-finite values.
    pub fn degrees(&self, field: &'static str) -> Result<f64> {
        let value = match self {
            Self::Number(n) => *n,
            Self::Text(raw) => raw.trim().parse::<f64>().map_err(|_| {
                SafezoneError::InvalidCoordinate {
                    field,
                    value: raw.clone(),
                }
            })?,
        };
        if value.is_finite() {
            Ok(value)
        } else {
            Err(SafezoneError::InvalidCoordinate {
                field,
                value: value.to_string(),
            })
        }
    }
}

impl From<f64> for Coordinate {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

/// A location report decoded from an inbound transport message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({"id": "user-17", "lat": "40.4168", "lng": -3.7038}))]
pub struct LocationReport {
    /// External id of the reporting subject.
    #[serde(alias = "subjectId")]
    pub id: String,

    /// Latitude in degrees.
    pub lat: Coordinate,

    /// Longitude in degrees.
    pub lng: Coordinate,
}

impl LocationReport {
    /// Build a report from numeric coordinates.
    pub fn new(id: impl Into<String>, lat: f64, lng: f64) -> Self {
        Self {
            id: id.into(),
            lat: lat.into(),
            lng: lng.into(),
        }
    }

    /// Decode the reported position.
    ///
    /// # Errors
    ///
    /// Returns [`SafezoneError::InvalidCoordinate`] if either coordinate is
    /// non-numeric or non-finite.
    pub fn position(&self) -> Result<Position> {
        Ok(Position::new(
            self.lat.degrees("lat")?,
            self.lng.degrees("lng")?,
        ))
    }
}

/// Status update broadcast to every connected observer after each report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "event": "subject-location-update",
    "subjectId": "42",
    "latitude": 40.4168,
    "longitude": -3.7038,
    "insideZone": true,
    "timestamp": "2025-01-15T03:30:00Z",
    "distanceMeters": 35.2,
    "zoneRadiusMeters": 150.0
}))]
pub struct StatusUpdate {
    /// Always [`LOCATION_UPDATE_EVENT`].
    pub event: String,

    /// Internal id of the subject.
    pub subject_id: SubjectId,

    /// Reported latitude.
    pub latitude: f64,

    /// Reported longitude.
    pub longitude: f64,

    /// Containment, or `null` when the subject has no safe zone configured.
    pub inside_zone: Option<bool>,

    /// When the report was processed.
    pub timestamp: DateTime<Utc>,

    /// Distance to the zone center (0 when unconfigured).
    pub distance_meters: f64,

    /// Configured zone radius (0 when unconfigured).
    pub zone_radius_meters: f64,
}

impl StatusUpdate {
    /// Update for a subject evaluated against its zone.
    #[must_use]
    pub fn evaluated(
        subject_id: SubjectId,
        position: Position,
        evaluation: ZoneEvaluation,
        zone_radius_meters: f64,
    ) -> Self {
        Self {
            event: LOCATION_UPDATE_EVENT.to_string(),
            subject_id,
            latitude: position.latitude,
            longitude: position.longitude,
            inside_zone: Some(evaluation.inside_zone),
            timestamp: Utc::now(),
            distance_meters: evaluation.distance_meters,
            zone_radius_meters,
        }
    }

    /// Update for a subject without a safe zone configuration.
    #[must_use]
    pub fn unconfigured(subject_id: SubjectId, position: Position) -> Self {
        Self {
            event: LOCATION_UPDATE_EVENT.to_string(),
            subject_id,
            latitude: position.latitude,
            longitude: position.longitude,
            inside_zone: None,
            timestamp: Utc::now(),
            distance_meters: 0.0,
            zone_radius_meters: 0.0,
        }
    }
}

/// A care request addressed to a caregiver, relayed as it appears in the directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CareRequest {
    /// Monotonically increasing request id.
    pub id: u64,

    /// Caregiver the request is addressed to.
    pub carer_id: String,

    /// Remaining request fields, forwarded untouched.
    #[serde(flatten)]
    pub details: serde_json::Map<String, serde_json::Value>,
}
