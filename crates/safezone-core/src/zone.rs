//! Safe zone configuration and containment evaluation.
//!
//! A safe zone is a circle around a center point. A subject is inside when its
//! great-circle distance to the center is at most the configured radius.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{Result, SafezoneError};
use crate::geo::{distance, Position};

/// Per-subject safe zone configuration, read from the directory on every report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ZoneConfig {
    /// Whether automatic zone alerts are active for this subject.
    pub enabled: bool,

    /// Center of the safe zone.
    pub center: Position,

    /// Radius of the safe zone in meters.
    #[schema(example = 150.0, minimum = 0)]
    pub radius_meters: f64,

    /// Interval between follow-up alerts while outside or disabled.
    #[schema(example = 300_000)]
    pub notification_interval_ms: u64,

    /// How long a subject must stay on the same point before a calm alert.
    #[schema(example = 900_000)]
    pub inactivity_interval_ms: u64,
}

impl ZoneConfig {
    /// Period of the recurring "still outside" and "zone disabled" alerts.
    #[must_use]
    pub const fn notification_interval(&self) -> Duration {
        Duration::from_millis(self.notification_interval_ms)
    }

    /// Inactivity threshold and the delay of the calm alert.
    #[must_use]
    pub const fn inactivity_interval(&self) -> Duration {
        Duration::from_millis(self.inactivity_interval_ms)
    }

    /// Check the invariants a stored configuration must satisfy.
    ///
    /// # Errors
    ///
    /// Returns [`SafezoneError::InvalidZoneConfig`] if the radius is negative or
    /// not finite, or if the center is not a finite position.
    pub fn validate(&self) -> Result<()> {
        if !self.radius_meters.is_finite() || self.radius_meters < 0.0 {
            return Err(SafezoneError::InvalidZoneConfig(format!(
                "radius_meters must be a non-negative number (got {})",
                self.radius_meters
            )));
        }
        if !self.center.is_finite() {
            return Err(SafezoneError::InvalidZoneConfig(
                "center must have finite coordinates".into(),
            ));
        }
        Ok(())
    }
}

/// Result of checking one position against a zone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ZoneEvaluation {
    /// Whether the position lies within the zone radius.
    pub inside_zone: bool,

    /// Great-circle distance from the zone center in meters.
    pub distance_meters: f64,
}

/// Decide containment of `position` within `config`.
///
/// The boundary counts as inside.
///
/// # Errors
///
/// Returns [`SafezoneError::NonFiniteDistance`] instead of a containment
/// decision when the computed distance is not finite.
pub fn evaluate(position: Position, config: &ZoneConfig) -> Result<ZoneEvaluation> {
    let distance_meters = distance(position, config.center);
    if !distance_meters.is_finite() {
        return Err(SafezoneError::NonFiniteDistance(distance_meters));
    }
    Ok(ZoneEvaluation {
        inside_zone: distance_meters <= config.radius_meters,
        distance_meters,
    })
}
