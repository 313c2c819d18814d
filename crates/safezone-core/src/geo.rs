//! Great-circle distance between coordinates.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{Result, SafezoneError};

/// Mean Earth radius used by the haversine formula, in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// A point on the Earth's surface in decimal degrees.
///
/// Equality is exact on both components. Inactivity detection relies on this:
/// a subject only counts as "not moving" when it reports the very same point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Position {
    /// Latitude in degrees.
    #[schema(example = 40.4168)]
    pub latitude: f64,

    /// Longitude in degrees.
    #[schema(example = -3.7038)]
    pub longitude: f64,
}

impl Position {
    /// Create a position from latitude and longitude in degrees.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Whether both components are finite numbers.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite()
    }

    /// Reject positions with non-finite components.
    ///
    /// # Errors
    ///
    /// Returns [`SafezoneError::InvalidCoordinate`] naming the first bad component.
    pub fn validate(self) -> Result<Self> {
        if !self.latitude.is_finite() {
            return Err(SafezoneError::InvalidCoordinate {
                field: "lat",
                value: self.latitude.to_string(),
            });
        }
        if !self.longitude.is_finite() {
            return Err(SafezoneError::InvalidCoordinate {
                field: "lng",
                value: self.longitude.to_string(),
            });
        }
        Ok(self)
    }
}

/// Distance in meters between two positions along a great circle.
///
/// Uses the haversine formula on a sphere of radius [`EARTH_RADIUS_METERS`].
/// Non-finite inputs produce a non-finite result; validate first.
#[must_use]
pub fn distance(a: Position, b: Position) -> f64 {
    let lat_a = a.latitude.to_radians();
    let lat_b = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lng = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_METERS * c
}
