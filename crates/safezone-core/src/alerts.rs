//! Alert kinds, message rendering, and audit records.
//!
//! Alerts are built from a snapshot of the subject and position at the moment
//! they are scheduled. A recurring timer re-sends the same snapshot on every
//! tick; it never re-reads the directory.

use std::time::Duration;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::geo::Position;
use crate::types::{Subject, SubjectId};

/// Everything that is not a digit. A leading `+` is handled separately.
static NON_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\D").expect("static regex"));

/// What an alert is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// The subject just left its safe zone.
    LeftZone,
    /// Follow-up while the subject remains outside.
    StillOutside,
    /// The safe zone is switched off for this subject.
    ZoneDisabled,
    /// The subject has not moved for the inactivity interval.
    Inactivity,
    /// The subject has no safe zone configured.
    Unconfigured,
}

impl AlertKind {
    /// Stable name used in logs and the audit trail.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LeftZone => "left_zone",
            Self::StillOutside => "still_outside",
            Self::ZoneDisabled => "zone_disabled",
            Self::Inactivity => "inactivity",
            Self::Unconfigured => "unconfigured",
        }
    }
}

/// A rendered alert ready for dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    /// Id of this alert transaction, unique per send.
    pub id: Uuid,
    /// What the alert is about.
    pub kind: AlertKind,
    /// Subject the alert concerns.
    pub subject_id: SubjectId,
    /// Raw destination contact from the subject record.
    pub destination: Option<String>,
    /// Message body.
    pub message: String,
}

impl Alert {
    fn new(kind: AlertKind, subject: &Subject, message: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            subject_id: subject.id.clone(),
            destination: subject.contact.clone(),
            message,
        }
    }

    /// Immediate alert when a subject leaves its zone.
    #[must_use]
    pub fn left_zone(subject: &Subject, position: Position, radius_meters: f64) -> Self {
        Self::new(
            AlertKind::LeftZone,
            subject,
            format!(
                "Safety alert: *{}* has left the safe zone (radius {radius_meters} m).\n\
                 Current location:\nLat: {:.4}\nLng: {:.4}",
                subject.name, position.latitude, position.longitude
            ),
        )
    }

    /// Recurring follow-up while a subject stays outside.
    #[must_use]
    pub fn still_outside(subject: &Subject, position: Position) -> Self {
        Self::new(
            AlertKind::StillOutside,
            subject,
            format!(
                "Location follow-up: *{}* is still outside the safe zone.\n\
                 Lat: {:.4}\nLng: {:.4}",
                subject.name, position.latitude, position.longitude
            ),
        )
    }

    /// Recurring reminder while the zone is disabled.
    #[must_use]
    pub fn zone_disabled(subject: &Subject) -> Self {
        Self::new(
            AlertKind::ZoneDisabled,
            subject,
            format!(
                "The safe zone for *{}* is disabled. Enable it to receive automatic notifications.",
                subject.name
            ),
        )
    }

    /// Calm notice after a period without movement.
    #[must_use]
    pub fn inactivity(subject: &Subject, position: Position, still_for: Duration) -> Self {
        Self::new(
            AlertKind::Inactivity,
            subject,
            format!(
                "*{}* has stayed calm at the same spot for {}.\nLat: {:.4}\nLng: {:.4}",
                subject.name,
                describe_stillness(still_for),
                position.latitude,
                position.longitude
            ),
        )
    }

    /// One-time notice that the subject has no zone configured.
    #[must_use]
    pub fn unconfigured(subject: &Subject) -> Self {
        Self::new(
            AlertKind::Unconfigured,
            subject,
            format!(
                "*{}* has no safe zone configured. Please contact your system administrator.",
                subject.name
            ),
        )
    }

    /// Copy of this alert under a fresh transaction id, for the next timer tick.
    #[must_use]
    pub fn reissue(&self) -> Self {
        Self {
            id: Uuid::new_v4(),
            ..self.clone()
        }
    }
}

/// One entry of the alert audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertRecord {
    /// Alert transaction id.
    pub alert_id: Uuid,
    /// Subject the alert concerned.
    pub subject_id: SubjectId,
    /// What the alert was about.
    pub kind: AlertKind,
    /// Normalized destination, if the subject had one.
    pub destination: Option<String>,
    /// When dispatch started.
    pub started_at: DateTime<Utc>,
    /// When dispatch finished, delivered or not.
    pub finished_at: DateTime<Utc>,
    /// Whether the messenger reported success.
    pub delivered: bool,
}

/// Normalize a phone-like contact into digits with an optional leading `+`.
///
/// Returns `None` when nothing dialable remains.
#[must_use]
pub fn normalize_destination(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let digits = NON_DIGITS.replace_all(trimmed, "");
    if digits.is_empty() {
        return None;
    }
    if trimmed.starts_with('+') {
        Some(format!("+{digits}"))
    } else {
        Some(digits.into_owned())
    }
}

/// Seconds below one minute, whole minutes (rounded up) otherwise.
fn describe_stillness(still_for: Duration) -> String {
    let secs = still_for.as_secs();
    if secs < 60 {
        format!("{secs} s")
    } else {
        format!("{} min", secs.div_ceil(60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subject() -> Subject {
        Subject {
            id: SubjectId::new("42"),
            external_id: "user-42".into(),
            name: "Rosa".into(),
            contact: Some("+34 600-000-000".into()),
        }
    }

    #[test]
    fn test_normalize_destination() {
        assert_eq!(
            normalize_destination("+34 600-000-000").as_deref(),
            Some("+34600000000")
        );
        assert_eq!(
            normalize_destination(" (55) 1234 5678 ").as_deref(),
            Some("5512345678")
        );
        assert_eq!(normalize_destination("n/a"), None);
        assert_eq!(normalize_destination("+"), None);
    }

    #[test]
    fn test_inactivity_message_names_short_thresholds() {
        let position = Position::new(0.0, 0.0);
        let short = Alert::inactivity(&subject(), position, Duration::from_secs(30));
        assert!(short.message.contains("stayed calm"));
        assert!(short.message.contains("for 30 s."));

        let long = Alert::inactivity(&subject(), position, Duration::from_secs(90));
        assert!(long.message.contains("for 2 min."));

        let exact = Alert::inactivity(&subject(), position, Duration::from_secs(300));
        assert!(exact.message.contains("for 5 min."));
    }

    #[test]
    fn test_left_zone_message() {
        let alert = Alert::left_zone(&subject(), Position::new(0.0, 0.002), 100.0);
        assert_eq!(alert.kind, AlertKind::LeftZone);
        assert!(alert.message.contains("Rosa"));
        assert!(alert.message.contains("100 m"));
        assert!(alert.message.contains("0.0020"));
        assert_eq!(alert.destination.as_deref(), Some("+34 600-000-000"));
    }

    #[test]
    fn test_reissue_changes_only_id() {
        let alert = Alert::zone_disabled(&subject());
        let next = alert.reissue();
        assert_ne!(alert.id, next.id);
        assert_eq!(alert.message, next.message);
        assert_eq!(alert.kind, next.kind);
    }

    #[test]
    fn test_kind_names_match_serde() {
        for kind in [
            AlertKind::LeftZone,
            AlertKind::StillOutside,
            AlertKind::ZoneDisabled,
            AlertKind::Inactivity,
            AlertKind::Unconfigured,
        ] {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, kind.as_str());
        }
    }
}
