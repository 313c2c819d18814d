//! Unified error types for the safezone core library.
//!
//! This module provides a unified error type [`SafezoneError`] that covers all failure
//! modes across the tracking engine. The configuration module keeps its own specific
//! error type ([`ConfigError`](crate::config::ConfigError)) which converts into it.
//!
//! # Taxonomy
//!
//! - **Not found**: the subject behind a report is unknown
//! - **Invalid input**: coordinates that are non-numeric or non-finite, or a zone
//!   configuration that violates its invariants
//! - **Dispatch**: an alert could not be delivered to its destination
//! - **Persistence**: the subject directory or audit log failed
//!
//! None of these are fatal. The location processor recovers every one of them
//! locally and keeps serving subsequent reports.
//!
//! # Example
//!
//! ```rust
//! use safezone_core::error::{SafezoneError, Result};
//!
//! fn parse_latitude(raw: &str) -> Result<f64> {
//!     raw.trim().parse().map_err(|_| SafezoneError::InvalidCoordinate {
//!         field: "lat",
//!         value: raw.to_string(),
//!     })
//! }
//!
//! assert!(parse_latitude("north").is_err());
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// The unified error type for all safezone operations.
#[derive(Debug, Error)]
pub enum SafezoneError {
    // =========================================================================
    // LOOKUP ERRORS
    // =========================================================================
    /// No subject is registered under the external id carried by a report.
    #[error("No subject registered for id '{0}'")]
    SubjectNotFound(String),

    // =========================================================================
    // INPUT ERRORS
    // =========================================================================
    /// A coordinate could not be parsed or is not a finite number.
    #[error("Invalid {field} coordinate: '{value}'. Expected a finite number of degrees.")]
    InvalidCoordinate {
        /// Which coordinate was rejected (`lat` or `lng`).
        field: &'static str,
        /// The raw value as received.
        value: String,
    },

    /// The computed distance to the zone center is not a finite number.
    #[error("Distance to safe zone center is not finite ({0})")]
    NonFiniteDistance(f64),

    /// The stored safe zone configuration violates its invariants.
    #[error("Invalid safe zone configuration: {0}")]
    InvalidZoneConfig(String),

    // =========================================================================
    // DISPATCH ERRORS
    // =========================================================================
    /// The subject has no contact on record to send alerts to.
    #[error("No destination contact on record for subject '{0}'")]
    MissingContact(String),

    /// The messaging collaborator reported the alert as not delivered.
    #[error("Alert delivery failed: {0}")]
    DispatchFailed(String),

    // =========================================================================
    // CONFIGURATION ERRORS
    // =========================================================================
    /// The configuration file was not found at the expected path.
    #[error("Configuration file not found at: {}", .0.display())]
    ConfigNotFound(PathBuf),

    /// The configuration file exists but could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    ConfigParseError(String),

    /// The configuration was parsed but contains invalid values.
    #[error("Configuration validation failed: {0}")]
    ConfigValidationError(String),

    // =========================================================================
    // PERSISTENCE & I/O ERRORS
    // =========================================================================
    /// An error occurred while persisting or reading data.
    #[error("Persistence error: {0}")]
    PersistenceError(String),

    /// A low-level I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// A specialized [`Result`] type for safezone operations.
pub type Result<T> = std::result::Result<T, SafezoneError>;

impl SafezoneError {
    /// Returns `true` if the report referenced something that does not exist.
    #[inline]
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::SubjectNotFound(_))
    }

    /// Returns `true` if the report or stored zone carried unusable values.
    #[inline]
    #[must_use]
    pub const fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            Self::InvalidCoordinate { .. } | Self::NonFiniteDistance(_) | Self::InvalidZoneConfig(_)
        )
    }

    /// Returns `true` if this error comes from alert delivery.
    #[inline]
    #[must_use]
    pub const fn is_dispatch_error(&self) -> bool {
        matches!(self, Self::MissingContact(_) | Self::DispatchFailed(_))
    }

    /// Returns `true` if this error is related to configuration.
    #[inline]
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigNotFound(_) | Self::ConfigParseError(_) | Self::ConfigValidationError(_)
        )
    }

    /// Returns `true` if this error is related to I/O or persistence.
    #[inline]
    #[must_use]
    pub const fn is_persistence_error(&self) -> bool {
        matches!(self, Self::PersistenceError(_) | Self::IoError(_))
    }

    /// Returns `true` if this error is an expected operational condition
    /// rather than a system failure. These are logged at warning level.
    #[inline]
    #[must_use]
    pub const fn is_expected_state(&self) -> bool {
        self.is_not_found() || self.is_invalid_input()
    }

    /// Returns an HTTP-appropriate status code for this error.
    #[inline]
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - malformed input
            Self::InvalidCoordinate { .. } => 400,

            // 404 Not Found
            Self::SubjectNotFound(_) | Self::ConfigNotFound(_) => 404,

            // 422 Unprocessable Entity - semantic errors
            Self::NonFiniteDistance(_)
            | Self::InvalidZoneConfig(_)
            | Self::ConfigParseError(_)
            | Self::ConfigValidationError(_) => 422,

            // 500 Internal Server Error - server-side issues
            Self::PersistenceError(_) | Self::IoError(_) => 500,

            // 502 Bad Gateway - the messaging provider failed us
            Self::MissingContact(_) | Self::DispatchFailed(_) => 502,
        }
    }

    /// Returns a machine-readable error code for API responses and logs.
    #[inline]
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::SubjectNotFound(_) => "SUBJECT_NOT_FOUND",
            Self::InvalidCoordinate { .. } => "INVALID_COORDINATE",
            Self::NonFiniteDistance(_) => "NON_FINITE_DISTANCE",
            Self::InvalidZoneConfig(_) => "INVALID_ZONE_CONFIG",
            Self::MissingContact(_) => "MISSING_CONTACT",
            Self::DispatchFailed(_) => "DISPATCH_FAILED",
            Self::ConfigNotFound(_) => "CONFIG_NOT_FOUND",
            Self::ConfigParseError(_) => "CONFIG_PARSE_ERROR",
            Self::ConfigValidationError(_) => "CONFIG_VALIDATION_ERROR",
            Self::PersistenceError(_) => "PERSISTENCE_ERROR",
            Self::IoError(_) => "IO_ERROR",
        }
    }
}

// =============================================================================
// CONVERSIONS FROM MODULE-SPECIFIC ERRORS
// =============================================================================

impl From<crate::config::ConfigError> for SafezoneError {
    fn from(err: crate::config::ConfigError) -> Self {
        use crate::config::ConfigError;
        match err {
            ConfigError::NotFound(path) => Self::ConfigNotFound(path),
            ConfigError::ReadError { path, source } => {
                Self::PersistenceError(format!("Failed to read {}: {}", path.display(), source))
            }
            ConfigError::WriteError { path, source } => {
                Self::PersistenceError(format!("Failed to write {}: {}", path.display(), source))
            }
            ConfigError::ParseError(e) => Self::ConfigParseError(e.to_string()),
            ConfigError::SerializeError(e) => Self::ConfigParseError(e.to_string()),
            ConfigError::ValidationError { field, message } => {
                Self::ConfigValidationError(format!("{field}: {message}"))
            }
            ConfigError::MultipleValidationErrors(errors) => {
                let messages: Vec<String> = errors.into_iter().map(|e| e.to_string()).collect();
                Self::ConfigValidationError(messages.join("; "))
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
