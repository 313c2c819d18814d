//! # safezone-core
//!
//! Core business logic for the safezone geofencing system.
//!
//! This crate provides:
//! - Great-circle distance and safe zone containment
//! - Per-subject tracking state with keyed, lazily created entries
//! - The notification scheduler that debounces "left zone", "zone disabled",
//!   and inactivity alerts
//! - The location processor that ties a report to broadcasts and alerts
//! - A file-backed subject directory and alert audit log
//!
//! ## Architecture
//!
//! The crate is organized into the following modules:
//!
//! - [`geo`] - Haversine distance between positions
//! - [`zone`] - Safe zone configuration and containment evaluation
//! - [`tracking`] - Keyed per-subject state store and timer handles
//! - [`scheduler`] - Alert state machine and its timers
//! - [`processor`] - Report orchestration
//! - [`alerts`] - Alert kinds, messages, and audit records
//! - [`dispatch`] - Fire-and-forget alert delivery
//! - [`ports`] - Collaborator traits (directory, broadcaster, messenger, audit)
//! - [`storage`] - File-backed implementations of the persistence ports
//! - [`config`] - Application configuration loading and validation
//! - [`error`] - Unified error types for the crate
//! - [`types`] - Shared wire types and OpenAPI schemas

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![warn(missing_docs)]

pub mod alerts;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod geo;
pub mod ports;
pub mod processor;
pub mod scheduler;
pub mod storage;
pub mod tracking;
pub mod types;
pub mod zone;

#[cfg(test)]
mod testing;

// Re-export primary types for convenience
pub use alerts::{normalize_destination, Alert, AlertKind, AlertRecord};
pub use crate::config::{
    Config, ConfigError, ConfigResult, EngineSettings, MessagingConfig, RequestsConfig,
    ServerConfig, StorageConfig,
};
pub use dispatch::AlertDispatcher;
pub use error::{Result, SafezoneError};
pub use geo::{distance, Position, EARTH_RADIUS_METERS};
pub use ports::{AlertAudit, Broadcaster, Messenger, RequestFeed, SubjectDirectory};
pub use processor::{LocationProcessor, ProcessOutcome};
pub use scheduler::{NotificationScheduler, ReportContext};
pub use storage::{default_data_dir, Directory, Storage, SubjectRecord};
pub use tracking::{TrackingSnapshot, TrackingStore};
pub use types::{
    CareRequest, Coordinate, LocationReport, StatusUpdate, Subject, SubjectId,
    LOCATION_UPDATE_EVENT,
};
pub use zone::{evaluate, ZoneConfig, ZoneEvaluation};
