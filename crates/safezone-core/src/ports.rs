//! Collaborator interfaces the engine depends on.
//!
//! The engine never talks to a database, socket, or messaging provider
//! directly. Each of those is injected as one of these traits, which keeps the
//! core testable with in-memory doubles.

use async_trait::async_trait;

use crate::alerts::AlertRecord;
use crate::error::Result;
use crate::types::{CareRequest, StatusUpdate, Subject, SubjectId};
use crate::zone::ZoneConfig;

/// Read access to subject records and their safe zone configuration.
#[async_trait]
pub trait SubjectDirectory: Send + Sync {
    /// Resolve a subject by the id its device reports with.
    async fn subject_by_external_id(&self, external_id: &str) -> Result<Option<Subject>>;

    /// Current safe zone configuration, or `None` if the subject has none.
    async fn zone_config(&self, subject_id: &SubjectId) -> Result<Option<ZoneConfig>>;
}

/// Fan-out of status updates to every connected observer.
///
/// Publishing must not block; observers that are gone are skipped silently.
pub trait Broadcaster: Send + Sync {
    /// Deliver `update` to all currently connected observers.
    fn publish(&self, update: StatusUpdate);
}

/// Outbound messaging channel used to notify a subject's family.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Send `message` to `destination`. Returns `false` if it was not delivered.
    async fn send_alert(&self, destination: &str, message: &str) -> bool;
}

/// Sink recording every alert transaction.
#[async_trait]
pub trait AlertAudit: Send + Sync {
    /// Persist one dispatched alert with its start and end timestamps.
    async fn record(&self, record: AlertRecord) -> Result<()>;
}

/// Source of care requests addressed to caregivers.
#[async_trait]
pub trait RequestFeed: Send + Sync {
    /// All requests with an id strictly greater than `last_id`, in id order.
    async fn requests_after(&self, last_id: u64) -> Result<Vec<CareRequest>>;
}
