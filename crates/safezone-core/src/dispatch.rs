//! Fire-and-forget alert delivery.
//!
//! Every send runs on its own task so a slow messaging provider never stalls
//! report processing or timer ticks. Failures are logged and audited; they are
//! never retried and never feed back into timer state.

use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::alerts::{normalize_destination, Alert, AlertRecord};
use crate::error::{Result, SafezoneError};
use crate::ports::{AlertAudit, Messenger};

/// Sends alerts through the injected messenger and records them in the audit sink.
#[derive(Clone)]
pub struct AlertDispatcher {
    messenger: Arc<dyn Messenger>,
    audit: Arc<dyn AlertAudit>,
}

impl AlertDispatcher {
    /// Create a dispatcher over the given collaborators.
    pub fn new(messenger: Arc<dyn Messenger>, audit: Arc<dyn AlertAudit>) -> Self {
        Self { messenger, audit }
    }

    /// Deliver `alert` on a background task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn dispatch(&self, alert: Alert) -> JoinHandle<bool> {
        let dispatcher = self.clone();
        tokio::spawn(async move { dispatcher.deliver(alert).await })
    }

    /// Deliver `alert` and record the transaction. Returns whether it was delivered.
    pub async fn deliver(&self, alert: Alert) -> bool {
        let started_at = Utc::now();
        let destination = alert.destination.as_deref().and_then(normalize_destination);

        let outcome = self.send(&alert, destination.as_deref()).await;
        let delivered = match &outcome {
            Ok(()) => {
                debug!(
                    alert_id = %alert.id,
                    subject_id = %alert.subject_id,
                    kind = alert.kind.as_str(),
                    "Alert delivered"
                );
                true
            }
            Err(err) => {
                error!(
                    alert_id = %alert.id,
                    subject_id = %alert.subject_id,
                    kind = alert.kind.as_str(),
                    error = %err,
                    "Alert not delivered"
                );
                false
            }
        };

        let record = AlertRecord {
            alert_id: alert.id,
            subject_id: alert.subject_id.clone(),
            kind: alert.kind,
            destination,
            started_at,
            finished_at: Utc::now(),
            delivered,
        };
        if let Err(err) = self.audit.record(record).await {
            warn!(alert_id = %alert.id, error = %err, "Failed to record alert in audit log");
        }

        delivered
    }

    async fn send(&self, alert: &Alert, destination: Option<&str>) -> Result<()> {
        let destination =
            destination.ok_or_else(|| SafezoneError::MissingContact(alert.subject_id.to_string()))?;
        if self.messenger.send_alert(destination, &alert.message).await {
            Ok(())
        } else {
            Err(SafezoneError::DispatchFailed(format!(
                "messenger rejected {} alert to {destination}",
                alert.kind.as_str()
            )))
        }
    }
}
