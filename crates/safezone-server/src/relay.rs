//! Care-request relay.
//!
//! Polls the request feed for requests newer than the last one seen and
//! pushes each to its caregiver, if that caregiver is connected.

use std::sync::Arc;
use std::time::Duration;

use safezone_core::{CareRequest, RequestFeed};
use serde::Serialize;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::observers::CaregiverRegistry;

/// Message type pushed to caregivers for each new request.
pub const NEW_REQUEST_TYPE: &str = "new-request";

#[derive(Debug, Serialize)]
struct NewRequestMessage<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    data: &'a CareRequest,
}

/// Forwards new care requests to connected caregivers.
pub struct RequestRelay {
    feed: Arc<dyn RequestFeed>,
    caregivers: CaregiverRegistry,
    last_seen: u64,
}

impl RequestRelay {
    /// Create a relay starting before the first request.
    pub fn new(feed: Arc<dyn RequestFeed>, caregivers: CaregiverRegistry) -> Self {
        Self {
            feed,
            caregivers,
            last_seen: 0,
        }
    }

    /// Highest request id handled so far.
    #[must_use]
    pub const fn last_seen(&self) -> u64 {
        self.last_seen
    }

    /// Fetch and forward requests newer than the last one seen.
    ///
    /// Returns how many requests reached a connected caregiver. Requests for
    /// absent caregivers are skipped and not retried.
    ///
    /// # Errors
    ///
    /// Returns an error if the feed cannot be read.
    pub async fn poll_once(&mut self) -> safezone_core::Result<usize> {
        let requests = self.feed.requests_after(self.last_seen).await?;
        if requests.is_empty() {
            return Ok(0);
        }

        let mut forwarded = 0;
        for request in &requests {
            self.last_seen = self.last_seen.max(request.id);

            let message = NewRequestMessage {
                kind: NEW_REQUEST_TYPE,
                data: request,
            };
            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(e) => {
                    error!(request_id = request.id, error = %e, "Failed to encode care request");
                    continue;
                }
            };

            if self.caregivers.send(&request.carer_id, text) {
                info!(
                    request_id = request.id,
                    caregiver = %request.carer_id,
                    "Care request forwarded"
                );
                forwarded += 1;
            } else {
                debug!(
                    request_id = request.id,
                    caregiver = %request.carer_id,
                    "Caregiver not connected"
                );
            }
        }

        Ok(forwarded)
    }

    /// Poll forever every `period`.
    pub async fn run(mut self, period: Duration) {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if let Err(e) = self.poll_once().await {
                error!(error = %e, error_code = e.error_code(), "Care request poll failed");
            }
        }
    }
}
