//! Outbound alert delivery.
//!
//! Two [`Messenger`] implementations are available:
//! - [`LogMessenger`] writes alerts to the log and always reports success
//! - [`WebhookMessenger`] POSTs each alert as JSON to a configured gateway

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use safezone_core::{MessagingConfig, Messenger};
use serde::Serialize;
use tracing::{info, warn};

/// Logs each alert instead of sending it.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMessenger;

#[async_trait]
impl Messenger for LogMessenger {
    async fn send_alert(&self, destination: &str, message: &str) -> bool {
        info!(destination, message, "Alert delivered to log");
        true
    }
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    destination: &'a str,
    message: &'a str,
}

/// Delivers alerts to an HTTP gateway.
#[derive(Debug, Clone)]
pub struct WebhookMessenger {
    client: reqwest::Client,
    url: String,
}

impl WebhookMessenger {
    /// Create a messenger posting to `url`, giving up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>, timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Messenger for WebhookMessenger {
    async fn send_alert(&self, destination: &str, message: &str) -> bool {
        let payload = WebhookPayload {
            destination,
            message,
        };

        match self.client.post(&self.url).json(&payload).send().await {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                warn!(
                    status = %response.status(),
                    url = %self.url,
                    "Alert gateway rejected message"
                );
                false
            }
            Err(e) => {
                warn!(error = %e, url = %self.url, "Alert gateway unreachable");
                false
            }
        }
    }
}

/// Build the messenger selected by configuration.
///
/// # Errors
///
/// Returns an error if the webhook client cannot be built.
pub fn build_messenger(config: &MessagingConfig) -> anyhow::Result<Arc<dyn Messenger>> {
    match &config.webhook_url {
        Some(url) => {
            info!(url = %url, "Delivering alerts through webhook");
            let timeout = Duration::from_secs(config.timeout_secs);
            let messenger = WebhookMessenger::new(url.clone(), timeout)?;
            Ok(Arc::new(messenger))
        }
        None => {
            info!("No alert webhook configured, alerts will only be logged");
            Ok(Arc::new(LogMessenger))
        }
    }
}
