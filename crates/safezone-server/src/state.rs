//! Application state shared across handlers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use safezone_core::{Config, LocationProcessor, Messenger, Storage};
use tokio::task::JoinHandle;
use tracing::info;

use crate::messaging::build_messenger;
use crate::observers::{CaregiverRegistry, ObserverHub};
use crate::relay::RequestRelay;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    storage: Arc<Storage>,
    hub: ObserverHub,
    caregivers: CaregiverRegistry,
    processor: LocationProcessor,
    started_at: Instant,
}

impl AppState {
    /// Build the engine and transports described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured messenger cannot be created.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let storage = Arc::new(Storage::new(
            config.storage.data_file(),
            config.storage.audit_file(),
        ));
        let messenger = build_messenger(&config.messaging)?;
        Ok(Self::with_parts(config, storage, messenger))
    }

    /// Assemble state from already built collaborators.
    pub fn with_parts(
        config: Config,
        storage: Arc<Storage>,
        messenger: Arc<dyn Messenger>,
    ) -> Self {
        let hub = ObserverHub::new(config.server.broadcast_capacity);
        let processor = LocationProcessor::new(
            storage.clone(),
            Arc::new(hub.clone()),
            messenger,
            storage.clone(),
            config.engine,
        );

        Self {
            inner: Arc::new(AppStateInner {
                config,
                storage,
                hub,
                caregivers: CaregiverRegistry::new(),
                processor,
                started_at: Instant::now(),
            }),
        }
    }

    /// Loaded configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// File-backed directory and audit log.
    #[must_use]
    pub fn storage(&self) -> &Arc<Storage> {
        &self.inner.storage
    }

    /// Status update fan-out.
    #[must_use]
    pub fn hub(&self) -> &ObserverHub {
        &self.inner.hub
    }

    /// Connected caregivers.
    #[must_use]
    pub fn caregivers(&self) -> &CaregiverRegistry {
        &self.inner.caregivers
    }

    /// The location processing engine.
    #[must_use]
    pub fn processor(&self) -> &LocationProcessor {
        &self.inner.processor
    }

    /// Seconds since the state was built.
    #[must_use]
    pub fn uptime_secs(&self) -> u64 {
        self.inner.started_at.elapsed().as_secs()
    }

    /// Start the care-request relay, unless disabled.
    pub fn spawn_request_relay(&self) -> Option<JoinHandle<()>> {
        let requests = &self.inner.config.requests;
        if !requests.enabled {
            info!("Care request relay disabled");
            return None;
        }

        let period = Duration::from_millis(requests.poll_interval_ms);
        let relay = RequestRelay::new(self.inner.storage.clone(), self.inner.caregivers.clone());
        info!(poll_interval_ms = requests.poll_interval_ms, "Care request relay started");
        Some(tokio::spawn(relay.run(period)))
    }
}
