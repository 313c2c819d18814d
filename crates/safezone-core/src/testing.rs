//! In-memory collaborators for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::alerts::AlertRecord;
use crate::config::EngineSettings;
use crate::error::{Result, SafezoneError};
use crate::geo::Position;
use crate::ports::{AlertAudit, Broadcaster, Messenger, SubjectDirectory};
use crate::processor::LocationProcessor;
use crate::tracking::TrackingSnapshot;
use crate::types::{StatusUpdate, Subject, SubjectId};
use crate::zone::ZoneConfig;

/// Subject with a dialable contact derived from its id.
pub fn subject(id: &str, external_id: &str) -> Subject {
    Subject {
        id: SubjectId::new(id),
        external_id: external_id.to_string(),
        name: format!("Subject {id}"),
        contact: Some(format!("+34 600 000 00{id}")),
    }
}

/// Zone centered on (0, 0) with a one-minute reminder and five-minute inactivity threshold.
pub fn zone(enabled: bool, radius_meters: f64) -> ZoneConfig {
    ZoneConfig {
        enabled,
        center: Position::new(0.0, 0.0),
        radius_meters,
        notification_interval_ms: 60_000,
        inactivity_interval_ms: 300_000,
    }
}

/// Let spawned dispatch tasks run to completion.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

#[derive(Default)]
pub struct MemoryDirectory {
    subjects: Mutex<HashMap<String, Subject>>,
    zones: Mutex<HashMap<SubjectId, ZoneConfig>>,
    failing: AtomicBool,
}

impl MemoryDirectory {
    pub fn add(&self, id: &str, external_id: &str, zone: Option<ZoneConfig>) {
        self.subjects
            .lock()
            .unwrap()
            .insert(external_id.to_string(), subject(id, external_id));
        self.set_zone(id, zone);
    }

    pub fn set_zone(&self, id: &str, zone: Option<ZoneConfig>) {
        let mut zones = self.zones.lock().unwrap();
        match zone {
            Some(zone) => zones.insert(SubjectId::new(id), zone),
            None => zones.remove(&SubjectId::new(id)),
        };
    }

    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(SafezoneError::PersistenceError("database unavailable".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SubjectDirectory for MemoryDirectory {
    async fn subject_by_external_id(&self, external_id: &str) -> Result<Option<Subject>> {
        self.check()?;
        Ok(self.subjects.lock().unwrap().get(external_id).cloned())
    }

    async fn zone_config(&self, subject_id: &SubjectId) -> Result<Option<ZoneConfig>> {
        self.check()?;
        Ok(self.zones.lock().unwrap().get(subject_id).cloned())
    }
}

#[derive(Default)]
pub struct RecordingBroadcaster {
    updates: Mutex<Vec<StatusUpdate>>,
}

impl RecordingBroadcaster {
    pub fn updates(&self) -> Vec<StatusUpdate> {
        self.updates.lock().unwrap().clone()
    }
}

impl Broadcaster for RecordingBroadcaster {
    fn publish(&self, update: StatusUpdate) {
        self.updates.lock().unwrap().push(update);
    }
}

pub struct RecordingMessenger {
    sent: Mutex<Vec<(String, String)>>,
    succeed: AtomicBool,
}

impl Default for RecordingMessenger {
    fn default() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            succeed: AtomicBool::new(true),
        }
    }
}

impl RecordingMessenger {
    pub fn set_succeed(&self, succeed: bool) {
        self.succeed.store(succeed, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    /// Short tag per sent message, in send order.
    pub fn kinds_sent(&self) -> Vec<&'static str> {
        self.sent()
            .iter()
            .map(|(_, message)| {
                if message.contains("still outside") {
                    "still"
                } else if message.contains("has left") {
                    "left"
                } else if message.contains("is disabled") {
                    "disabled"
                } else if message.contains("stayed calm") {
                    "calm"
                } else if message.contains("no safe zone configured") {
                    "unconfigured"
                } else {
                    "other"
                }
            })
            .collect()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_alert(&self, destination: &str, message: &str) -> bool {
        self.sent
            .lock()
            .unwrap()
            .push((destination.to_string(), message.to_string()));
        self.succeed.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
pub struct RecordingAudit {
    records: Mutex<Vec<AlertRecord>>,
}

impl RecordingAudit {
    pub fn records(&self) -> Vec<AlertRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl AlertAudit for RecordingAudit {
    async fn record(&self, record: AlertRecord) -> Result<()> {
        self.records.lock().unwrap().push(record);
        Ok(())
    }
}

/// A processor wired to recording doubles.
pub struct Harness {
    pub processor: LocationProcessor,
    pub directory: Arc<MemoryDirectory>,
    pub broadcaster: Arc<RecordingBroadcaster>,
    pub messenger: Arc<RecordingMessenger>,
    pub audit: Arc<RecordingAudit>,
}

impl Harness {
    pub fn new(settings: EngineSettings) -> Self {
        let directory = Arc::new(MemoryDirectory::default());
        let broadcaster = Arc::new(RecordingBroadcaster::default());
        let messenger = Arc::new(RecordingMessenger::default());
        let audit = Arc::new(RecordingAudit::default());
        let processor = LocationProcessor::new(
            directory.clone(),
            broadcaster.clone(),
            messenger.clone(),
            audit.clone(),
            settings,
        );
        Self {
            processor,
            directory,
            broadcaster,
            messenger,
            audit,
        }
    }

    pub fn snapshot(&self, id: &str) -> TrackingSnapshot {
        self.processor
            .store()
            .snapshot(&SubjectId::new(id))
            .expect("subject has been tracked")
    }
}
