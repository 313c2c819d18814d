//! File-backed subject directory and alert audit log.
//!
//! The directory is a single JSON document holding subjects, their safe zone
//! configuration, and pending care requests. It is re-read on every lookup so
//! edits made by other tools take effect on the next report. Alert audit
//! records are appended to a separate JSON-lines file.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use crate::alerts::AlertRecord;
use crate::error::{Result, SafezoneError};
use crate::ports::{AlertAudit, RequestFeed, SubjectDirectory};
use crate::types::{CareRequest, Subject, SubjectId};
use crate::zone::ZoneConfig;

/// A subject record as stored in the directory file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectRecord {
    /// The subject itself.
    #[serde(flatten)]
    pub subject: Subject,

    /// Safe zone configuration, absent when none has been set up.
    #[serde(default)]
    pub zone: Option<ZoneConfig>,
}

/// Contents of the directory file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Directory {
    /// Known subjects.
    #[serde(default)]
    pub subjects: Vec<SubjectRecord>,

    /// Care requests addressed to caregivers.
    #[serde(default)]
    pub requests: Vec<CareRequest>,
}

/// Storage backend for safezone data.
#[derive(Debug, Clone)]
pub struct Storage {
    data_file: PathBuf,
    audit_file: PathBuf,
}

impl Storage {
    /// Create a new storage instance.
    ///
    /// # Arguments
    ///
    /// * `data_file` - JSON directory document
    /// * `audit_file` - JSON-lines alert audit log
    pub fn new(data_file: PathBuf, audit_file: PathBuf) -> Self {
        Self {
            data_file,
            audit_file,
        }
    }

    /// Path of the directory document.
    #[must_use]
    pub fn data_file(&self) -> &Path {
        &self.data_file
    }

    /// Load the directory document. A missing file is an empty directory.
    ///
    /// # Errors
    ///
    /// Returns a persistence error if the file cannot be read or parsed.
    pub async fn load(&self) -> Result<Directory> {
        match tokio::fs::read_to_string(&self.data_file).await {
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                SafezoneError::PersistenceError(format!(
                    "Failed to parse {}: {e}",
                    self.data_file.display()
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Directory::default()),
            Err(e) => Err(SafezoneError::PersistenceError(format!(
                "Failed to read {}: {e}",
                self.data_file.display()
            ))),
        }
    }

    /// Replace the directory document.
    ///
    /// # Errors
    ///
    /// Returns a persistence error if the file cannot be written.
    pub async fn save(&self, directory: &Directory) -> Result<()> {
        if let Some(parent) = self.data_file.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(directory).map_err(|e| {
            SafezoneError::PersistenceError(format!("Failed to serialize directory: {e}"))
        })?;
        tokio::fs::write(&self.data_file, content).await.map_err(|e| {
            SafezoneError::PersistenceError(format!(
                "Failed to write {}: {e}",
                self.data_file.display()
            ))
        })
    }

    /// Read every audit record written so far.
    ///
    /// # Errors
    ///
    /// Returns a persistence error if the log exists but cannot be read or parsed.
    pub async fn audit_records(&self) -> Result<Vec<AlertRecord>> {
        let content = match tokio::fs::read_to_string(&self.audit_file).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                serde_json::from_str(line).map_err(|e| {
                    SafezoneError::PersistenceError(format!("Corrupt audit line: {e}"))
                })
            })
            .collect()
    }
}

#[async_trait]
impl SubjectDirectory for Storage {
    async fn subject_by_external_id(&self, external_id: &str) -> Result<Option<Subject>> {
        Ok(self
            .load()
            .await?
            .subjects
            .into_iter()
            .find(|record| record.subject.external_id == external_id)
            .map(|record| record.subject))
    }

    async fn zone_config(&self, subject_id: &SubjectId) -> Result<Option<ZoneConfig>> {
        Ok(self
            .load()
            .await?
            .subjects
            .into_iter()
            .find(|record| &record.subject.id == subject_id)
            .and_then(|record| record.zone))
    }
}

#[async_trait]
impl AlertAudit for Storage {
    async fn record(&self, record: AlertRecord) -> Result<()> {
        if let Some(parent) = self.audit_file.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut line = serde_json::to_string(&record).map_err(|e| {
            SafezoneError::PersistenceError(format!("Failed to serialize audit record: {e}"))
        })?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.audit_file)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl RequestFeed for Storage {
    async fn requests_after(&self, last_id: u64) -> Result<Vec<CareRequest>> {
        let mut requests: Vec<CareRequest> = self
            .load()
            .await?
            .requests
            .into_iter()
            .filter(|request| request.id > last_id)
            .collect();
        requests.sort_by_key(|request| request.id);
        Ok(requests)
    }
}

/// Get the default data directory.
///
/// On Linux servers: `/var/lib/safezone/`
/// For development: the platform data directory.
#[must_use]
pub fn default_data_dir() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        PathBuf::from("/var/lib/safezone")
    }
    #[cfg(not(target_os = "linux"))]
    {
        directories::ProjectDirs::from("", "", "safezone")
            .map_or_else(|| PathBuf::from("./data"), |dirs| dirs.data_dir().to_path_buf())
    }
}
