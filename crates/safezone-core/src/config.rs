//! Application configuration management.
//!
//! Handles loading, saving, and validating safezone configuration including:
//! - Server bind address and logging mode
//! - Engine policy for disabled zones
//! - Location of the subject directory file
//! - Outbound messaging (webhook or log-only)
//! - Care-request relay polling
//!
//! Configuration is read from a TOML file and then overridden by environment
//! variables prefixed with `SAFEZONE_`, using `__` as the section separator
//! (for example `SAFEZONE_SERVER__BIND_ADDRESS=127.0.0.1:4000`).

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Prefix of environment variable overrides.
pub const ENV_PREFIX: &str = "SAFEZONE";

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file does not exist.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The configuration file could not be read.
    #[error("Failed to read {}: {source}", path.display())]
    ReadError {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file could not be written.
    #[error("Failed to write {}: {source}", path.display())]
    WriteError {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration sources could not be merged or deserialized.
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] config::ConfigError),

    /// The configuration could not be serialized to TOML.
    #[error("Failed to serialize configuration: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// A single field holds an invalid value.
    #[error("Invalid value for {field}: {message}")]
    ValidationError {
        /// Dotted path of the field.
        field: String,
        /// What is wrong with it.
        message: String,
    },

    /// Several fields hold invalid values.
    #[error("{} configuration errors", .0.len())]
    MultipleValidationErrors(Vec<ConfigError>),
}

/// Result alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Main application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP/WebSocket server settings.
    pub server: ServerConfig,

    /// Alerting policy of the engine.
    pub engine: EngineSettings,

    /// Subject directory and audit log location.
    pub storage: StorageConfig,

    /// Outbound alert delivery.
    pub messaging: MessagingConfig,

    /// Care-request relay.
    pub requests: RequestsConfig,
}

/// Server settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the server listens on.
    pub bind_address: String,

    /// Production logging (JSON files + compact stdout) instead of pretty stdout.
    pub production: bool,

    /// Buffered status updates per observer before a slow one starts lagging.
    pub broadcast_capacity: usize,

    /// Directory of rolling log files in production. Platform default when unset.
    pub log_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            production: false,
            broadcast_capacity: 256,
            log_dir: None,
        }
    }
}

/// Policy knobs of the notification scheduler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Send a "zone disabled" notice on the first report of a disabled zone,
    /// before the first reminder interval elapses. Off by default: the first
    /// notice arrives after one notification interval.
    pub notify_disabled_immediately: bool,
}

/// Storage settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory JSON file. Defaults to the platform data directory.
    pub data_file: Option<PathBuf>,

    /// Alert audit log (JSON lines). Defaults to `alerts.jsonl` next to the data file.
    pub audit_file: Option<PathBuf>,
}

impl StorageConfig {
    /// Resolved path of the directory file.
    #[must_use]
    pub fn data_file(&self) -> PathBuf {
        self.data_file
            .clone()
            .unwrap_or_else(|| crate::storage::default_data_dir().join("directory.json"))
    }

    /// Resolved path of the audit log.
    #[must_use]
    pub fn audit_file(&self) -> PathBuf {
        self.audit_file.clone().unwrap_or_else(|| {
            self.data_file()
                .parent()
                .map_or_else(|| PathBuf::from("alerts.jsonl"), |dir| dir.join("alerts.jsonl"))
        })
    }
}

/// Outbound messaging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagingConfig {
    /// Webhook that receives `{destination, message}` posts. Log-only when unset.
    pub webhook_url: Option<String>,

    /// Request timeout for the webhook.
    pub timeout_secs: u64,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout_secs: 10,
        }
    }
}

/// Care-request relay settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestsConfig {
    /// Whether the relay runs at all.
    pub enabled: bool,

    /// How often new requests are polled.
    pub poll_interval_ms: u64,
}

impl Default for RequestsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_ms: 3000,
        }
    }
}

impl Config {
    /// Load configuration from `path`, then apply environment overrides.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotFound` if the file does not exist, or a parse
    /// error if the merged sources do not deserialize.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        Self::build(Some(path))
    }

    /// Load configuration from `path` if it exists, otherwise defaults.
    /// Environment overrides apply in both cases.
    ///
    /// # Errors
    ///
    /// Returns an error if a present file or the environment cannot be parsed.
    pub fn load_or_default(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::build(Some(path))
        } else {
            Self::build(None)
        }
    }

    fn build(path: Option<&Path>) -> ConfigResult<Self> {
        Self::build_with(path, Self::env_source())
    }

    fn build_with(path: Option<&Path>, env: config::Environment) -> ConfigResult<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path.to_path_buf()).format(config::FileFormat::Toml),
            );
        }
        let merged = builder.add_source(env).build()?;
        Ok(merged.try_deserialize()?)
    }

    /// `SAFEZONE_` then the section, `__`, and the key.
    fn env_source() -> config::Environment {
        config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
    }

    /// Save configuration as TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::WriteError {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::WriteError {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Default configuration file location.
    ///
    /// On Linux servers: `/etc/safezone/config.toml`
    /// Elsewhere: the platform config directory.
    #[must_use]
    pub fn default_path() -> PathBuf {
        #[cfg(target_os = "linux")]
        {
            PathBuf::from("/etc/safezone/config.toml")
        }
        #[cfg(not(target_os = "linux"))]
        {
            directories::ProjectDirs::from("", "", "safezone").map_or_else(
                || PathBuf::from("config.toml"),
                |dirs| dirs.config_dir().join("config.toml"),
            )
        }
    }

    /// Check every field, collecting all problems.
    ///
    /// # Errors
    ///
    /// Returns a single `ValidationError` or `MultipleValidationErrors`.
    pub fn validate(&self) -> ConfigResult<()> {
        let mut errors = Vec::new();

        if self.server.bind_address.parse::<SocketAddr>().is_err() {
            errors.push(ConfigError::ValidationError {
                field: "server.bind_address".into(),
                message: format!("'{}' is not a socket address", self.server.bind_address),
            });
        }
        if self.server.broadcast_capacity == 0 {
            errors.push(ConfigError::ValidationError {
                field: "server.broadcast_capacity".into(),
                message: "must be greater than zero".into(),
            });
        }
        if let Some(url) = &self.messaging.webhook_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                errors.push(ConfigError::ValidationError {
                    field: "messaging.webhook_url".into(),
                    message: format!("'{url}' must be an http(s) URL"),
                });
            }
        }
        if self.messaging.timeout_secs == 0 {
            errors.push(ConfigError::ValidationError {
                field: "messaging.timeout_secs".into(),
                message: "must be greater than zero".into(),
            });
        }
        if self.requests.enabled && self.requests.poll_interval_ms == 0 {
            errors.push(ConfigError::ValidationError {
                field: "requests.poll_interval_ms".into(),
                message: "must be greater than zero".into(),
            });
        }

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ConfigError::MultipleValidationErrors(errors)),
        }
    }
}
