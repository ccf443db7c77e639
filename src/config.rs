//! Configuration for the notification monitor.

use crate::collector::types::RawEvent;
use crate::core::classifier::SEND_KEYWORDS;
use crate::core::normalizer::DisplayZone;
use crate::device::{AppInfo, DeviceOverrides};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Collector endpoint used when none is configured.
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8000/api/notifications";

/// Main configuration for the monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Collector endpoint receiving one POST per record
    pub endpoint: String,

    /// Optional bearer token sent with every delivery
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// HTTP request timeout
    #[serde(with = "duration_serde")]
    pub request_timeout: Duration,

    /// Number of concurrent delivery workers
    pub delivery_workers: usize,

    /// Records that may wait for a worker before new ones are dropped
    pub delivery_queue_capacity: usize,

    /// Which event streams to process
    pub sources: SourceConfig,

    /// IANA zone for `delivered_at`; local time when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,

    /// Forget typed text not sent within this many seconds; never when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub typed_text_ttl_secs: Option<u64>,

    /// Keywords marking a clicked node as a send button
    pub send_keywords: Vec<String>,

    /// Device identity overrides
    pub device: DeviceOverrides,

    /// Known apps by package id
    pub apps: BTreeMap<String, AppInfo>,

    /// Default log filter when RUST_LOG is not set
    pub log_level: String,

    /// Path for storing the transparency log
    pub data_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("notify-monitor");

        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            token: None,
            request_timeout: Duration::from_secs(10),
            delivery_workers: 4,
            delivery_queue_capacity: 256,
            sources: SourceConfig::default(),
            timezone: None,
            typed_text_ttl_secs: None,
            send_keywords: SEND_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            device: DeviceOverrides::default(),
            apps: BTreeMap::new(),
            log_level: "info".to_string(),
            data_path: data_dir,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, or defaults if it does not exist.
    pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        let config: Config =
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    /// Save configuration to `path`, creating parent directories.
    pub fn save_to(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::Io(e.to_string()))?;

        Ok(())
    }

    /// Copy of this configuration with per-run overrides applied.
    ///
    /// The stored configuration is left untouched so overrides never reach disk.
    pub fn with_overrides(&self, overrides: &RunOverrides) -> Self {
        let mut config = self.clone();
        if let Some(ref sources) = overrides.sources {
            config.sources = sources.clone();
        }
        if let Some(ref endpoint) = overrides.endpoint {
            config.endpoint = endpoint.clone();
        }
        if let Some(workers) = overrides.workers {
            config.delivery_workers = workers;
        }
        config
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("notify-monitor")
            .join("config.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.data_path).map_err(|e| ConfigError::Io(e.to_string()))
    }

    /// Check values that serde alone cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "endpoint must be an http(s) URL, got '{}'",
                self.endpoint
            )));
        }
        if self.delivery_workers == 0 {
            return Err(ConfigError::Invalid(
                "delivery_workers must be at least 1".to_string(),
            ));
        }
        if self.delivery_queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "delivery_queue_capacity must be at least 1".to_string(),
            ));
        }
        self.display_zone()?;
        Ok(())
    }

    /// Resolve the configured time zone.
    pub fn display_zone(&self) -> Result<DisplayZone, ConfigError> {
        DisplayZone::from_name(self.timezone.as_deref()).map_err(ConfigError::Timezone)
    }

    /// Typed-text TTL, if any.
    pub fn typed_text_ttl(&self) -> Option<Duration> {
        self.typed_text_ttl_secs.map(Duration::from_secs)
    }

    /// Assign a persistent device id on first run. Returns whether one was generated.
    pub fn ensure_device_id(&mut self) -> bool {
        if self.device.device_id.is_some() {
            return false;
        }
        let hostname = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        self.device.device_id = Some(format!(
            "{}-{}",
            hostname,
            &uuid::Uuid::new_v4().simple().to_string()[..8]
        ));
        true
    }
}

/// Command-line values that apply to a single run.
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    pub sources: Option<SourceConfig>,
    pub endpoint: Option<String>,
    pub workers: Option<usize>,
}

/// Which event streams to process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub notifications: bool,
    pub accessibility: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            notifications: true,
            accessibility: true,
        }
    }
}

impl SourceConfig {
    /// Parse source configuration from a comma-separated string.
    pub fn from_csv(s: &str) -> Self {
        let sources: Vec<String> = s.split(',').map(|s| s.trim().to_lowercase()).collect();

        Self {
            notifications: sources.iter().any(|s| s == "notifications" || s == "all"),
            accessibility: sources.iter().any(|s| s == "accessibility" || s == "all"),
        }
    }

    /// Check if at least one source is enabled.
    pub fn any_enabled(&self) -> bool {
        self.notifications || self.accessibility
    }

    /// Whether an event belongs to an enabled stream.
    pub fn accepts(&self, event: &RawEvent) -> bool {
        match event {
            RawEvent::Notification(_) => self.notifications,
            RawEvent::TextChanged(_) | RawEvent::ViewClicked(_) => self.accessibility,
            RawEvent::Unsupported => self.accessibility,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Serialize error: {0}")]
    Serialize(String),
    #[error("Invalid timezone: {0}")]
    Timezone(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Serde support for Duration.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
