//! Device and app metadata lookups.
//!
//! Both are simple read-only key/value queries. App lookups may fail (the
//! app was uninstalled while its notification was in flight); callers fall
//! back to the raw package id rather than dropping the event.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Version reported when an app's version cannot be resolved.
pub const UNKNOWN_VERSION: &str = "unknown";

/// Identity of the device the monitor runs on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub device_id: String,
    pub device_name: String,
    pub os_version: String,
}

impl DeviceInfo {
    pub fn new(
        device_id: impl Into<String>,
        device_name: impl Into<String>,
        os_version: impl Into<String>,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            device_name: device_name.into(),
            os_version: os_version.into(),
        }
    }

    /// Resolve device info, preferring explicit overrides.
    ///
    /// Without an override the name comes from the hostname and the id is
    /// derived from it, so the same host reports the same id across runs.
    pub fn detect(overrides: &DeviceOverrides) -> Self {
        let hostname = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        let device_name = overrides
            .device_name
            .clone()
            .unwrap_or_else(|| hostname.clone());
        let device_id = overrides
            .device_id
            .clone()
            .unwrap_or_else(|| format!("device-{hostname}"));
        let os_version = overrides
            .os_version
            .clone()
            .unwrap_or_else(|| std::env::consts::OS.to_string());

        Self {
            device_id,
            device_name,
            os_version,
        }
    }
}

/// Optional per-field overrides for [`DeviceInfo::detect`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_version: Option<String>,
}

/// App metadata lookup failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("App not found: {0}")]
    NotFound(String),
    #[error("App {package} has no {field}")]
    MissingField {
        package: String,
        field: &'static str,
    },
}

/// Human-readable label and version of an installed app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppInfo {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Lookup of installed app metadata by package id.
pub trait AppDirectory: Send + Sync {
    fn label(&self, package: &str) -> Result<String, LookupError>;
    fn version(&self, package: &str) -> Result<String, LookupError>;
}

/// App directory backed by a fixed table, typically loaded from config.
#[derive(Debug, Clone, Default)]
pub struct StaticAppDirectory {
    apps: BTreeMap<String, AppInfo>,
}

impl StaticAppDirectory {
    pub fn new(apps: BTreeMap<String, AppInfo>) -> Self {
        Self { apps }
    }

    pub fn insert(&mut self, package: impl Into<String>, info: AppInfo) {
        self.apps.insert(package.into(), info);
    }
}

impl AppDirectory for StaticAppDirectory {
    fn label(&self, package: &str) -> Result<String, LookupError> {
        self.apps
            .get(package)
            .map(|app| app.label.clone())
            .ok_or_else(|| LookupError::NotFound(package.to_string()))
    }

    fn version(&self, package: &str) -> Result<String, LookupError> {
        let app = self
            .apps
            .get(package)
            .ok_or_else(|| LookupError::NotFound(package.to_string()))?;
        app.version.clone().ok_or(LookupError::MissingField {
            package: package.to_string(),
            field: "version",
        })
    }
}

/// Resolved label and version for a package, with fallbacks applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppIdentity {
    pub label: String,
    pub version: String,
}

impl AppIdentity {
    /// Look up a package, falling back to the package id as label and
    /// [`UNKNOWN_VERSION`] as version.
    pub fn resolve(directory: &dyn AppDirectory, package: &str) -> Self {
        let label = directory.label(package).unwrap_or_else(|e| {
            tracing::debug!("App label lookup failed: {e}");
            package.to_string()
        });
        let version = directory
            .version(package)
            .unwrap_or_else(|_| UNKNOWN_VERSION.to_string());
        Self { label, version }
    }
}
