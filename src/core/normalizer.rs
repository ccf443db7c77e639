//! Payload normalization.
//!
//! Turns a raw notification, or a detected send action, into a
//! [`NormalizedRecord`]. The normalizer holds only read-only collaborators
//! (device identity, app directory, display zone), so normalizing the same
//! event twice yields identical records.

use crate::collector::types::{
    NotificationEvent, EXTRA_BIG_TEXT, EXTRA_TEXT, EXTRA_TEXT_LINES, EXTRA_TITLE,
};
use crate::core::record::{
    stringify_value, NormalizedRecord, RawPayload, DEFAULT_MESSAGE_TYPE, DELIVERED_AT_FORMAT,
    DETECTED_BY_ACCESSIBILITY,
};
use crate::device::{AppDirectory, AppIdentity, DeviceInfo};
use chrono::{Local, TimeZone};
use chrono_tz::Tz;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Time zone used to format `delivered_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayZone {
    /// The host's local time zone
    #[default]
    Local,
    Named(Tz),
}

impl DisplayZone {
    /// Parse an IANA zone name. `None` or `"local"` selects local time.
    pub fn from_name(name: Option<&str>) -> Result<Self, String> {
        match name {
            None => Ok(Self::Local),
            Some(n) if n.eq_ignore_ascii_case("local") => Ok(Self::Local),
            Some(n) => n.parse::<Tz>().map(Self::Named).map_err(|e| e.to_string()),
        }
    }

    /// Format epoch millis as `yyyy-MM-dd HH:mm:ss`. Out-of-range input yields `None`.
    pub fn format_millis(&self, millis: i64) -> Option<String> {
        match self {
            DisplayZone::Local => Local
                .timestamp_millis_opt(millis)
                .single()
                .map(|t| t.format(DELIVERED_AT_FORMAT).to_string()),
            DisplayZone::Named(tz) => tz
                .timestamp_millis_opt(millis)
                .single()
                .map(|t| t.format(DELIVERED_AT_FORMAT).to_string()),
        }
    }
}

/// Builds normalized records.
#[derive(Clone)]
pub struct PayloadNormalizer {
    device: DeviceInfo,
    apps: Arc<dyn AppDirectory>,
    zone: DisplayZone,
}

impl PayloadNormalizer {
    pub fn new(device: DeviceInfo, apps: Arc<dyn AppDirectory>) -> Self {
        Self {
            device,
            apps,
            zone: DisplayZone::Local,
        }
    }

    pub fn with_zone(mut self, zone: DisplayZone) -> Self {
        self.zone = zone;
        self
    }

    pub fn device(&self) -> &DeviceInfo {
        &self.device
    }

    /// Normalize a posted notification.
    pub fn normalize(&self, event: &NotificationEvent) -> NormalizedRecord {
        let app = AppIdentity::resolve(self.apps.as_ref(), &event.package);

        let title = event.extra_str(EXTRA_TITLE).unwrap_or_default().to_string();
        let message = extract_message(event);
        let message_type = event
            .category
            .clone()
            .unwrap_or_else(|| DEFAULT_MESSAGE_TYPE.to_string());

        let raw_payload: RawPayload = event
            .extras
            .iter()
            .map(|(key, value)| (key.clone(), Value::String(stringify_value(value))))
            .collect();

        let record = NormalizedRecord {
            app_name: app.label,
            app_identifier: event.package.clone(),
            app_version: app.version,
            title: Some(title),
            message,
            message_type,
            delivered_at: self.zone.format_millis(event.post_time),
            is_outgoing: false,
            is_read: false,
            is_deleted: false,
            device_id: self.device.device_id.clone(),
            device_name: self.device.device_name.clone(),
            os_version: self.device.os_version.clone(),
            raw_payload,
        };

        debug!(record = ?record, "Normalized notification");
        record
    }

    /// Build the record for a message the user sent from `package`.
    pub fn outgoing(&self, package: &str, message: &str, timestamp: i64) -> NormalizedRecord {
        let app = AppIdentity::resolve(self.apps.as_ref(), package);

        let mut raw_payload = RawPayload::new();
        raw_payload.insert(
            "detected_by".to_string(),
            Value::String(DETECTED_BY_ACCESSIBILITY.to_string()),
        );
        raw_payload.insert("timestamp".to_string(), Value::String(timestamp.to_string()));

        let record = NormalizedRecord {
            app_name: app.label,
            app_identifier: package.to_string(),
            app_version: app.version,
            title: None,
            message: message.to_string(),
            message_type: DEFAULT_MESSAGE_TYPE.to_string(),
            delivered_at: self.zone.format_millis(timestamp),
            is_outgoing: true,
            is_read: false,
            is_deleted: false,
            device_id: self.device.device_id.clone(),
            device_name: self.device.device_name.clone(),
            os_version: self.device.os_version.clone(),
            raw_payload,
        };

        debug!(record = ?record, "Normalized outgoing message");
        record
    }
}

/// Primary text, then the joined text lines, then the big text.
fn extract_message(event: &NotificationEvent) -> String {
    let text = event.extra_str(EXTRA_TEXT).unwrap_or_default();
    if !text.is_empty() {
        return text.to_string();
    }

    if let Some(Value::Array(lines)) = event.extras.get(EXTRA_TEXT_LINES) {
        let joined = lines
            .iter()
            .map(stringify_value)
            .collect::<Vec<_>>()
            .join("\n");
        if !joined.is_empty() {
            return joined;
        }
    }

    event
        .extra_str(EXTRA_BIG_TEXT)
        .unwrap_or_default()
        .to_string()
}
