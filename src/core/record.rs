//! The canonical record forwarded to the collector.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Default message type when the platform reports no category.
pub const DEFAULT_MESSAGE_TYPE: &str = "text";

/// Detection method recorded on outgoing messages.
pub const DETECTED_BY_ACCESSIBILITY: &str = "accessibility";

/// Format used for `delivered_at`.
pub const DELIVERED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Flat key -> stringified value mapping.
///
/// Every value is a JSON string; the map type keeps source insertion order.
pub type RawPayload = Map<String, Value>;

/// A normalized notification or outgoing message.
///
/// Built once per qualifying event and then moved into the record sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    // App info
    pub app_name: String,
    pub app_identifier: String,
    pub app_version: String,

    // Content
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub message: String,
    pub message_type: String,

    // Status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivered_at: Option<String>,
    pub is_outgoing: bool,
    pub is_read: bool,
    pub is_deleted: bool,

    // Device info
    pub device_id: String,
    pub device_name: String,
    pub os_version: String,

    pub raw_payload: RawPayload,
}

impl NormalizedRecord {
    /// Look up a raw payload entry as a string.
    pub fn raw(&self, key: &str) -> Option<&str> {
        self.raw_payload.get(key).and_then(Value::as_str)
    }
}

/// Stringify an extras value the way the platform's default textual
/// conversion would: strings verbatim, `null` as `"null"`, anything else as
/// its JSON text.
pub fn stringify_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stringify_value() {
        assert_eq!(stringify_value(&json!("plain")), "plain");
        assert_eq!(stringify_value(&Value::Null), "null");
        assert_eq!(stringify_value(&json!(42)), "42");
        assert_eq!(stringify_value(&json!(true)), "true");
        assert_eq!(stringify_value(&json!(["a", "b"])), r#"["a","b"]"#);
    }

    #[test]
    fn test_optional_fields_skipped() {
        let record = NormalizedRecord {
            app_name: "Chat".to_string(),
            app_identifier: "com.chat".to_string(),
            app_version: "1.0".to_string(),
            title: None,
            message: "hi".to_string(),
            message_type: DEFAULT_MESSAGE_TYPE.to_string(),
            delivered_at: None,
            is_outgoing: true,
            is_read: false,
            is_deleted: false,
            device_id: "d".to_string(),
            device_name: "n".to_string(),
            os_version: "14".to_string(),
            raw_payload: RawPayload::new(),
        };

        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("title").is_none());
        assert!(json.get("delivered_at").is_none());
        assert_eq!(json["is_outgoing"], true);
        assert_eq!(json["message_type"], "text");
    }
}
