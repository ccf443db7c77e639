//! Raw event types delivered by the on-device event source.
//!
//! Each line of the event feed deserializes into one [`RawEvent`]. The shapes
//! mirror what the notification listener and accessibility service hand us:
//! a notification with its extras bag, a text change, or a view click with a
//! snapshot of the clicked node and the visible windows.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Extras key holding the notification title.
pub const EXTRA_TITLE: &str = "android.title";
/// Extras key holding the primary notification text.
pub const EXTRA_TEXT: &str = "android.text";
/// Extras key holding the multi-line (inbox style) text array.
pub const EXTRA_TEXT_LINES: &str = "android.textLines";
/// Extras key holding the expanded (big text style) body.
pub const EXTRA_BIG_TEXT: &str = "android.bigText";

/// Ordered key/value bag attached to a notification.
pub type Extras = Map<String, Value>;

fn unknown_package() -> String {
    "unknown".to_string()
}

/// A missing or `null` package both read as "unknown".
fn package_or_unknown<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(unknown_package))
}

/// A notification posted by some app.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationEvent {
    /// Package that posted the notification
    #[serde(default = "unknown_package", deserialize_with = "package_or_unknown")]
    pub package: String,
    /// When the event was observed (epoch millis)
    #[serde(default)]
    pub timestamp: i64,
    /// When the notification was posted (epoch millis)
    #[serde(default)]
    pub post_time: i64,
    /// Platform category (e.g. "msg", "email")
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub extras: Extras,
}

impl NotificationEvent {
    /// Create a notification event with an empty extras bag.
    pub fn new(package: impl Into<String>, post_time: i64) -> Self {
        Self {
            package: package.into(),
            timestamp: post_time,
            post_time,
            category: None,
            extras: Extras::new(),
        }
    }

    /// Builder-style helper to add one extra.
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extras.insert(key.into(), value.into());
        self
    }

    /// Builder-style helper to set the category.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Get a string extra, or `None` if it is missing or not a string.
    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.extras.get(key).and_then(Value::as_str)
    }
}

/// Text typed into an editable field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextChangedEvent {
    #[serde(default = "unknown_package", deserialize_with = "package_or_unknown")]
    pub package: String,
    #[serde(default)]
    pub timestamp: i64,
    /// The new text content, if the platform reported any
    #[serde(default)]
    pub text: Option<String>,
}

impl TextChangedEvent {
    pub fn new(package: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            timestamp: 0,
            text: Some(text.into()),
        }
    }
}

/// A view was clicked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClickEvent {
    #[serde(default = "unknown_package", deserialize_with = "package_or_unknown")]
    pub package: String,
    #[serde(default)]
    pub timestamp: i64,
    /// The clicked node, if the platform could resolve it
    #[serde(default)]
    pub node: Option<UiNode>,
    /// Visible windows at click time, in the order the platform lists them
    #[serde(default)]
    pub windows: Vec<UiWindow>,
}

impl ClickEvent {
    pub fn new(package: impl Into<String>, node: UiNode) -> Self {
        Self {
            package: package.into(),
            timestamp: 0,
            node: Some(node),
            windows: Vec::new(),
        }
    }

    pub fn with_windows(mut self, windows: Vec<UiWindow>) -> Self {
        self.windows = windows;
        self
    }

    pub fn at(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Read-only snapshot of an accessibility node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UiNode {
    /// View resource name, e.g. "com.chat:id/send_btn"
    #[serde(default)]
    pub resource_id: Option<String>,
    /// Content description
    #[serde(default)]
    pub description: Option<String>,
    /// Visible text
    #[serde(default)]
    pub text: Option<String>,
    /// Widget class name, e.g. "android.widget.ImageButton"
    #[serde(default)]
    pub class_name: Option<String>,
    #[serde(default)]
    pub focused: bool,
    #[serde(default)]
    pub children: Vec<UiNode>,
}

impl UiNode {
    pub fn with_resource_id(mut self, id: impl Into<String>) -> Self {
        self.resource_id = Some(id.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_class(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = Some(class_name.into());
        self
    }

    pub fn focused(mut self) -> Self {
        self.focused = true;
        self
    }

    pub fn with_child(mut self, child: UiNode) -> Self {
        self.children.push(child);
        self
    }
}

/// One visible window. The root may be unavailable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UiWindow {
    #[serde(default)]
    pub root: Option<UiNode>,
}

impl UiWindow {
    pub fn new(root: UiNode) -> Self {
        Self { root: Some(root) }
    }
}

/// Unified event type for the feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RawEvent {
    Notification(NotificationEvent),
    TextChanged(TextChangedEvent),
    ViewClicked(ClickEvent),
    /// Any event type we subscribe to but do not act on
    #[serde(other)]
    Unsupported,
}

impl RawEvent {
    /// Package that produced the event, if known.
    pub fn package(&self) -> Option<&str> {
        match self {
            RawEvent::Notification(e) => Some(&e.package),
            RawEvent::TextChanged(e) => Some(&e.package),
            RawEvent::ViewClicked(e) => Some(&e.package),
            RawEvent::Unsupported => None,
        }
    }

    /// Whether the event came from the notification stream.
    pub fn is_notification(&self) -> bool {
        matches!(self, RawEvent::Notification(_))
    }
}
