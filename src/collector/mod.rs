//! Event collection module for the notification monitor.
//!
//! The platform listener services (notification listener, accessibility
//! service) serialize what they observe as JSON lines; this module defines
//! those raw event shapes and the feed that reads them.

pub mod feed;
pub mod types;

// Re-export commonly used types
pub use feed::{parse_line, EventFeed, FeedConfig, FeedError};
pub use types::{
    ClickEvent, Extras, NotificationEvent, RawEvent, TextChangedEvent, UiNode, UiWindow,
    EXTRA_BIG_TEXT, EXTRA_TEXT, EXTRA_TEXT_LINES, EXTRA_TITLE,
};
