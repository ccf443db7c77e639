//! Core pipeline of the notification monitor.
//!
//! This module contains:
//! - Payload normalization of notifications and outgoing messages
//! - The typed-text tracker holding the last text per app
//! - Send-button classification and the on-screen text fallback
//! - The event router tying them together
//! - Record sinks

pub mod classifier;
pub mod locator;
pub mod normalizer;
pub mod record;
pub mod router;
pub mod sink;
pub mod tracker;

// Re-export commonly used types
pub use classifier::{KeywordClassifier, SendClassifier, SEND_KEYWORDS};
pub use locator::{find_focused_editable, locate_focused_text, EDIT_TEXT_CLASS};
pub use normalizer::{DisplayZone, PayloadNormalizer};
pub use record::{NormalizedRecord, RawPayload, DEFAULT_MESSAGE_TYPE};
pub use router::{EventRouter, RecordKind, RouteOutcome, TextOrigin};
pub use sink::{MemorySink, RecordSink, SinkError, StdoutSink};
pub use tracker::TypedTextTracker;
