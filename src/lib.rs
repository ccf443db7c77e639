//! Notify Monitor - relays device notifications and sent messages to a collector.
//!
//! This library turns two streams of on-device activity, posted notifications
//! and accessibility (text change / click) events, into normalized records and
//! forwards them to a remote collector over HTTP.
//!
//! # Outgoing message detection
//!
//! - **Typed text**: the last text typed into each app is remembered
//! - **Send clicks**: a click on a node that looks like a send button
//!   consumes that text exactly once
//! - **Screen fallback**: with nothing tracked, the focused edit field on
//!   screen supplies the text
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          Notify Monitor                          │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌────────────┐   ┌──────────────┐   ┌────────────┐              │
//! │  │ Event Feed │──▶│ Event Router │──▶│ Dispatcher │──▶ collector │
//! │  │  (jsonl)   │   │              │   │ (workers)  │   (HTTP)     │
//! │  └────────────┘   └──────────────┘   └────────────┘              │
//! │                     │    │    │                                  │
//! │          ┌──────────┘    │    └───────────┐                      │
//! │          ▼               ▼                ▼                      │
//! │   ┌────────────┐  ┌────────────┐  ┌──────────────┐               │
//! │   │ Normalizer │  │  Tracker   │  │ Classifier + │               │
//! │   │            │  │ (per app)  │  │   Locator    │               │
//! │   └────────────┘  └────────────┘  └──────────────┘               │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use notify_monitor::{
//!     ClickEvent, DeviceInfo, EventRouter, MemorySink, PayloadNormalizer, RawEvent,
//!     StaticAppDirectory, TextChangedEvent, TypedTextTracker, UiNode,
//! };
//! use std::sync::Arc;
//!
//! let sink = Arc::new(MemorySink::new());
//! let normalizer = PayloadNormalizer::new(
//!     DeviceInfo::new("device-1", "Pixel 8", "14"),
//!     Arc::new(StaticAppDirectory::default()),
//! );
//! let router = EventRouter::new(normalizer, Arc::new(TypedTextTracker::new()), sink.clone());
//!
//! router.handle(&RawEvent::TextChanged(TextChangedEvent::new("com.chat", "hi")));
//! router.handle(&RawEvent::ViewClicked(ClickEvent::new(
//!     "com.chat",
//!     UiNode::default().with_resource_id("send_btn"),
//! )));
//!
//! let records = sink.drain();
//! assert_eq!(records.len(), 1);
//! assert_eq!(records[0].message, "hi");
//! ```

pub mod collector;
pub mod config;
pub mod core;
pub mod device;
pub mod transparency;

#[cfg(feature = "gateway")]
pub mod gateway;

#[cfg(feature = "server")]
pub mod server;

// Re-export key types at crate root for convenience
pub use collector::{
    ClickEvent, EventFeed, FeedConfig, FeedError, NotificationEvent, RawEvent, TextChangedEvent,
    UiNode, UiWindow,
};
pub use config::{Config, ConfigError, RunOverrides, SourceConfig};
pub use core::{
    DisplayZone, EventRouter, KeywordClassifier, MemorySink, NormalizedRecord, PayloadNormalizer,
    RecordKind, RecordSink, RouteOutcome, SendClassifier, SinkError, StdoutSink, TextOrigin,
    TypedTextTracker,
};
pub use device::{AppDirectory, AppInfo, DeviceInfo, StaticAppDirectory};
pub use transparency::{SharedTransparencyLog, TransparencyLog, TransparencyStats};

// Gateway re-exports (when enabled)
#[cfg(feature = "gateway")]
pub use gateway::{DeliveryReceipt, Dispatcher, GatewayClient, GatewayConfig, GatewayError};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Instructions shown by the `grant` command.
pub const PERMISSION_NOTICE: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║              NOTIFY MONITOR - REQUIRED PERMISSIONS               ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  The monitor needs two system permissions on the device:         ║
║                                                                  ║
║  1. NOTIFICATION ACCESS                                          ║
║     Settings > Apps > Special app access > Notification access   ║
║     Enable the monitor's notification listener.                  ║
║                                                                  ║
║  2. ACCESSIBILITY                                                ║
║     Settings > Accessibility > Installed apps                    ║
║     Enable the monitor's accessibility service.                  ║
║                                                                  ║
║  ✓ WHAT IS FORWARDED:                                            ║
║    • Notification title, text and extras                         ║
║    • Messages you send, detected from send-button clicks         ║
║                                                                  ║
║  ✗ WHAT IS NOT KEPT:                                             ║
║    • No records are stored on the device after delivery          ║
║    • Failed deliveries are not retried                           ║
║                                                                  ║
║  View forwarding statistics anytime with:                        ║
║    notify-monitor status                                         ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;
