//! Event routing.
//!
//! The router is the single entry point for raw events. Notifications are
//! normalized and forwarded; text changes update the tracker; clicks that
//! look like a send action turn the tracked (or on-screen) text into an
//! outgoing record. Each event produces at most one record.

use crate::collector::types::{ClickEvent, NotificationEvent, RawEvent, TextChangedEvent};
use crate::core::classifier::{KeywordClassifier, SendClassifier};
use crate::core::locator::locate_focused_text;
use crate::core::normalizer::PayloadNormalizer;
use crate::core::record::NormalizedRecord;
use crate::core::sink::{RecordSink, SinkError};
use crate::core::tracker::TypedTextTracker;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Where the text of an outgoing message came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextOrigin {
    /// Consumed from the typed-text tracker
    Tracked,
    /// Read from the focused edit field on screen
    Screen,
}

/// Which kind of record the router built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Notification,
    Outgoing(TextOrigin),
}

/// What the router did with one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// A notification record was submitted
    NotificationForwarded,
    /// Typed text was stored for later
    TextTracked,
    /// A text change carried no usable text
    TextIgnored,
    /// An outgoing message record was submitted
    OutgoingDetected(TextOrigin),
    /// A send click with no text to report
    SendWithoutText,
    /// A click that is not a send action, or had no node
    ClickIgnored,
    /// An event type the router does not act on
    Unsupported,
    /// The record was built but the sink refused it
    SinkRejected(RecordKind, SinkError),
}

impl RouteOutcome {
    /// Whether a record left the router.
    pub fn emitted_record(&self) -> bool {
        matches!(
            self,
            RouteOutcome::NotificationForwarded | RouteOutcome::OutgoingDetected(_)
        )
    }
}

/// Routes raw events through normalization, tracking and send detection.
pub struct EventRouter {
    normalizer: PayloadNormalizer,
    tracker: Arc<TypedTextTracker>,
    classifier: Box<dyn SendClassifier>,
    sink: Arc<dyn RecordSink>,
}

impl EventRouter {
    /// Create a router with the default keyword classifier.
    pub fn new(
        normalizer: PayloadNormalizer,
        tracker: Arc<TypedTextTracker>,
        sink: Arc<dyn RecordSink>,
    ) -> Self {
        Self {
            normalizer,
            tracker,
            classifier: Box::new(KeywordClassifier::default()),
            sink,
        }
    }

    /// Replace the send classifier.
    pub fn with_classifier(mut self, classifier: Box<dyn SendClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn tracker(&self) -> &Arc<TypedTextTracker> {
        &self.tracker
    }

    /// Handle one raw event.
    ///
    /// Never fails: anything that goes wrong is logged and reported in the
    /// returned outcome, so the next event is processed normally.
    pub fn handle(&self, event: &RawEvent) -> RouteOutcome {
        match event {
            RawEvent::Notification(notification) => self.on_notification(notification),
            RawEvent::TextChanged(change) => self.on_text_changed(change),
            RawEvent::ViewClicked(click) => self.on_click(click),
            RawEvent::Unsupported => RouteOutcome::Unsupported,
        }
    }

    fn on_notification(&self, event: &NotificationEvent) -> RouteOutcome {
        let record = self.normalizer.normalize(event);
        self.emit(record, RecordKind::Notification)
    }

    fn on_text_changed(&self, event: &TextChangedEvent) -> RouteOutcome {
        let tracked = event
            .text
            .as_deref()
            .map(|text| self.tracker.record(&event.package, text))
            .unwrap_or(false);

        if tracked {
            RouteOutcome::TextTracked
        } else {
            RouteOutcome::TextIgnored
        }
    }

    fn on_click(&self, event: &ClickEvent) -> RouteOutcome {
        let Some(node) = event.node.as_ref() else {
            return RouteOutcome::ClickIgnored;
        };

        if !self.classifier.is_send_action(Some(node)) {
            return RouteOutcome::ClickIgnored;
        }

        let (message, origin) = match self.tracker.take(&event.package) {
            Some(text) => (text, TextOrigin::Tracked),
            None => {
                debug!(package = %event.package, "Send clicked without tracked text");
                match locate_focused_text(&event.windows) {
                    Some(text) => (text, TextOrigin::Screen),
                    None => return RouteOutcome::SendWithoutText,
                }
            }
        };

        info!(package = %event.package, ?origin, "Detected outgoing message");
        let record = self
            .normalizer
            .outgoing(&event.package, &message, event.timestamp);
        self.emit(record, RecordKind::Outgoing(origin))
    }

    fn emit(&self, record: NormalizedRecord, kind: RecordKind) -> RouteOutcome {
        match self.sink.submit(record) {
            Ok(()) => match kind {
                RecordKind::Notification => RouteOutcome::NotificationForwarded,
                RecordKind::Outgoing(origin) => RouteOutcome::OutgoingDetected(origin),
            },
            Err(e) => {
                error!(?kind, "Record not submitted: {e}");
                RouteOutcome::SinkRejected(kind, e)
            }
        }
    }
}
