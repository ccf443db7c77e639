//! Monitoring transparency log.
//!
//! Counts what the monitor observed and forwarded so the user can see at a
//! glance how much activity left the device. Only counts are kept; no
//! message content is stored here.

use crate::core::router::{RecordKind, RouteOutcome, TextOrigin};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Counters for the current session.
#[derive(Debug)]
pub struct TransparencyLog {
    /// Notifications normalized and submitted
    notifications_forwarded: AtomicU64,
    /// Text changes stored in the tracker
    text_changes_tracked: AtomicU64,
    /// Clicks inspected by the send classifier
    clicks_seen: AtomicU64,
    /// Outgoing messages taken from tracked text
    outgoing_from_tracker: AtomicU64,
    /// Outgoing messages read from the screen
    outgoing_from_screen: AtomicU64,
    /// Records the sink refused (queue full or closed)
    records_dropped: AtomicU64,
    /// Records the collector accepted
    deliveries_succeeded: AtomicU64,
    /// Records that failed in transport or were rejected by the collector
    deliveries_failed: AtomicU64,
    /// Feed lines that could not be parsed
    malformed_events: AtomicU64,
    session_start: DateTime<Utc>,
    persist_path: Option<PathBuf>,
}

impl TransparencyLog {
    pub fn new() -> Self {
        Self {
            notifications_forwarded: AtomicU64::new(0),
            text_changes_tracked: AtomicU64::new(0),
            clicks_seen: AtomicU64::new(0),
            outgoing_from_tracker: AtomicU64::new(0),
            outgoing_from_screen: AtomicU64::new(0),
            records_dropped: AtomicU64::new(0),
            deliveries_succeeded: AtomicU64::new(0),
            deliveries_failed: AtomicU64::new(0),
            malformed_events: AtomicU64::new(0),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create a log that continues the totals stored at `path`.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut log = Self::new();
        log.persist_path = Some(path);

        if let Err(e) = log.load() {
            warn!("Could not load previous transparency stats: {e}");
        }

        log
    }

    /// Count the outcome of one routed event.
    pub fn record_outcome(&self, outcome: &RouteOutcome) {
        let counter = match outcome {
            RouteOutcome::NotificationForwarded => &self.notifications_forwarded,
            RouteOutcome::TextTracked => &self.text_changes_tracked,
            RouteOutcome::OutgoingDetected(TextOrigin::Tracked) => {
                self.clicks_seen.fetch_add(1, Ordering::Relaxed);
                &self.outgoing_from_tracker
            }
            RouteOutcome::OutgoingDetected(TextOrigin::Screen) => {
                self.clicks_seen.fetch_add(1, Ordering::Relaxed);
                &self.outgoing_from_screen
            }
            RouteOutcome::SendWithoutText | RouteOutcome::ClickIgnored => &self.clicks_seen,
            RouteOutcome::SinkRejected(kind, _) => {
                if matches!(kind, RecordKind::Outgoing(_)) {
                    self.clicks_seen.fetch_add(1, Ordering::Relaxed);
                }
                &self.records_dropped
            }
            RouteOutcome::TextIgnored | RouteOutcome::Unsupported => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delivery_success(&self) {
        self.deliveries_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delivery_failure(&self) {
        self.deliveries_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed_events(&self, count: u64) {
        self.malformed_events.fetch_add(count, Ordering::Relaxed);
    }

    /// Get the current statistics.
    pub fn stats(&self) -> TransparencyStats {
        TransparencyStats {
            notifications_forwarded: self.notifications_forwarded.load(Ordering::Relaxed),
            text_changes_tracked: self.text_changes_tracked.load(Ordering::Relaxed),
            clicks_seen: self.clicks_seen.load(Ordering::Relaxed),
            outgoing_from_tracker: self.outgoing_from_tracker.load(Ordering::Relaxed),
            outgoing_from_screen: self.outgoing_from_screen.load(Ordering::Relaxed),
            records_dropped: self.records_dropped.load(Ordering::Relaxed),
            deliveries_succeeded: self.deliveries_succeeded.load(Ordering::Relaxed),
            deliveries_failed: self.deliveries_failed.load(Ordering::Relaxed),
            malformed_events: self.malformed_events.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Session Statistics:\n\
             - Notifications forwarded: {}\n\
             - Text changes tracked: {}\n\
             - Clicks inspected: {}\n\
             - Outgoing messages detected: {} ({} from typed text, {} from screen)\n\
             - Records dropped: {}\n\
             - Deliveries succeeded: {}\n\
             - Deliveries failed: {}\n\
             - Malformed events: {}\n\
             - Session duration: {} seconds",
            stats.notifications_forwarded,
            stats.text_changes_tracked,
            stats.clicks_seen,
            stats.outgoing_total(),
            stats.outgoing_from_tracker,
            stats.outgoing_from_screen,
            stats.records_dropped,
            stats.deliveries_succeeded,
            stats.deliveries_failed,
            stats.malformed_events,
            stats.session_duration_secs
        )
    }

    /// Save stats to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.stats();
            let persisted = PersistedStats {
                notifications_forwarded: stats.notifications_forwarded,
                text_changes_tracked: stats.text_changes_tracked,
                clicks_seen: stats.clicks_seen,
                outgoing_from_tracker: stats.outgoing_from_tracker,
                outgoing_from_screen: stats.outgoing_from_screen,
                records_dropped: stats.records_dropped,
                deliveries_succeeded: stats.deliveries_succeeded,
                deliveries_failed: stats.deliveries_failed,
                malformed_events: stats.malformed_events,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;
            std::fs::write(path, json)?;
        }
        Ok(())
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedStats =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.notifications_forwarded
                    .store(persisted.notifications_forwarded, Ordering::Relaxed);
                self.text_changes_tracked
                    .store(persisted.text_changes_tracked, Ordering::Relaxed);
                self.clicks_seen
                    .store(persisted.clicks_seen, Ordering::Relaxed);
                self.outgoing_from_tracker
                    .store(persisted.outgoing_from_tracker, Ordering::Relaxed);
                self.outgoing_from_screen
                    .store(persisted.outgoing_from_screen, Ordering::Relaxed);
                self.records_dropped
                    .store(persisted.records_dropped, Ordering::Relaxed);
                self.deliveries_succeeded
                    .store(persisted.deliveries_succeeded, Ordering::Relaxed);
                self.deliveries_failed
                    .store(persisted.deliveries_failed, Ordering::Relaxed);
                self.malformed_events
                    .store(persisted.malformed_events, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    /// Reset all counters.
    pub fn reset(&self) {
        for counter in [
            &self.notifications_forwarded,
            &self.text_changes_tracked,
            &self.clicks_seen,
            &self.outgoing_from_tracker,
            &self.outgoing_from_screen,
            &self.records_dropped,
            &self.deliveries_succeeded,
            &self.deliveries_failed,
            &self.malformed_events,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl Default for TransparencyLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of transparency statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransparencyStats {
    pub notifications_forwarded: u64,
    pub text_changes_tracked: u64,
    pub clicks_seen: u64,
    pub outgoing_from_tracker: u64,
    pub outgoing_from_screen: u64,
    pub records_dropped: u64,
    pub deliveries_succeeded: u64,
    pub deliveries_failed: u64,
    pub malformed_events: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

impl TransparencyStats {
    pub fn outgoing_total(&self) -> u64 {
        self.outgoing_from_tracker + self.outgoing_from_screen
    }
}

/// Stats format for persistence.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedStats {
    notifications_forwarded: u64,
    text_changes_tracked: u64,
    clicks_seen: u64,
    outgoing_from_tracker: u64,
    outgoing_from_screen: u64,
    records_dropped: u64,
    deliveries_succeeded: u64,
    deliveries_failed: u64,
    malformed_events: u64,
    last_updated: DateTime<Utc>,
}

/// Thread-safe shared transparency log.
pub type SharedTransparencyLog = Arc<TransparencyLog>;

/// Create a new shared transparency log.
pub fn create_shared_log() -> SharedTransparencyLog {
    Arc::new(TransparencyLog::new())
}

/// Create a new shared transparency log with persistence.
pub fn create_shared_log_with_persistence(path: PathBuf) -> SharedTransparencyLog {
    Arc::new(TransparencyLog::with_persistence(path))
}
