//! Last-typed text per source app.
//!
//! Text-change events overwrite the entry for their app; a detected send
//! action takes it. `take` is atomic so one typed message is reported at most
//! once even if two send clicks race.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone)]
struct TypedEntry {
    text: String,
    updated_at: Instant,
}

/// Thread-safe map from source app id to the last text typed in it.
#[derive(Debug, Default)]
pub struct TypedTextTracker {
    entries: Mutex<HashMap<String, TypedEntry>>,
    /// Entries older than this are treated as absent. `None` keeps them forever.
    ttl: Option<Duration>,
}

impl TypedTextTracker {
    /// Create a tracker whose entries never expire.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a tracker that forgets text not sent within `ttl`.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl: Some(ttl),
        }
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, TypedEntry>> {
        // A panic elsewhere must not take send detection down with it.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn is_expired(&self, entry: &TypedEntry) -> bool {
        self.ttl
            .map(|ttl| entry.updated_at.elapsed() > ttl)
            .unwrap_or(false)
    }

    /// Record the latest text for `source`.
    ///
    /// Text is trimmed; whitespace-only text is ignored so a field clearing on
    /// focus loss does not wipe what the user typed. Returns whether the
    /// entry was written.
    pub fn record(&self, source: &str, text: &str) -> bool {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return false;
        }

        self.lock().insert(
            source.to_string(),
            TypedEntry {
                text: trimmed.to_string(),
                updated_at: Instant::now(),
            },
        );
        debug!(source, "Tracked typed text");
        true
    }

    /// Remove and return the text for `source`.
    pub fn take(&self, source: &str) -> Option<String> {
        let entry = self.lock().remove(source)?;
        if self.is_expired(&entry) {
            debug!(source, "Dropped expired typed text");
            return None;
        }
        Some(entry.text)
    }

    /// Return the text for `source` without consuming it.
    pub fn peek(&self, source: &str) -> Option<String> {
        let mut entries = self.lock();
        let expired = self.is_expired(entries.get(source)?);
        if expired {
            entries.remove(source);
            return None;
        }
        entries.get(source).map(|e| e.text.clone())
    }

    /// Forget the text for `source`. Returns whether an entry existed.
    pub fn clear(&self, source: &str) -> bool {
        self.lock().remove(source).is_some()
    }

    /// Remove every expired entry. Returns how many were removed.
    pub fn prune(&self) -> usize {
        if self.ttl.is_none() {
            return 0;
        }
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| !self.is_expired(entry));
        before - entries.len()
    }

    /// Number of sources with tracked text (expired entries included until pruned).
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_take_trims_and_consumes() {
        let tracker = TypedTextTracker::new();
        assert!(tracker.record("com.chat", "hello "));
        assert_eq!(tracker.take("com.chat").as_deref(), Some("hello"));
        assert_eq!(tracker.take("com.chat"), None);
    }

    #[test]
    fn test_whitespace_does_not_overwrite() {
        let tracker = TypedTextTracker::new();
        assert!(!tracker.record("com.chat", "   "));
        assert!(tracker.is_empty());

        tracker.record("com.chat", "draft");
        assert!(!tracker.record("com.chat", "\t\n"));
        assert_eq!(tracker.peek("com.chat").as_deref(), Some("draft"));
    }

    #[test]
    fn test_latest_write_wins_per_source() {
        let tracker = TypedTextTracker::new();
        tracker.record("com.chat", "h");
        tracker.record("com.chat", "hi");
        tracker.record("com.mail", "dear");
        assert_eq!(tracker.len(), 2);
        assert_eq!(tracker.take("com.chat").as_deref(), Some("hi"));
        assert_eq!(tracker.peek("com.mail").as_deref(), Some("dear"));
    }

    #[test]
    fn test_clear() {
        let tracker = TypedTextTracker::new();
        tracker.record("com.chat", "hi");
        assert!(tracker.clear("com.chat"));
        assert!(!tracker.clear("com.chat"));
        assert_eq!(tracker.peek("com.chat"), None);
    }

    #[test]
    fn test_ttl_expires_entries() {
        let tracker = TypedTextTracker::with_ttl(Duration::from_millis(5));
        tracker.record("com.chat", "stale");
        tracker.record("com.mail", "also stale");
        thread::sleep(Duration::from_millis(20));

        assert_eq!(tracker.take("com.chat"), None);
        assert_eq!(tracker.prune(), 1);
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_concurrent_take_yields_once() {
        let tracker = Arc::new(TypedTextTracker::new());
        tracker.record("com.chat", "only once");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tracker = tracker.clone();
                thread::spawn(move || tracker.take("com.chat"))
            })
            .collect();

        let taken = handles
            .into_iter()
            .filter_map(|h| h.join().unwrap())
            .count();
        assert_eq!(taken, 1);
    }
}
