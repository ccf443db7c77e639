//! JSON-lines event feed.
//!
//! The OS-side listener services write one [`RawEvent`] per line. The feed
//! reads those lines on a background thread and hands parsed events to the
//! processing loop through a bounded channel, so a slow consumer never
//! stalls the producer beyond the channel capacity.

use crate::collector::types::RawEvent;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::io::BufRead;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Configuration for the event feed.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Capacity of the event channel
    pub capacity: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self { capacity: 10_000 }
    }
}

/// Errors that can occur while running the feed.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Event feed is already running")]
    AlreadyRunning,
    #[error("Failed to open event input: {0}")]
    Io(#[from] std::io::Error),
}

/// Reads raw events from a line-oriented source.
pub struct EventFeed {
    sender: Sender<RawEvent>,
    receiver: Receiver<RawEvent>,
    running: Arc<AtomicBool>,
    malformed: Arc<AtomicU64>,
    thread_handle: Option<JoinHandle<()>>,
}

impl EventFeed {
    /// Create a new, idle feed.
    pub fn new(config: FeedConfig) -> Self {
        let (sender, receiver) = bounded(config.capacity.max(1));
        Self {
            sender,
            receiver,
            running: Arc::new(AtomicBool::new(false)),
            malformed: Arc::new(AtomicU64::new(0)),
            thread_handle: None,
        }
    }

    /// Start reading events from `reader` in a background thread.
    ///
    /// The thread stops at end of input, when [`stop`](Self::stop) is called,
    /// or when the receiving side is gone.
    pub fn start<R>(&mut self, reader: R) -> Result<(), FeedError>
    where
        R: BufRead + Send + 'static,
    {
        if self.running.load(Ordering::SeqCst) {
            return Err(FeedError::AlreadyRunning);
        }
        self.running.store(true, Ordering::SeqCst);

        let sender = self.sender.clone();
        let running = self.running.clone();
        let malformed = self.malformed.clone();

        let handle = thread::spawn(move || {
            read_lines(reader, &sender, &running, &malformed);
            running.store(false, Ordering::SeqCst);
            info!("Event feed reached end of input");
        });

        self.thread_handle = Some(handle);
        Ok(())
    }

    /// Stop reading. Events already queued stay available.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        // The reader may be blocked on stdin; it notices the flag at the next line.
        self.thread_handle.take();
    }

    /// Check if the reader thread is still consuming input.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Get the receiver for raw events.
    pub fn receiver(&self) -> &Receiver<RawEvent> {
        &self.receiver
    }

    /// Try to receive an event without blocking.
    pub fn try_recv(&self) -> Option<RawEvent> {
        self.receiver.try_recv().ok()
    }

    /// Number of lines that could not be parsed so far.
    pub fn malformed_count(&self) -> u64 {
        self.malformed.load(Ordering::Relaxed)
    }
}

fn read_lines<R: BufRead>(
    reader: R,
    sender: &Sender<RawEvent>,
    running: &AtomicBool,
    malformed: &AtomicU64,
) {
    for (index, line) in reader.lines().enumerate() {
        if !running.load(Ordering::SeqCst) {
            break;
        }

        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("Event feed read error: {e}");
                break;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        match parse_line(&line) {
            Some(event) => {
                if sender.send(event).is_err() {
                    debug!("Event receiver dropped, stopping feed");
                    break;
                }
            }
            None => {
                malformed.fetch_add(1, Ordering::Relaxed);
                warn!(line = index + 1, "Skipping malformed event");
            }
        }
    }
}

/// Parse a single feed line. Malformed input yields `None`.
pub fn parse_line(line: &str) -> Option<RawEvent> {
    match serde_json::from_str(line) {
        Ok(event) => Some(event),
        Err(e) => {
            debug!("Event parse error: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::time::Duration;

    #[test]
    fn test_feed_reads_lines_and_skips_garbage() {
        let input = concat!(
            r#"{"type":"text_changed","package":"com.chat","text":"hi"}"#,
            "\n",
            "not json\n",
            "\n",
            r#"{"type":"window_content_changed"}"#,
            "\n",
        );

        let mut feed = EventFeed::new(FeedConfig::default());
        feed.start(Cursor::new(input.as_bytes().to_vec())).unwrap();

        let first = feed
            .receiver()
            .recv_timeout(Duration::from_secs(2))
            .unwrap();
        assert_eq!(first, RawEvent::TextChanged(crate::TextChangedEvent::new("com.chat", "hi")));

        let second = feed
            .receiver()
            .recv_timeout(Duration::from_secs(2))
            .unwrap();
        assert_eq!(second, RawEvent::Unsupported);

        // Reader thread finishes at end of input.
        for _ in 0..200 {
            if !feed.is_running() {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        assert!(!feed.is_running());
        assert_eq!(feed.malformed_count(), 1);
        assert!(feed.try_recv().is_none());
    }

    #[test]
    fn test_parse_line_keeps_event_with_null_package() {
        let event = parse_line(r#"{"type":"text_changed","package":null,"text":"hi"}"#);
        assert_eq!(
            event,
            Some(RawEvent::TextChanged(crate::TextChangedEvent::new("unknown", "hi")))
        );
    }

    #[test]
    fn test_feed_rejects_double_start() {
        let mut feed = EventFeed::new(FeedConfig { capacity: 4 });
        // A reader that never ends keeps the feed running.
        let (_tx, rx) = std::sync::mpsc::channel::<Vec<u8>>();
        let blocking = std::io::BufReader::new(ChannelReader(rx));
        feed.start(blocking).unwrap();
        assert!(matches!(
            feed.start(Cursor::new(Vec::new())),
            Err(FeedError::AlreadyRunning)
        ));
        feed.stop();
        assert!(!feed.is_running());
    }

    struct ChannelReader(std::sync::mpsc::Receiver<Vec<u8>>);

    impl std::io::Read for ChannelReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            match self.0.recv() {
                Ok(bytes) => {
                    let n = bytes.len().min(buf.len());
                    buf[..n].copy_from_slice(&bytes[..n]);
                    Ok(n)
                }
                Err(_) => Ok(0),
            }
        }
    }
}
