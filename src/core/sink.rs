//! Record sinks.
//!
//! The router hands every finished record to a [`RecordSink`]. Submission
//! must not block on delivery; network sinks queue the record and return.

use crate::core::record::NormalizedRecord;
use std::io::Write;
use std::sync::Mutex;
use thiserror::Error;

/// Reasons a record could not be accepted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    #[error("delivery queue is full")]
    Full,
    #[error("delivery queue is closed")]
    Closed,
    #[error("failed to write record: {0}")]
    Write(String),
}

/// Accepts normalized records for delivery.
pub trait RecordSink: Send + Sync {
    fn submit(&self, record: NormalizedRecord) -> Result<(), SinkError>;
}

/// Keeps records in memory. Useful for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<NormalizedRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return everything collected so far.
    pub fn drain(&self) -> Vec<NormalizedRecord> {
        std::mem::take(&mut *self.records.lock().unwrap_or_else(|e| e.into_inner()))
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RecordSink for MemorySink {
    fn submit(&self, record: NormalizedRecord) -> Result<(), SinkError> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record);
        Ok(())
    }
}

/// Writes each record as one JSON line to stdout.
#[derive(Debug, Default)]
pub struct StdoutSink;

impl RecordSink for StdoutSink {
    fn submit(&self, record: NormalizedRecord) -> Result<(), SinkError> {
        let line =
            serde_json::to_string(&record).map_err(|e| SinkError::Write(e.to_string()))?;
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{line}").map_err(|e| SinkError::Write(e.to_string()))
    }
}
