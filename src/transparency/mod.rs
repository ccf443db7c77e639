//! Transparency module for the notification monitor.
//!
//! Tracks how many events were observed and how many records left the
//! device, so users can audit what the monitor forwards.

pub mod log;

// Re-export commonly used types
pub use log::{
    create_shared_log, create_shared_log_with_persistence, SharedTransparencyLog, TransparencyLog,
    TransparencyStats,
};
