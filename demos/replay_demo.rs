//! Replay a recorded event feed through the router.
//!
//! This demo shows how to:
//! 1. Build a normalizer with device and app metadata
//! 2. Wire a router to an in-memory sink
//! 3. Parse JSON-lines events and route them
//! 4. Inspect the records that would be delivered
//!
//! Run with: cargo run --example replay_demo [path/to/events.jsonl]
//!
//! Without an argument the bundled `demos/sample_events.jsonl` is used.

use std::io::BufRead;
use std::sync::Arc;

use notify_monitor::{
    collector::parse_line,
    device::AppInfo,
    transparency::TransparencyLog,
    DeviceInfo, EventRouter, MemorySink, PayloadNormalizer, StaticAppDirectory,
    TypedTextTracker,
};

const SAMPLE: &str = include_str!("sample_events.jsonl");

fn main() -> anyhow::Result<()> {
    println!("Notify Monitor - Replay Demo");
    println!("============================");
    println!();

    let lines: Vec<String> = match std::env::args().nth(1) {
        Some(path) => std::io::BufReader::new(std::fs::File::open(&path)?)
            .lines()
            .collect::<Result<_, _>>()?,
        None => SAMPLE.lines().map(str::to_string).collect(),
    };

    let mut apps = StaticAppDirectory::default();
    apps.insert(
        "com.whatsapp",
        AppInfo {
            label: "WhatsApp".to_string(),
            version: Some("2.24.1".to_string()),
        },
    );

    let sink = Arc::new(MemorySink::new());
    let normalizer = PayloadNormalizer::new(
        DeviceInfo::new("demo-device", "Demo Phone", "14"),
        Arc::new(apps),
    );
    let router = EventRouter::new(normalizer, Arc::new(TypedTextTracker::new()), sink.clone());
    let log = TransparencyLog::new();

    let mut malformed = 0;
    for (index, line) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let Some(event) = parse_line(line) else {
            malformed += 1;
            continue;
        };
        let outcome = router.handle(&event);
        println!("[{:>2}] {:<24} -> {:?}", index + 1, event.package().unwrap_or("-"), outcome);
        log.record_outcome(&outcome);
    }
    log.record_malformed_events(malformed);

    println!();
    println!("Records");
    println!("-------");
    for record in sink.drain() {
        println!("{}", serde_json::to_string_pretty(&record)?);
    }

    println!();
    println!("{}", log.summary());
    Ok(())
}
