//! Notify Monitor CLI
//!
//! Relays device notifications and sent messages to a collector.

use anyhow::Context;
use clap::{Parser, Subcommand};
use notify_monitor::{
    collector::{EventFeed, FeedConfig},
    config::{Config, RunOverrides, SourceConfig},
    core::{EventRouter, KeywordClassifier, PayloadNormalizer, RecordSink, StdoutSink},
    device::{DeviceInfo, StaticAppDirectory},
    transparency::create_shared_log_with_persistence,
    TypedTextTracker, PERMISSION_NOTICE, VERSION,
};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[cfg(feature = "gateway")]
use notify_monitor::{Dispatcher, GatewayClient, GatewayConfig};

#[derive(Parser)]
#[command(name = "notify-monitor")]
#[command(version = VERSION)]
#[command(about = "Relays device notifications and sent messages to a collector", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start processing events
    Start {
        /// Read JSON-lines events from this file instead of stdin
        #[arg(long, short)]
        input: Option<PathBuf>,

        /// Event streams to process (notifications, accessibility, or all; overrides config)
        #[arg(long)]
        sources: Option<String>,

        /// Collector endpoint (overrides config)
        #[arg(long)]
        endpoint: Option<String>,

        /// Number of delivery workers (overrides config)
        #[arg(long)]
        workers: Option<usize>,

        /// Print records to stdout instead of delivering them
        #[arg(long)]
        dry_run: bool,
    },

    /// Show forwarding statistics
    Status,

    /// Show how to grant the required device permissions
    Grant,

    /// Show configuration
    Config,

    /// Run a collector endpoint that stores received records
    #[cfg(feature = "server")]
    Serve {
        /// Port to listen on
        #[arg(long, default_value = "8000")]
        port: u16,

        /// Append stored records to this JSON-lines file
        #[arg(long)]
        store: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    // A config that failed to load must not be overwritten by defaults.
    let (config, config_loaded) = match Config::load() {
        Ok(config) => (config, true),
        Err(e) => {
            eprintln!("Warning: Could not load config ({e}), using defaults");
            (Config::default(), false)
        }
    };
    init_tracing(&config.log_level);

    let result = match cli.command {
        Commands::Start {
            input,
            sources,
            endpoint,
            workers,
            dry_run,
        } => {
            let overrides = RunOverrides {
                sources: sources.as_deref().map(SourceConfig::from_csv),
                endpoint,
                workers,
            };
            cmd_start(config, config_loaded, overrides, input, dry_run)
        }
        Commands::Status => {
            cmd_status(&config);
            Ok(())
        }
        Commands::Grant => {
            println!("{PERMISSION_NOTICE}");
            Ok(())
        }
        Commands::Config => {
            cmd_config(&config);
            Ok(())
        }
        #[cfg(feature = "server")]
        Commands::Serve { port, store } => cmd_serve(port, store),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_start(
    mut stored: Config,
    config_loaded: bool,
    overrides: RunOverrides,
    input: Option<PathBuf>,
    dry_run: bool,
) -> anyhow::Result<()> {
    // Persist the device id before any per-run override is applied.
    if stored.ensure_device_id() && config_loaded {
        if let Err(e) = stored.save() {
            eprintln!("Warning: Could not persist device id: {e}");
        }
    }

    let config = stored.with_overrides(&overrides);
    if !config.sources.any_enabled() {
        anyhow::bail!("At least one source must be enabled (notifications or accessibility)");
    }
    config.validate()?;

    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Could not create directories: {e}");
    }

    let device = DeviceInfo::detect(&config.device);
    let zone = config.display_zone()?;

    eprintln!("Notify Monitor v{VERSION}");
    eprintln!(
        "  Notifications: {}",
        if config.sources.notifications { "enabled" } else { "disabled" }
    );
    eprintln!(
        "  Accessibility: {}",
        if config.sources.accessibility { "enabled" } else { "disabled" }
    );
    eprintln!("  Device: {} ({})", device.device_name, device.device_id);

    let transparency_log =
        create_shared_log_with_persistence(config.data_path.join("transparency.json"));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("Failed to create async runtime")?;

    // Delivery sink: stdout for dry runs, the worker pool otherwise.
    #[cfg(feature = "gateway")]
    let dispatcher = if dry_run {
        None
    } else {
        let client = GatewayClient::new(GatewayConfig::from_config(&config))?;
        eprintln!(
            "  Delivery: {} ({} workers)",
            client.endpoint(),
            config.delivery_workers
        );
        Some(Arc::new(Dispatcher::spawn(
            runtime.handle(),
            client,
            config.delivery_workers,
            config.delivery_queue_capacity,
            transparency_log.clone(),
        )))
    };

    #[cfg(feature = "gateway")]
    let sink: Arc<dyn RecordSink> = match dispatcher {
        Some(ref dispatcher) => dispatcher.clone(),
        None => Arc::new(StdoutSink),
    };

    #[cfg(not(feature = "gateway"))]
    let sink: Arc<dyn RecordSink> = {
        if !dry_run {
            eprintln!("Warning: gateway feature not enabled at compile time, printing records");
        }
        Arc::new(StdoutSink)
    };

    let tracker = Arc::new(match config.typed_text_ttl() {
        Some(ttl) => TypedTextTracker::with_ttl(ttl),
        None => TypedTextTracker::new(),
    });
    let normalizer = PayloadNormalizer::new(
        device,
        Arc::new(StaticAppDirectory::new(config.apps.clone())),
    )
    .with_zone(zone);
    let router = EventRouter::new(normalizer, tracker.clone(), sink).with_classifier(Box::new(
        KeywordClassifier::new(&config.send_keywords),
    ));

    // Event feed
    let reader: Box<dyn BufRead + Send> = match input {
        Some(ref path) => Box::new(std::io::BufReader::new(
            std::fs::File::open(path)
                .with_context(|| format!("Failed to open {}", path.display()))?,
        )),
        None => Box::new(std::io::BufReader::new(std::io::stdin())),
    };
    let mut feed = EventFeed::new(FeedConfig::default());
    feed.start(reader)?;

    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone())?;

    eprintln!();
    eprintln!("Press Ctrl+C to stop");
    eprintln!();

    // Main event loop
    let receiver = feed.receiver().clone();
    let mut last_prune = std::time::Instant::now();

    while running.load(Ordering::SeqCst) {
        match receiver.recv_timeout(Duration::from_millis(100)) {
            Ok(event) => {
                if !config.sources.accepts(&event) {
                    continue;
                }
                let outcome = router.handle(&event);
                transparency_log.record_outcome(&outcome);
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                if last_prune.elapsed() >= Duration::from_secs(60) {
                    let pruned = tracker.prune();
                    if pruned > 0 {
                        tracing::debug!(pruned, "Pruned expired typed text");
                    }
                    last_prune = std::time::Instant::now();
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
        }

        // End of input with nothing left queued.
        if !feed.is_running() && receiver.is_empty() {
            break;
        }
    }

    eprintln!();
    eprintln!("Stopping...");
    feed.stop();
    transparency_log.record_malformed_events(feed.malformed_count());

    // Let queued deliveries finish.
    #[cfg(feature = "gateway")]
    {
        drop(router);
        if let Some(dispatcher) = dispatcher.and_then(|d| Arc::try_unwrap(d).ok()) {
            let drained = runtime.block_on(async {
                tokio::time::timeout(Duration::from_secs(15), dispatcher.shutdown()).await
            });
            if drained.is_err() {
                eprintln!("Warning: Some deliveries were still in flight at exit");
            }
        }
    }

    if let Err(e) = transparency_log.save() {
        eprintln!("Warning: Could not save transparency log: {e}");
    }

    eprintln!();
    eprintln!("{}", transparency_log.summary());
    Ok(())
}

fn cmd_status(config: &Config) {
    println!("Notify Monitor Status");
    println!("=====================");
    println!();

    println!("Configuration:");
    println!("  Endpoint: {}", config.endpoint);
    println!(
        "  Notifications: {}",
        if config.sources.notifications { "enabled" } else { "disabled" }
    );
    println!(
        "  Accessibility: {}",
        if config.sources.accessibility { "enabled" } else { "disabled" }
    );
    println!("  Delivery workers: {}", config.delivery_workers);
    match config.typed_text_ttl_secs {
        Some(secs) => println!("  Typed text TTL: {secs}s"),
        None => println!("  Typed text TTL: none"),
    }
    println!();

    let stats_path = config.data_path.join("transparency.json");
    if stats_path.exists() {
        if let Ok(content) = std::fs::read_to_string(&stats_path) {
            if let Ok(stats) = serde_json::from_str::<serde_json::Value>(&content) {
                println!("Cumulative Statistics:");
                for (key, label) in [
                    ("notifications_forwarded", "Notifications forwarded"),
                    ("outgoing_from_tracker", "Outgoing (typed text)"),
                    ("outgoing_from_screen", "Outgoing (screen)"),
                    ("records_dropped", "Records dropped"),
                    ("deliveries_succeeded", "Deliveries succeeded"),
                    ("deliveries_failed", "Deliveries failed"),
                ] {
                    if let Some(value) = stats.get(key) {
                        println!("  {label}: {value}");
                    }
                }
            }
        }
    } else {
        println!("No previous session data found.");
    }
}

fn cmd_config(config: &Config) {
    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(config).unwrap_or_else(|_| "Error".to_string())
    );
}

#[cfg(feature = "server")]
fn cmd_serve(port: u16, store: Option<PathBuf>) -> anyhow::Result<()> {
    use notify_monitor::server::{run, ServerConfig};

    let runtime = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
    runtime.block_on(async {
        let mut server_config = ServerConfig::new(port);
        if let Some(path) = store {
            server_config = server_config.with_store_path(path);
        }

        let (addr, shutdown_tx) = run(server_config).await?;
        println!("Collector listening on http://{addr}/api/notifications");
        println!("Press Ctrl+C to stop");

        tokio::signal::ctrl_c().await?;
        let _ = shutdown_tx.send(());
        Ok(())
    })
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) -> anyhow::Result<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .context("Error setting Ctrl+C handler")
}
