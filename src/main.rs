//! CLI entry point for the GTFS-realtime producer.
//!
//! Provides subcommands for running the refresh loop, executing a single
//! cycle, and inspecting a written feed file.

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand};
use gtfs_rt_producer::{
    config::ProducerConfig,
    feed::EntityIdScheme,
    output::FeedFileWriter,
    parser::read_feed_file,
    producer::Producer,
    schedule::ScheduleIndex,
    server::start_feed_servers,
    stats::FeedSummary,
    telemetry::source_from,
};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{Instrument, info, info_span};
use tracing_subscriber::{
    EnvFilter, Layer,
    filter::LevelFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "gtfs_rt_producer")]
#[command(about = "Publishes GTFS-realtime feeds from polled vehicle telemetry", long_about = None)]
struct Cli {
    /// JSON config file; flags override its values
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the schedule and refresh the feeds until stopped
    Run(Overrides),
    /// Run a single refresh cycle, write the feeds and exit
    Once(Overrides),
    /// Print a summary of a written feed file
    Inspect {
        /// Feed file, plain or gzip compressed
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

#[derive(Args)]
struct Overrides {
    /// Prediction endpoint URL or path to a JSON document
    #[arg(short, long)]
    source: Option<String>,

    /// Directory holding trips.txt, calendar.txt, stop_times.txt and frequencies.txt
    #[arg(short, long)]
    gtfs_dir: Option<PathBuf>,

    /// Seconds between the end of one cycle and the start of the next
    #[arg(short = 'r', long)]
    refresh_interval: Option<u64>,

    #[arg(long, value_enum)]
    entity_ids: Option<EntityIdScheme>,

    #[arg(long)]
    trip_updates_path: Option<PathBuf>,

    #[arg(long)]
    vehicle_positions_path: Option<PathBuf>,

    /// Also serve trip updates over HTTP, e.g. http://0.0.0.0:8080/trip-updates
    #[arg(long)]
    trip_updates_url: Option<String>,

    /// Also serve vehicle positions over HTTP
    #[arg(long)]
    vehicle_positions_url: Option<String>,

    /// Gzip compress written feeds
    #[arg(long, default_value_t = false)]
    gzip: bool,
}

impl Overrides {
    fn apply(self, config: &mut ProducerConfig) {
        if let Some(source) = self.source {
            config.source = Some(source);
        }
        if let Some(dir) = self.gtfs_dir {
            config.gtfs_dir = dir;
        }
        if let Some(secs) = self.refresh_interval {
            config.refresh_interval_secs = secs;
        }
        if let Some(scheme) = self.entity_ids {
            config.entity_ids = scheme;
        }
        if let Some(path) = self.trip_updates_path {
            config.trip_updates_path = path;
        }
        if let Some(path) = self.vehicle_positions_path {
            config.vehicle_positions_path = path;
        }
        if let Some(url) = self.trip_updates_url {
            config.trip_updates_url = Some(url);
        }
        if let Some(url) = self.vehicle_positions_url {
            config.vehicle_positions_url = Some(url);
        }
        config.gzip |= self.gzip;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/gtfs_rt_producer.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("gtfs_rt_producer.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive(LevelFilter::INFO.into()));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive(LevelFilter::DEBUG.into()));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => ProducerConfig::load(path)?,
        None => ProducerConfig::default(),
    };
    if config.api_key.is_none() {
        config.api_key = std::env::var("SYNCROMATICS_API_KEY").ok();
    }

    match cli.command {
        Commands::Run(overrides) => {
            overrides.apply(&mut config);
            let mut producer = start(&config)?;

            let mut bindings = Vec::new();
            if let Some(url) = &config.trip_updates_url {
                bindings.push((url.clone(), Arc::clone(producer.trip_updates())));
            }
            if let Some(url) = &config.vehicle_positions_url {
                bindings.push((url.clone(), Arc::clone(producer.vehicle_positions())));
            }
            let mut handles = Vec::new();
            for (server, handle) in start_feed_servers(bindings)? {
                tokio::spawn(server);
                handles.push(handle);
            }

            let outcome = tokio::select! {
                result = producer.run() => result,
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted, shutting down");
                    Ok(())
                }
            };
            for handle in handles {
                handle.stop(true).await;
            }
            outcome?;
        }
        Commands::Once(overrides) => {
            overrides.apply(&mut config);
            let mut producer = start(&config)?;

            let report = producer
                .run_cycle()
                .instrument(info_span!("refresh_cycle", cycle = 1))
                .await?;
            info!(
                trip_updates = report.trip_updates,
                vehicle_positions = report.vehicle_positions,
                diagnostics = report.diagnostics.len(),
                "Single cycle complete"
            );
        }
        Commands::Inspect { file } => {
            let feed = read_feed_file(&file)
                .with_context(|| format!("reading feed {}", file.display()))?;
            let summary = FeedSummary::from_feed(&feed);

            info!(file = %file.display(), entities = summary.total_entities, "Feed decoded");
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }

    Ok(())
}

/// Loads the schedule, connects the telemetry source and attaches a file
/// writer to each feed.
#[tracing::instrument(skip_all, fields(gtfs_dir = %config.gtfs_dir.display()))]
fn start(config: &ProducerConfig) -> Result<Producer> {
    let source = config
        .source
        .as_deref()
        .ok_or_else(|| anyhow!("no telemetry source configured (use --source or the config file)"))?;

    let index = ScheduleIndex::load_dir(&config.gtfs_dir)
        .with_context(|| format!("loading schedule from {}", config.gtfs_dir.display()))?;
    let telemetry = source_from(source, config.api_key.clone(), config.fetch_timeout())?;

    let producer = Producer::new(Arc::new(index), telemetry, config)?;
    producer
        .trip_updates()
        .add_listener(Arc::new(FeedFileWriter::new(
            &config.trip_updates_path,
            config.gzip,
        )));
    producer
        .vehicle_positions()
        .add_listener(Arc::new(FeedFileWriter::new(
            &config.vehicle_positions_path,
            config.gzip,
        )));

    info!(
        source,
        trip_updates = %config.trip_updates_path.display(),
        vehicle_positions = %config.vehicle_positions_path.display(),
        "Producer ready"
    );
    Ok(producer)
}
