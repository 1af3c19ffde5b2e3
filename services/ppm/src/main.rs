//! Privacy Protection Module service.
//!
//! Consumes Basic Safety Messages from an upstream bus topic, runs each one
//! through the privacy filter pipeline, and republishes the survivors to a
//! downstream topic. Messages failing a filter are suppressed and logged
//! with the latched reason.
//!
//! The bus client is pluggable behind the [`bus`] traits; the built-in
//! transport filters standard input to standard output, one JSON message per
//! line, which is handy for smoke tests and offline runs:
//!
//! ```bash
//! ppm --config config/ppm.properties --exit-on-eof < bsms.jsonl > filtered.jsonl
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use bsm_filter::BsmHandler;
use ppm::bus::{StdinConsumer, StdoutProducer};
use ppm::config::{self, PpmConfig};
use ppm::supervisor::{build_geofence, ShutdownFlags, Supervisor};

#[derive(Parser, Debug)]
#[command(name = "ppm")]
#[command(about = "Privacy Protection Module for Basic Safety Messages")]
struct Args {
    /// Configuration file (flat key=value properties)
    #[arg(short, long, env = "PPM_CONFIG")]
    config: PathBuf,

    /// Check the configuration, print the resolved settings, and exit
    #[arg(short = 'C', long)]
    config_check: bool,

    /// Override the consumed (unfiltered) topic
    #[arg(short = 'u', long)]
    unfiltered_topic: Option<String>,

    /// Override the produced (filtered) topic
    #[arg(short = 'f', long)]
    filtered_topic: Option<String>,

    /// Override the consumer partition
    #[arg(short, long)]
    partition: Option<i32>,

    /// Override the geofence map file
    #[arg(short, long)]
    mapfile: Option<PathBuf>,

    /// Stop when the consumed stream reaches end of file
    #[arg(short = 'x', long)]
    exit_on_eof: bool,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    /// Fold the CLI overrides into the flat configuration map; command-line
    /// options win over file settings.
    fn apply_overrides(&self, map: &mut bsm_filter::ConfigMap) {
        if let Some(topic) = &self.unfiltered_topic {
            map.insert("privacy.topic.consumer".to_string(), topic.clone());
        }
        if let Some(topic) = &self.filtered_topic {
            map.insert("privacy.topic.producer".to_string(), topic.clone());
        }
        if let Some(partition) = self.partition {
            map.insert("privacy.kafka.partition".to_string(), partition.to_string());
        }
        if let Some(mapfile) = &self.mapfile {
            map.insert(
                "privacy.filter.geofence.mapfile".to_string(),
                mapfile.display().to_string(),
            );
        }
    }
}

fn install_signal_handlers(flags: Arc<ShutdownFlags>) -> anyhow::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = signal(SignalKind::terminate()).context("installing SIGTERM handler")?;
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
        info!("received shutdown signal; finishing the message in flight");
        flags.request_shutdown();
    });
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut map = config::load_config_file(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    args.apply_overrides(&mut map);
    let config = PpmConfig::resolve(map).context("resolving configuration")?;

    if args.config_check {
        print!("{}", config.render());
        return Ok(());
    }

    info!(
        consumer = %config.consumed_topic,
        producer = %config.published_topic,
        mapfile = %config.mapfile.display(),
        "starting privacy protection module"
    );

    // Fatal configuration problems (unreadable map file, malformed shapes)
    // surface here, before the consume loop starts.
    let geofence = Arc::new(build_geofence(&config)?);
    let handler = BsmHandler::new(Some(geofence), &config.raw);

    let flags = Arc::new(ShutdownFlags::new());
    install_signal_handlers(flags.clone())?;

    let mut supervisor = Supervisor::new(
        config,
        handler,
        StdinConsumer::new(),
        StdoutProducer::new(),
        flags,
        args.exit_on_eof,
    );
    supervisor.run().await
}
