//! Reserved instance checker
//!
//! Runs once per invocation (typically from a daily scheduler): loads the
//! configured accounts, reconciles their reservations against running
//! capacity, prints the report and mails it when email is configured.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use reserve_lib::{
    deliver_all, run_accounts, Clock, FixedClock, ReconcileMetrics, Reconciliation,
    ReportAssembler, ReportSink, SnapshotSource, StructuredLogger, SystemClock,
};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;
mod output;
mod sink;

/// Compare capacity reservations against running instances
#[derive(Parser)]
#[command(name = "check-reserved-instances")]
#[command(author, version, about = "Compare reservations and running instances for cloud services", long_about = None)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(long, env = "RI_CONFIG", default_value = "config.toml")]
    pub config: PathBuf,

    /// Directory of account snapshots (overrides the config file)
    #[arg(long)]
    pub snapshot_dir: Option<PathBuf>,

    /// Output format
    #[arg(long, short, default_value = "text")]
    pub format: output::OutputFormat,

    /// List reservations expiring within this many days (overrides the config file)
    #[arg(long)]
    pub horizon_days: Option<u32>,

    /// Write Prometheus text metrics to this file
    #[arg(long)]
    pub metrics_file: Option<PathBuf>,

    /// Evaluate expiry as of this RFC3339 instant instead of the current time
    #[arg(long)]
    pub now: Option<DateTime<Utc>>,

    /// Print the report without sending the configured email
    #[arg(long)]
    pub no_email: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout carries only the report
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = config::CheckerConfig::load(&cli.config)?;
    let horizon_days = cli.horizon_days.unwrap_or(config.expiry_horizon_days);
    let snapshot_dir = cli
        .snapshot_dir
        .clone()
        .unwrap_or_else(|| config.snapshot_dir.clone());
    info!(
        accounts = config.accounts.len(),
        snapshot_dir = %snapshot_dir.display(),
        horizon_days = horizon_days,
        "Checker configured"
    );

    let mut sinks: Vec<Box<dyn ReportSink>> = vec![Box::new(sink::StdoutSink::new(cli.format))];
    match &config.email {
        Some(email) if !cli.no_email => {
            sinks.push(Box::new(sink::EmailSink::new(email.clone())?));
        }
        _ => info!("Not sending email for this report"),
    }

    let clock: Box<dyn Clock> = match cli.now {
        Some(now) => Box::new(FixedClock(now)),
        None => Box::new(SystemClock),
    };

    let metrics = ReconcileMetrics::new()?;
    let logger = StructuredLogger::new(clock.now().format("%Y%m%dT%H%M%SZ").to_string());

    let mut reconciliation = Reconciliation::new(clock.as_ref())
        .with_policy(config.match_policy)
        .with_logger(logger)
        .with_metrics(metrics.clone());

    let source = SnapshotSource::new(snapshot_dir);
    run_accounts(&source, &config.accounts, &mut reconciliation).await;

    let report = reconciliation.finish(&ReportAssembler::new().with_horizon_days(horizon_days));

    if let Some(path) = &cli.metrics_file {
        std::fs::write(path, metrics.encode_text()?)
            .with_context(|| format!("Failed to write metrics file {}", path.display()))?;
    }

    deliver_all(&sinks, &report).await
}
