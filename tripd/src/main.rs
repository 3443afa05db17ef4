//! TripDaemon - itinerary planning orchestrator
//!
//! CLI entry point for inspecting persisted trips and validating config.

use std::fs;
use std::path::PathBuf;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use planstore::Store;
use tracing::info;

use tripdaemon::cli::{Cli, Command, OutputFormat};
use tripdaemon::config::Config;
use tripdaemon::domain::{DayStatus, PlanContext};
use tripdaemon::orchestrator::PlanSummary;

fn setup_logging(verbose: bool) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tripdaemon")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Setup tracing subscriber - write to log file, not stdout/stderr
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    let log_file = fs::File::create(log_dir.join("tripd.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (verbose: {})", verbose);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    info!(
        "TripDaemon loaded config: backend={}, store={}",
        config.stage.base_url, config.storage.planstore_dir
    );

    match cli.command {
        Some(Command::Status { trip_id, format }) => cmd_status(&config, &trip_id, format),
        Some(Command::List { format }) => cmd_list(&config, format),
        Some(Command::CheckConfig) => cmd_check_config(&config),
        None => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            cmd.print_help()?;
            Ok(())
        }
    }
}

fn open_store(config: &Config) -> Result<Store> {
    Store::open(&config.storage.planstore_dir).context("Failed to open plan store")
}

/// Show one trip's planning status
fn cmd_status(config: &Config, trip_id: &str, format: OutputFormat) -> Result<()> {
    let store = open_store(config)?;
    let context: PlanContext = store
        .get(trip_id)?
        .ok_or_else(|| eyre::eyre!("Trip not found: {}", trip_id))?;
    let summary = PlanSummary::from_context(&context);

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        OutputFormat::Text => {
            println!("{} ({})", summary.destination.bold(), summary.trip_id);
            println!(
                "  {} to {}  state: {}  version: {}",
                summary.start_date, summary.end_date, summary.state, summary.version
            );
            println!();
            for day in &summary.days {
                let status = colorize_status(day.status);
                let degraded = if day.degraded { " [degraded]".yellow().to_string() } else { String::new() };
                let score = day.score.map(|s| format!("  score {:.0}", s)).unwrap_or_default();
                println!(
                    "  day {} ({})  {}  {} activities{}{}",
                    day.index, day.date, status, day.activity_count, score, degraded
                );
            }
        }
    }

    Ok(())
}

/// List all persisted trips
fn cmd_list(config: &Config, format: OutputFormat) -> Result<()> {
    let store = open_store(config)?;
    let contexts: Vec<PlanContext> = store.list()?;
    let summaries: Vec<PlanSummary> = contexts.iter().map(PlanSummary::from_context).collect();

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&summaries)?);
        }
        OutputFormat::Text => {
            if summaries.is_empty() {
                println!("No trips found in {}", config.storage.planstore_dir);
                return Ok(());
            }
            for summary in &summaries {
                let confirmed = summary
                    .days
                    .iter()
                    .filter(|d| d.status == DayStatus::Confirmed)
                    .count();
                println!(
                    "{}  {}  {} to {}  {}  {}/{} days confirmed",
                    summary.trip_id,
                    summary.destination.bold(),
                    summary.start_date,
                    summary.end_date,
                    summary.state,
                    confirmed,
                    summary.days.len()
                );
            }
        }
    }

    Ok(())
}

/// Validate the effective configuration and exit
fn cmd_check_config(config: &Config) -> Result<()> {
    config.validate()?;
    println!("{}", "Configuration OK".green());
    println!("  backend: {}", config.stage.base_url);
    println!("  api key env: {}", config.stage.api_key_env);
    println!("  store: {}", config.storage.planstore_dir);
    println!("  max revisions: {}", config.limits.max_revisions);
    println!("  max trip days: {}", config.limits.max_trip_days);
    Ok(())
}

fn colorize_status(status: DayStatus) -> String {
    let text = status.to_string();
    match status {
        DayStatus::Confirmed => text.green().to_string(),
        DayStatus::PendingConfirmation => text.cyan().to_string(),
        DayStatus::NeedsManualReview => text.red().to_string(),
        DayStatus::Invalidated => text.yellow().to_string(),
        _ => text,
    }
}
