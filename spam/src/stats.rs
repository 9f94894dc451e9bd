//! spam-stats - activation report
//!
//! Prints per-component usage for today, the last 7/30/365 days and all
//! time, for every component in the catalog.

use anyhow::{Context, Result};
use clap::Parser;
use spam_core::format::{render_no_data, render_stats_report};
use spam_core::{CatalogSnapshot, Config, EventStore, StatsEngine};

#[derive(Parser)]
#[command(name = "spam-stats")]
#[command(about = "Show skill and command activation statistics")]
#[command(version)]
struct Args {
    /// Emit the report as JSON
    #[arg(long)]
    json: bool,

    /// Also list the N most recent activations
    #[arg(long, value_name = "N")]
    recent: Option<usize>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load().context("failed to load configuration")?;
    let _log_guard =
        spam_core::logging::init(&config.logging).context("failed to initialize logging")?;

    let db_path = Config::database_path();
    if !db_path.exists() {
        tracing::info!(path = %db_path.display(), "No activation database yet");
        if args.json {
            println!("null");
        } else {
            println!("{}", render_no_data());
        }
        return Ok(());
    }

    let catalog = CatalogSnapshot::load_or_empty(&Config::catalog_path());
    let store = EventStore::open(&db_path, &config.store).context("failed to open database")?;
    let engine = StatsEngine::new(&store);
    let report = engine.report(&catalog).context("failed to compute stats")?;

    tracing::info!(
        components = report.components.len(),
        total_events = report.total_events,
        "Stats computed"
    );

    let recent = match args.recent {
        Some(limit) => store.recent(limit).context("failed to list recent activations")?,
        None => Vec::new(),
    };

    if args.json {
        let mut value = serde_json::to_value(&report).context("failed to serialize report")?;
        if args.recent.is_some() {
            value["recent"] = serde_json::to_value(&recent).context("failed to serialize report")?;
        }
        println!(
            "{}",
            serde_json::to_string_pretty(&value).context("failed to serialize report")?
        );
        return Ok(());
    }

    println!("{}", render_stats_report(&report, &db_path));

    if args.recent.is_some() {
        println!();
        println!("Recent activations:");
        for record in &recent {
            println!(
                "  {}  {:<25} {:<8} {}",
                record.invoked_at.format("%Y-%m-%dT%H:%M:%S"),
                record.component_name,
                record.component_type,
                record.detection_method
            );
        }
    }

    Ok(())
}
