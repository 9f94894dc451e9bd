//! spam-reconcile - backfill activations from session transcripts

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use spam_core::{Config, ReconcileOutcome, Reconciler};

#[derive(Parser)]
#[command(name = "spam-reconcile")]
#[command(about = "Backfill skill activations found in session transcripts")]
#[command(version)]
struct Args {
    /// Transcript directory (defaults to SPAM_TRANSCRIPT_DIR, then config, then ~/.claude/projects)
    #[arg(long)]
    transcripts: Option<PathBuf>,

    /// Print each skipped line or file
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load().context("failed to load configuration")?;
    let _log_guard =
        spam_core::logging::init(&config.logging).context("failed to initialize logging")?;

    let db_path = Config::database_path();
    let transcript_root = args.transcripts.unwrap_or_else(|| config.transcript_dir());

    tracing::info!(
        db = %db_path.display(),
        transcripts = %transcript_root.display(),
        "spam-reconcile starting"
    );

    let outcome = Reconciler::new(&db_path, &transcript_root, &config.store)
        .run()
        .context("reconciliation failed")?;

    match outcome {
        ReconcileOutcome::MissingDatabase(_) => {
            println!("No activation database, nothing to reconcile.");
        }
        ReconcileOutcome::MissingTranscripts(dir) => {
            println!("Transcript dir not found: {}", dir.display());
        }
        ReconcileOutcome::NoEvents(report) => {
            println!("No transcript events found.");
            print_warnings(&report.warnings, args.verbose);
        }
        ReconcileOutcome::Completed(report) => {
            println!(
                "Reconciled: {} transcript events, {} backfilled.",
                report.events_found, report.events_backfilled
            );
            print_warnings(&report.warnings, args.verbose);
        }
    }

    Ok(())
}

fn print_warnings(warnings: &[String], verbose: bool) {
    if warnings.is_empty() {
        return;
    }
    if verbose {
        for warning in warnings {
            eprintln!("  skipped: {}", warning);
        }
    } else {
        eprintln!("Skipped {} unreadable files or lines (use -v to list)", warnings.len());
    }
}
