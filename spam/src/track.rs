//! spam-track - hook entry point
//!
//! Reads one hook payload from stdin, detects an activation against the
//! catalog and appends it to the activation store.
//!
//! The host waits on this process, so it never fails: every error is logged
//! at debug level and the exit code is always 0.

use std::io::Read;

use anyhow::{Context, Result};
use clap::Parser;
use spam_core::{detect, CatalogSnapshot, Config, EventStore, HookEvent};

#[derive(Parser)]
#[command(name = "spam-track")]
#[command(about = "Record a skill or command activation from a hook payload on stdin")]
#[command(version)]
struct Args {
    /// Hook event name (e.g. UserPromptSubmit, PreToolUse)
    #[arg(long)]
    event: Option<String>,
}

fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            // --help and --version still print; bad arguments are ignored
            if !e.use_stderr() {
                let _ = e.print();
            }
            return;
        }
    };

    let config = Config::load().unwrap_or_default();
    let _log_guard = spam_core::logging::init(&config.logging).ok();

    match run(&config, args.event) {
        Ok(Some(id)) => tracing::debug!(id, "Hook event recorded"),
        Ok(None) => tracing::debug!("Hook event matched nothing"),
        Err(e) => tracing::debug!(error = %format!("{e:#}"), "Hook event dropped"),
    }
}

fn run(config: &Config, event_name: Option<String>) -> Result<Option<i64>> {
    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .context("failed to read stdin")?;

    let mut event = HookEvent::from_json(&input).context("failed to parse hook payload")?;
    if let Some(name) = event_name {
        event = event.with_event_override(name);
    }

    let catalog = CatalogSnapshot::load_or_empty(&Config::catalog_path());
    let Some(activation) = detect(&event, &catalog) else {
        return Ok(None);
    };

    let store = EventStore::open(&Config::database_path(), &config.store)
        .context("failed to open activation store")?;
    let id = store.record(&activation).context("failed to record activation")?;
    Ok(Some(id))
}
