//! spam-catalog - build and show the component catalog
//!
//! Scans the user, project and plugin roots and writes
//! `<data_dir>/catalog.json`. With `--markdown` the existing catalog is
//! rendered instead of rebuilt.

use anyhow::{bail, Context, Result};
use clap::Parser;
use spam_core::format::render_catalog_markdown;
use spam_core::{CatalogBuilder, CatalogSnapshot, Config};

#[derive(Parser)]
#[command(name = "spam-catalog")]
#[command(about = "Build the catalog of installed skills and commands")]
#[command(version)]
struct Args {
    /// Print the existing catalog as markdown tables instead of rebuilding
    #[arg(long)]
    markdown: bool,

    /// Print the built catalog as JSON to stdout
    #[arg(long, conflicts_with = "markdown")]
    json: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load().context("failed to load configuration")?;
    let _log_guard =
        spam_core::logging::init(&config.logging).context("failed to initialize logging")?;

    let catalog_path = Config::catalog_path();

    if args.markdown {
        if !catalog_path.is_file() {
            bail!(
                "catalog not found at {}; run spam-catalog first",
                catalog_path.display()
            );
        }
        let catalog = CatalogSnapshot::load(&catalog_path)
            .with_context(|| format!("failed to read {}", catalog_path.display()))?;
        println!("{}", render_catalog_markdown(&catalog));
        return Ok(());
    }

    tracing::info!("spam-catalog starting");

    let roots = config.scan_roots();
    tracing::info!(
        claude_home = %roots.claude_home.display(),
        project_dir = ?roots.project_dir,
        plugins_dir = %roots.plugins_dir.display(),
        "Scanning roots"
    );

    let catalog = CatalogBuilder::new(roots).build();
    catalog
        .write_to(&catalog_path)
        .with_context(|| format!("failed to write {}", catalog_path.display()))?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&catalog).context("failed to serialize catalog")?
        );
        return Ok(());
    }

    println!(
        "Catalog: {} skills, {} commands",
        catalog.skills.len(),
        catalog.commands.len()
    );
    println!("Written to {}", catalog_path.display());

    Ok(())
}
