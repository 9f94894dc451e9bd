//! # spam-core
//!
//! Core library for spam - a skill and command activation monitor.
//!
//! This library provides:
//! - A catalog of installed skills and commands, built from the filesystem
//! - Detection of activations from hook payloads
//! - An append-only SQLite activation store
//! - Transcript reconciliation for activations the hooks missed
//! - Usage statistics over rolling horizons
//!
//! ## Architecture
//!
//! Data flows through three stages:
//! - **Catalog:** scan user, project and plugin roots into `catalog.json`
//! - **Capture:** hook payload + catalog -> activation row
//! - **Report:** catalog left-joined against the activation log
//!
//! ## Example
//!
//! ```rust,no_run
//! use spam_core::{CatalogSnapshot, Config, EventStore, StatsEngine};
//!
//! let config = Config::load().expect("failed to load config");
//! let catalog = CatalogSnapshot::load_or_empty(&Config::catalog_path());
//!
//! let store = EventStore::open(&Config::database_path(), &config.store)
//!     .expect("failed to open database");
//! let rows = StatsEngine::new(&store).compute(&catalog).expect("stats");
//! ```

// Re-export commonly used items at the crate root
pub use catalog::{CatalogBuilder, CatalogSnapshot, PluginResolver, PluginRoot, ScanRoots};
pub use config::Config;
pub use db::{EventStore, StoreSummary};
pub use detect::{detect, HookEvent};
pub use error::{Error, Result};
pub use reconcile::{reconcile, ReconcileOutcome, ReconcileReport, Reconciler};
pub use stats::{ComponentUsage, StatsEngine, StatsReport};
pub use types::*;

// Public modules
pub mod catalog;
pub mod config;
pub mod db;
pub mod detect;
pub mod error;
pub mod format;
pub mod logging;
pub mod reconcile;
pub mod stats;
pub mod types;
