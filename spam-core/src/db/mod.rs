//! Database layer for spam
//!
//! This module provides the activation store using SQLite with:
//! - Schema migrations
//! - Append and windowed lookup for activations
//! - Aggregate reads for the stats report

pub mod repo;
pub mod schema;

pub use repo::{format_timestamp, parse_timestamp, Batch, EventStore, StoreSummary, TIMESTAMP_FORMAT};
