//! Transcript reconciliation
//!
//! Hooks can miss activations (hook not installed yet, crashed, host
//! upgraded). Session transcripts record every Skill tool call, so a batch
//! pass over them backfills whatever the hooks missed.
//!
//! Two line shapes are recognized:
//!
//! ```text
//! {"type": "tool_use", "name": "Skill", "input": {"skill": "pdf"}, "timestamp": "..."}
//! {"type": "assistant", "timestamp": "...",
//!  "message": {"content": [{"type": "tool_use", "name": "Skill", "input": {"skill": "pdf"}}]}}
//! ```

use crate::config::StoreConfig;
use crate::db::{parse_timestamp, EventStore};
use crate::error::Result;
use crate::types::{Activation, ComponentKind, DetectionMethod};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// A hook record this many seconds from a transcript event is the same activation.
pub const DEDUP_WINDOW_SECS: i64 = 1;

const SKILL_TOOL: &str = "Skill";

/// One Skill invocation found in a transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEvent {
    pub skill: String,
    pub timestamp: DateTime<Utc>,
    pub source: PathBuf,
}

/// What a reconciliation pass found and wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub files_scanned: usize,
    pub events_found: usize,
    pub events_backfilled: usize,
    /// Unreadable files and unparseable lines
    pub warnings: Vec<String>,
}

/// Result of [`Reconciler::run`]. Missing inputs are outcomes, not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    MissingDatabase(PathBuf),
    MissingTranscripts(PathBuf),
    NoEvents(ReconcileReport),
    Completed(ReconcileReport),
}

/// Events extracted from a transcript tree.
#[derive(Debug, Default)]
pub struct Extraction {
    pub events: Vec<TranscriptEvent>,
    pub files_scanned: usize,
    pub warnings: Vec<String>,
}

// ============================================
// Transcript line shapes
// ============================================

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct TranscriptLine {
    #[serde(rename = "type")]
    record_type: Option<String>,
    name: Option<String>,
    input: Value,
    timestamp: Option<String>,
    message: Option<TranscriptMessage>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct TranscriptMessage {
    content: Value,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "tool_use")]
    ToolUse {
        name: String,
        #[serde(default)]
        input: Value,
    },
    #[serde(other)]
    Unknown,
}

fn skill_from_input(input: &Value) -> Option<String> {
    input
        .get("skill")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl TranscriptLine {
    /// Skill names invoked by this line, in order.
    fn skills(&self) -> Vec<String> {
        match self.record_type.as_deref() {
            Some("tool_use") if self.name.as_deref() == Some(SKILL_TOOL) => {
                skill_from_input(&self.input).into_iter().collect()
            }
            Some("assistant") => {
                let Some(Value::Array(blocks)) = self.message.as_ref().map(|m| &m.content) else {
                    return Vec::new();
                };
                blocks
                    .iter()
                    .filter_map(|block| serde_json::from_value::<ContentBlock>(block.clone()).ok())
                    .filter_map(|block| match block {
                        ContentBlock::ToolUse { name, input } if name == SKILL_TOOL => {
                            skill_from_input(&input)
                        }
                        _ => None,
                    })
                    .collect()
            }
            _ => Vec::new(),
        }
    }
}

// ============================================
// Extraction
// ============================================

/// Every `*.jsonl` file beneath `root`, sorted.
fn transcript_files(root: &Path) -> Result<Vec<PathBuf>> {
    let pattern = format!("{}/**/*.jsonl", glob::Pattern::escape(&root.to_string_lossy()));
    let mut files: Vec<PathBuf> = glob::glob(&pattern)?
        .flatten()
        .filter(|p| p.is_file())
        .collect();
    files.sort();
    Ok(files)
}

/// Pull Skill invocations from every transcript beneath `root`.
///
/// Lines without a usable timestamp are stamped with `now`.
pub fn extract_skill_events(root: &Path, now: DateTime<Utc>) -> Result<Extraction> {
    let mut extraction = Extraction::default();
    if !root.is_dir() {
        return Ok(extraction);
    }

    for file in transcript_files(root)? {
        let bytes = match std::fs::read(&file) {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(path = %file.display(), error = %e, "Unreadable transcript");
                extraction
                    .warnings
                    .push(format!("{}: read error: {}", file.display(), e));
                continue;
            }
        };
        extraction.files_scanned += 1;

        let text = String::from_utf8_lossy(&bytes);
        for (idx, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }

            let raw: Value = match serde_json::from_str(line) {
                Ok(v) => v,
                Err(e) => {
                    extraction.warnings.push(format!(
                        "{}:{}: JSON parse error: {}",
                        file.display(),
                        idx + 1,
                        e
                    ));
                    continue;
                }
            };

            // Records with unexpected field types carry nothing we recognize
            let Ok(record) = serde_json::from_value::<TranscriptLine>(raw) else {
                continue;
            };

            let skills = record.skills();
            if skills.is_empty() {
                continue;
            }

            let timestamp = record
                .timestamp
                .as_deref()
                .and_then(parse_timestamp)
                .unwrap_or(now);
            extraction
                .events
                .extend(skills.into_iter().map(|skill| TranscriptEvent {
                    skill,
                    timestamp,
                    source: file.clone(),
                }));
        }
    }

    tracing::debug!(
        files = extraction.files_scanned,
        events = extraction.events.len(),
        warnings = extraction.warnings.len(),
        "Transcript extraction complete"
    );
    Ok(extraction)
}

// ============================================
// Backfill
// ============================================

/// Insert each event lacking a skill record within [`DEDUP_WINDOW_SECS`].
///
/// Runs in one transaction; events see rows inserted earlier in the same pass.
pub fn backfill(store: &EventStore, events: &[TranscriptEvent]) -> Result<usize> {
    let window = Duration::seconds(DEDUP_WINDOW_SECS);
    store.batch(|batch| {
        let mut inserted = 0;
        for event in events {
            if batch.has_activation_near(&event.skill, ComponentKind::Skill, event.timestamp, window)? {
                continue;
            }
            let activation = Activation::new(&event.skill, ComponentKind::Skill, DetectionMethod::Transcript);
            batch.record_at(&activation, event.timestamp)?;
            inserted += 1;
        }
        Ok(inserted)
    })
}

/// Extract and backfill in one call.
pub fn reconcile(store: &EventStore, transcript_root: &Path) -> Result<ReconcileReport> {
    let extraction = extract_skill_events(transcript_root, Utc::now())?;
    let events_backfilled = backfill(store, &extraction.events)?;

    let report = ReconcileReport {
        files_scanned: extraction.files_scanned,
        events_found: extraction.events.len(),
        events_backfilled,
        warnings: extraction.warnings,
    };

    tracing::info!(
        root = %transcript_root.display(),
        files = report.files_scanned,
        found = report.events_found,
        backfilled = report.events_backfilled,
        warnings = report.warnings.len(),
        "Reconciliation complete"
    );
    Ok(report)
}

/// Reconciliation against on-disk paths, reporting missing inputs as outcomes.
pub struct Reconciler<'a> {
    db_path: &'a Path,
    transcript_root: &'a Path,
    store_config: &'a StoreConfig,
}

impl<'a> Reconciler<'a> {
    pub fn new(db_path: &'a Path, transcript_root: &'a Path, store_config: &'a StoreConfig) -> Self {
        Self {
            db_path,
            transcript_root,
            store_config,
        }
    }

    pub fn run(&self) -> Result<ReconcileOutcome> {
        // Never create a store just to reconcile into it
        if !self.db_path.exists() {
            return Ok(ReconcileOutcome::MissingDatabase(self.db_path.to_path_buf()));
        }
        if !self.transcript_root.is_dir() {
            return Ok(ReconcileOutcome::MissingTranscripts(
                self.transcript_root.to_path_buf(),
            ));
        }

        let extraction = extract_skill_events(self.transcript_root, Utc::now())?;
        if extraction.events.is_empty() {
            return Ok(ReconcileOutcome::NoEvents(ReconcileReport {
                files_scanned: extraction.files_scanned,
                warnings: extraction.warnings,
                ..Default::default()
            }));
        }

        let store = EventStore::open(self.db_path, self.store_config)?;
        let events_backfilled = backfill(&store, &extraction.events)?;

        let report = ReconcileReport {
            files_scanned: extraction.files_scanned,
            events_found: extraction.events.len(),
            events_backfilled,
            warnings: extraction.warnings,
        };
        tracing::info!(
            db = %self.db_path.display(),
            found = report.events_found,
            backfilled = report.events_backfilled,
            "Reconciliation complete"
        );
        Ok(ReconcileOutcome::Completed(report))
    }
}
