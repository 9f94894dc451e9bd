//! Component catalog
//!
//! The catalog is a point-in-time snapshot of every skill and command the
//! host can see, built by scanning three kinds of sources:
//!
//! | Source | Skills | Commands |
//! |--------|--------|----------|
//! | `user` | `~/.claude/skills/*/SKILL.md` | `~/.claude/commands/**/*.md` |
//! | `project` | `$CLAUDE_PROJECT_DIR/.claude/skills/...` | `$CLAUDE_PROJECT_DIR/.claude/commands/...` |
//! | `plugin:<name>` | `<plugin root>/skills/...` | `<plugin root>/commands/...` |
//!
//! The snapshot is rebuilt wholesale and written atomically; readers treat it
//! as a possibly stale view and tolerate it being absent.

mod builder;
pub mod frontmatter;
pub mod plugins;

pub use builder::{CatalogBuilder, ScanRoots};
pub use frontmatter::{read_frontmatter, Frontmatter};
pub use plugins::{PluginResolver, PluginRoot};

use crate::error::Result;
use crate::types::{Component, ComponentKind};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::Write;
use std::path::Path;

const GENERATED_AT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Immutable catalog of discovered components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    #[serde(with = "generated_at")]
    pub generated_at: DateTime<Utc>,
    #[serde(default)]
    pub skills: Vec<Component>,
    #[serde(default)]
    pub commands: Vec<Component>,
}

impl Default for CatalogSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

impl CatalogSnapshot {
    pub fn empty() -> Self {
        Self {
            generated_at: Utc::now(),
            skills: Vec::new(),
            commands: Vec::new(),
        }
    }

    /// Load a snapshot from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let mut snapshot: CatalogSnapshot = serde_json::from_str(&text)?;
        // The list a component sits in is authoritative for its kind
        snapshot.skills.iter_mut().for_each(|c| c.kind = ComponentKind::Skill);
        snapshot.commands.iter_mut().for_each(|c| c.kind = ComponentKind::Command);
        Ok(snapshot)
    }

    /// Load a snapshot, falling back to an empty one when the file is
    /// missing or unreadable.
    pub fn load_or_empty(path: &Path) -> Self {
        match Self::load(path) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "No usable catalog, using empty");
                Self::empty()
            }
        }
    }

    /// Write the snapshot wholesale, replacing any previous file atomically.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let tmp = path.with_extension(format!("json.{}.tmp", std::process::id()));
        {
            let mut file = std::fs::File::create(&tmp)?;
            serde_json::to_writer_pretty(&mut file, self)?;
            file.write_all(b"\n")?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp, path)?;

        tracing::info!(
            path = %path.display(),
            skills = self.skills.len(),
            commands = self.commands.len(),
            "Catalog written"
        );
        Ok(())
    }

    /// Distinct `(name, kind)` pairs across both lists, sorted.
    pub fn component_keys(&self) -> Vec<(String, ComponentKind)> {
        let mut keys: Vec<(String, ComponentKind)> = self
            .skills
            .iter()
            .map(|c| (c.name.clone(), ComponentKind::Skill))
            .chain(self.commands.iter().map(|c| (c.name.clone(), ComponentKind::Command)))
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        keys.sort();
        keys
    }

    /// All components, skills first, de-duplicated by `(name, source)`.
    pub fn merged(&self) -> Vec<&Component> {
        let mut seen = HashSet::new();
        self.skills
            .iter()
            .chain(self.commands.iter())
            .filter(|c| seen.insert(c.key()))
            .collect()
    }
}

/// Keep only the first component for each `(name, source)`.
pub fn dedup_by_key(components: Vec<Component>) -> Vec<Component> {
    let mut seen: HashSet<(String, String)> = HashSet::new();
    components
        .into_iter()
        .filter(|c| seen.insert((c.name.clone(), c.source.clone())))
        .collect()
}

mod generated_at {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(&ts.format(GENERATED_AT_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .or_else(|_| NaiveDateTime::parse_from_str(&raw, GENERATED_AT_FORMAT).map(|n| n.and_utc()))
            .map_err(serde::de::Error::custom)
    }
}
