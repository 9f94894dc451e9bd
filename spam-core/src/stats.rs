//! Usage statistics
//!
//! Joins the catalog against the activation store so that every installed
//! component shows up, including ones that were never used.

use crate::catalog::CatalogSnapshot;
use crate::db::{EventStore, StoreSummary};
use crate::error::Result;
use crate::types::{ComponentKind, DetectionMethod, UsageCounts};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Usage row for one catalog component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentUsage {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ComponentKind,
    #[serde(flatten)]
    pub counts: UsageCounts,
}

/// Everything the stats report prints.
#[derive(Debug, Clone, Serialize)]
pub struct StatsReport {
    pub generated_at: DateTime<Utc>,
    pub catalog_skills: usize,
    pub catalog_commands: usize,
    pub total_events: i64,
    pub earliest: Option<DateTime<Utc>>,
    pub latest: Option<DateTime<Utc>>,
    pub components: Vec<ComponentUsage>,
    pub detection_methods: Vec<(DetectionMethod, i64)>,
}

pub struct StatsEngine<'a> {
    store: &'a EventStore,
}

impl<'a> StatsEngine<'a> {
    pub fn new(store: &'a EventStore) -> Self {
        Self { store }
    }

    /// Per-component usage against the current wall clock.
    pub fn compute(&self, catalog: &CatalogSnapshot) -> Result<Vec<ComponentUsage>> {
        self.compute_at(catalog, Utc::now())
    }

    /// Per-component usage relative to `now`.
    ///
    /// One row per distinct `(name, type)` in the catalog, sorted by all-time
    /// count descending, then name, then type. Store records for components
    /// missing from the catalog are left out.
    pub fn compute_at(
        &self,
        catalog: &CatalogSnapshot,
        now: DateTime<Utc>,
    ) -> Result<Vec<ComponentUsage>> {
        let mut counts = self.store.component_counts(now)?;

        let mut rows: Vec<ComponentUsage> = catalog
            .component_keys()
            .into_iter()
            .map(|(name, kind)| {
                let counts = counts.remove(&(name.clone(), kind)).unwrap_or_default();
                ComponentUsage { name, kind, counts }
            })
            .collect();

        rows.sort_by(|a, b| {
            b.counts
                .all_time
                .cmp(&a.counts.all_time)
                .then_with(|| a.name.cmp(&b.name))
                .then_with(|| a.kind.as_str().cmp(b.kind.as_str()))
        });

        if !counts.is_empty() {
            tracing::debug!(uncataloged = counts.len(), "Store has components missing from catalog");
        }
        Ok(rows)
    }

    /// Record count per detection method over the whole store.
    pub fn detection_method_totals(&self) -> Result<Vec<(DetectionMethod, i64)>> {
        self.store.detection_method_totals()
    }

    pub fn summary(&self) -> Result<StoreSummary> {
        self.store.summary()
    }

    /// Full report relative to `now`.
    pub fn report_at(&self, catalog: &CatalogSnapshot, now: DateTime<Utc>) -> Result<StatsReport> {
        let summary = self.summary()?;
        Ok(StatsReport {
            generated_at: now,
            catalog_skills: catalog.skills.len(),
            catalog_commands: catalog.commands.len(),
            total_events: summary.total_events,
            earliest: summary.earliest,
            latest: summary.latest,
            components: self.compute_at(catalog, now)?,
            detection_methods: self.detection_method_totals()?,
        })
    }

    pub fn report(&self, catalog: &CatalogSnapshot) -> Result<StatsReport> {
        self.report_at(catalog, Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Activation, Component, Lifecycle};
    use chrono::{Duration, TimeZone};
    use std::path::PathBuf;

    fn component(name: &str, kind: ComponentKind) -> Component {
        Component {
            name: name.to_string(),
            kind,
            source: "user".to_string(),
            scope: "user".to_string(),
            lifecycle: Lifecycle::Active,
            model: None,
            description: None,
            definition_path: PathBuf::new(),
            activation_pattern: None,
            script_path: None,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_zero_count_components_are_listed() {
        let store = EventStore::open_in_memory().unwrap();
        let catalog = CatalogSnapshot {
            generated_at: now(),
            skills: vec![component("idle", ComponentKind::Skill)],
            commands: vec![component("busy", ComponentKind::Command)],
        };
        store
            .record_at(
                &Activation::new("busy", ComponentKind::Command, DetectionMethod::PromptMatch),
                now() - Duration::minutes(5),
            )
            .unwrap();
        store
            .record_at(
                &Activation::new("ghost", ComponentKind::Skill, DetectionMethod::ToolCall),
                now(),
            )
            .unwrap();

        let rows = StatsEngine::new(&store).compute_at(&catalog, now()).unwrap();
        let names: Vec<_> = rows.iter().map(|r| (r.name.as_str(), r.counts.all_time)).collect();
        assert_eq!(names, vec![("busy", 1), ("idle", 0)]);
        assert_eq!(rows[1].counts, UsageCounts::default());
    }

    #[test]
    fn test_sort_breaks_ties_by_name_then_type() {
        let store = EventStore::open_in_memory().unwrap();
        let catalog = CatalogSnapshot {
            generated_at: now(),
            skills: vec![component("b", ComponentKind::Skill), component("a", ComponentKind::Skill)],
            commands: vec![component("b", ComponentKind::Command)],
        };

        let rows = StatsEngine::new(&store).compute_at(&catalog, now()).unwrap();
        let order: Vec<_> = rows.iter().map(|r| (r.name.as_str(), r.kind)).collect();
        assert_eq!(
            order,
            vec![
                ("a", ComponentKind::Skill),
                ("b", ComponentKind::Command),
                ("b", ComponentKind::Skill),
            ]
        );
    }

    #[test]
    fn test_empty_catalog_yields_no_rows() {
        let store = EventStore::open_in_memory().unwrap();
        store
            .record(&Activation::new("x", ComponentKind::Skill, DetectionMethod::ToolCall))
            .unwrap();

        let engine = StatsEngine::new(&store);
        let report = engine.report_at(&CatalogSnapshot::empty(), now()).unwrap();
        assert!(report.components.is_empty());
        assert_eq!(report.total_events, 1);
        assert_eq!(report.detection_methods, vec![(DetectionMethod::ToolCall, 1)]);
    }

    #[test]
    fn test_usage_serializes_flat() {
        let usage = ComponentUsage {
            name: "alpha".to_string(),
            kind: ComponentKind::Skill,
            counts: UsageCounts {
                all_time: 2,
                ..Default::default()
            },
        };
        let json = serde_json::to_value(&usage).unwrap();
        assert_eq!(json["type"], "skill");
        assert_eq!(json["all_time"], 2);
        assert_eq!(json["today"], 0);
    }
}
