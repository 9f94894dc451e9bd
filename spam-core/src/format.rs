//! Text rendering for reports.

use crate::catalog::CatalogSnapshot;
use crate::stats::{ComponentUsage, StatsReport};
use crate::types::DetectionMethod;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::Path;

/// Format a timestamp as relative time (e.g., "2m ago").
pub fn format_relative_time(ts: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let duration = now.signed_duration_since(ts);

    if duration.num_seconds() < 0 {
        "just now".to_string()
    } else if duration.num_seconds() < 60 {
        format!("{}s ago", duration.num_seconds())
    } else if duration.num_minutes() < 60 {
        format!("{}m ago", duration.num_minutes())
    } else if duration.num_hours() < 24 {
        format!("{}h ago", duration.num_hours())
    } else if duration.num_days() < 7 {
        format!("{}d ago", duration.num_days())
    } else {
        ts.format("%b %d").to_string()
    }
}

// ============================================
// Stats
// ============================================

struct Column {
    title: &'static str,
    width: usize,
}

const STATS_COLUMNS: [Column; 7] = [
    Column { title: "Component", width: 25 },
    Column { title: "Type", width: 10 },
    Column { title: "Today", width: 8 },
    Column { title: "Weekly", width: 8 },
    Column { title: "Monthly", width: 9 },
    Column { title: "Yearly", width: 8 },
    Column { title: "All-Time", width: 10 },
];

/// Box-drawn table of per-component usage, or `(no data)` when empty.
pub fn render_stats_table(rows: &[ComponentUsage]) -> String {
    if rows.is_empty() {
        return "(no data)".to_string();
    }

    let header = STATS_COLUMNS
        .iter()
        .map(|c| format!("{:^width$}", c.title, width = c.width))
        .collect::<Vec<_>>()
        .join(" │ ");
    let rule = "─".repeat(header.chars().count() + 2);

    let mut lines = vec![
        format!("┌{}┐", rule),
        format!("│ {} │", header),
        format!("├{}┤", rule),
    ];

    for row in rows {
        let w = |i: usize| STATS_COLUMNS[i].width;
        let counts = &row.counts;
        lines.push(format!(
            "│ {:<w0$} │ {:<w1$} │ {:>w2$} │ {:>w3$} │ {:>w4$} │ {:>w5$} │ {:>w6$} │",
            row.name,
            row.kind.as_str(),
            counts.today,
            counts.weekly,
            counts.monthly,
            counts.yearly,
            counts.all_time,
            w0 = w(0),
            w1 = w(1),
            w2 = w(2),
            w3 = w(3),
            w4 = w(4),
            w5 = w(5),
            w6 = w(6),
        ));
    }

    lines.push(format!("└{}┘", rule));
    lines.join("\n")
}

/// `Detection methods: 3 tool_call, 1 transcript`, or `None` for an empty store.
pub fn render_detection_methods(totals: &[(DetectionMethod, i64)]) -> Option<String> {
    if totals.is_empty() {
        return None;
    }
    let parts = totals
        .iter()
        .map(|(method, count)| format!("{} {}", count, method))
        .collect::<Vec<_>>()
        .join(", ");
    Some(format!("Detection methods: {}", parts))
}

/// Complete plain-text stats report.
pub fn render_stats_report(report: &StatsReport, db_path: &Path) -> String {
    let mut out = vec![
        "SPAM: Skill & Plugin Activations Monitor".to_string(),
        "=".repeat(40),
        String::new(),
        format!(
            "Catalog: {} skills, {} commands",
            report.catalog_skills, report.catalog_commands
        ),
        format!("Database: {} ({} events)", db_path.display(), report.total_events),
    ];
    if let Some(latest) = report.latest {
        out.push(format!(
            "Latest activation: {} ({})",
            latest.format("%Y-%m-%dT%H:%M:%S"),
            format_relative_time(latest, report.generated_at)
        ));
    }
    out.push(String::new());
    out.push(render_stats_table(&report.components));
    out.push(String::new());
    if let Some(methods) = render_detection_methods(&report.detection_methods) {
        out.push(methods);
    }
    out.join("\n")
}

/// Message shown before any activation has been recorded.
pub fn render_no_data() -> String {
    [
        "SPAM: Skill & Plugin Activations Monitor",
        "=".repeat(40).as_str(),
        "",
        "No activation data collected yet.",
        "",
        "To start tracking:",
        "1. Install the spam hooks",
        "2. Use any skill or command",
        "3. Run spam-stats again",
    ]
    .join("\n")
}

// ============================================
// Catalog
// ============================================

/// Markdown listing of the catalog, one table per source.
pub fn render_catalog_markdown(catalog: &CatalogSnapshot) -> String {
    let mut by_source: BTreeMap<&str, Vec<_>> = BTreeMap::new();
    for component in catalog.merged() {
        by_source.entry(component.source.as_str()).or_default().push(component);
    }

    let mut lines = vec![
        "# SPAM: Installed Skills & Commands".to_string(),
        String::new(),
        format!("_Generated: {}_", catalog.generated_at.format("%Y-%m-%dT%H:%M:%S")),
    ];

    let mut total = 0;
    for (source, items) in by_source.iter_mut() {
        items.sort_by(|a, b| a.name.cmp(&b.name));
        total += items.len();

        lines.push(String::new());
        lines.push(format!("## {}", source));
        lines.push(String::new());
        lines.push("| Name | Type | Scope | Lifecycle | Model |".to_string());
        lines.push("|------|------|-------|-----------|-------|".to_string());
        for item in items.iter() {
            lines.push(format!(
                "| {} | {} | {} | {} | {} |",
                item.name,
                item.kind,
                item.scope,
                item.lifecycle,
                item.model.as_deref().unwrap_or_default()
            ));
        }
    }

    lines.push(String::new());
    lines.push(format!(
        "**Total:** {} entries across {} sources",
        total,
        by_source.len()
    ));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Component, ComponentKind, Lifecycle, UsageCounts};
    use chrono::{Duration, TimeZone};
    use std::path::PathBuf;

    #[test]
    fn test_format_relative_time() {
        let now = Utc.with_ymd_and_hms(2026, 5, 20, 12, 0, 0).unwrap();
        assert_eq!(format_relative_time(now + Duration::seconds(3), now), "just now");
        assert_eq!(format_relative_time(now - Duration::seconds(42), now), "42s ago");
        assert_eq!(format_relative_time(now - Duration::minutes(5), now), "5m ago");
        assert_eq!(format_relative_time(now - Duration::hours(3), now), "3h ago");
        assert_eq!(format_relative_time(now - Duration::days(2), now), "2d ago");
        assert_eq!(format_relative_time(now - Duration::days(30), now), "Apr 20");
    }

    #[test]
    fn test_stats_table_layout() {
        let rows = vec![ComponentUsage {
            name: "alpha".to_string(),
            kind: ComponentKind::Skill,
            counts: UsageCounts {
                today: 1,
                weekly: 2,
                monthly: 3,
                yearly: 4,
                all_time: 12,
            },
        }];

        let table = render_stats_table(&rows);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 5);

        // Every line is the same display width
        let width = lines[0].chars().count();
        assert!(lines.iter().all(|l| l.chars().count() == width));

        assert!(lines[1].contains("Component"));
        assert!(lines[3].starts_with("│ alpha "));
        assert!(lines[3].ends_with("        12 │"));
    }

    #[test]
    fn test_stats_table_empty() {
        assert_eq!(render_stats_table(&[]), "(no data)");
    }

    #[test]
    fn test_detection_methods_line() {
        assert_eq!(render_detection_methods(&[]), None);
        assert_eq!(
            render_detection_methods(&[(DetectionMethod::ToolCall, 3), (DetectionMethod::Transcript, 1)]),
            Some("Detection methods: 3 tool_call, 1 transcript".to_string())
        );
    }

    #[test]
    fn test_catalog_markdown_groups_by_source() {
        let component = |name: &str, source: &str, kind| Component {
            name: name.to_string(),
            kind,
            source: source.to_string(),
            scope: "user".to_string(),
            lifecycle: Lifecycle::Active,
            model: Some("haiku".to_string()).filter(|_| name == "zeta"),
            description: None,
            definition_path: PathBuf::new(),
            activation_pattern: None,
            script_path: None,
        };
        let catalog = CatalogSnapshot {
            generated_at: Utc.with_ymd_and_hms(2026, 1, 31, 10, 0, 0).unwrap(),
            skills: vec![
                component("zeta", "user", ComponentKind::Skill),
                component("alpha", "plugin:tools", ComponentKind::Skill),
            ],
            commands: vec![component("beta", "user", ComponentKind::Command)],
        };

        let md = render_catalog_markdown(&catalog);
        assert!(md.contains("_Generated: 2026-01-31T10:00:00_"));

        let plugin_at = md.find("## plugin:tools").unwrap();
        let user_at = md.find("## user").unwrap();
        assert!(plugin_at < user_at);

        let beta_at = md.find("| beta | command | user | active |  |").unwrap();
        let zeta_at = md.find("| zeta | skill | user | active | haiku |").unwrap();
        assert!(beta_at < zeta_at);
        assert!(md.ends_with("**Total:** 3 entries across 2 sources"));
    }
}
