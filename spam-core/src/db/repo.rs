//! Activation store
//!
//! Append-only log of activations. Rows are never updated or deleted.

use crate::config::StoreConfig;
use crate::error::Result;
use crate::types::*;
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use rusqlite::{params, Connection, Row, TransactionBehavior};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Storage format for `invoked_at`, matching SQLite's `strftime('%Y-%m-%dT%H:%M:%f')`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

/// Format a timestamp the way the store writes it.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a stored timestamp. Accepts the storage format with any fraction
/// precision, and RFC 3339.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|n| n.and_utc())
        .or_else(|_| DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc)))
        .ok()
}

/// Aggregate facts about the whole store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreSummary {
    pub total_events: i64,
    pub earliest: Option<DateTime<Utc>>,
    pub latest: Option<DateTime<Utc>>,
}

/// Activation store over a single SQLite connection
pub struct EventStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl EventStore {
    /// Open or create a store at the given path and bring its schema up to date
    pub fn open(path: &Path, config: &StoreConfig) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // Busy timeout first so the WAL switch itself waits on other writers
        conn.busy_timeout(config.busy_timeout())?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;
        super::schema::run_migrations(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        })
    }

    /// Open an in-memory store (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        super::schema::run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
        })
    }

    /// Backing file, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Get the underlying connection (for advanced use)
    pub fn connection(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap()
    }

    // ============================================
    // Writes
    // ============================================

    /// Append an activation stamped by SQLite's clock.
    pub fn record(&self, activation: &Activation) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO activations (component_name, component_type, detection_method)
            VALUES (?1, ?2, ?3)
            "#,
            params![
                activation.name,
                activation.kind.as_str(),
                activation.method.as_str(),
            ],
        )?;
        let id = conn.last_insert_rowid();

        tracing::info!(
            id,
            component = %activation.name,
            component_type = %activation.kind,
            method = %activation.method,
            "Activation recorded"
        );
        Ok(id)
    }

    /// Append an activation with a caller-supplied timestamp.
    pub fn record_at(&self, activation: &Activation, at: DateTime<Utc>) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        insert_at(&conn, activation, at)
    }

    /// Whether a record for `(name, kind)` exists within `window` of `at`,
    /// inclusive at both ends.
    pub fn has_activation_near(
        &self,
        name: &str,
        kind: ComponentKind,
        at: DateTime<Utc>,
        window: Duration,
    ) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        exists_near(&conn, name, kind, at, window)
    }

    /// Run `f` inside one transaction. Nothing is committed if it fails.
    ///
    /// The write lock is taken up front, so reads inside `f` never race a
    /// commit from another process.
    pub fn batch<T>(&self, f: impl FnOnce(&Batch<'_>) -> Result<T>) -> Result<T> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let out = f(&Batch { conn: &tx })?;
        tx.commit()?;
        Ok(out)
    }

    // ============================================
    // Reads
    // ============================================

    /// Total record count with earliest and latest timestamps.
    pub fn summary(&self) -> Result<StoreSummary> {
        let conn = self.conn.lock().unwrap();
        let (total_events, earliest, latest): (i64, Option<String>, Option<String>) = conn
            .query_row(
                "SELECT COUNT(*), MIN(invoked_at), MAX(invoked_at) FROM activations",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )?;

        Ok(StoreSummary {
            total_events,
            earliest: earliest.as_deref().and_then(parse_timestamp),
            latest: latest.as_deref().and_then(parse_timestamp),
        })
    }

    /// Per-`(name, type)` counts over each reporting horizon, relative to `now`.
    ///
    /// Only components with at least one record appear.
    pub fn component_counts(
        &self,
        now: DateTime<Utc>,
    ) -> Result<HashMap<(String, ComponentKind), UsageCounts>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            r#"
            SELECT component_name,
                   component_type,
                   SUM(CASE WHEN substr(invoked_at, 1, 10) = ?1 THEN 1 ELSE 0 END),
                   SUM(CASE WHEN invoked_at >= ?2 THEN 1 ELSE 0 END),
                   SUM(CASE WHEN invoked_at >= ?3 THEN 1 ELSE 0 END),
                   SUM(CASE WHEN invoked_at >= ?4 THEN 1 ELSE 0 END),
                   COUNT(*)
            FROM activations
            GROUP BY component_name, component_type
            "#,
        )?;

        let rows = stmt.query_map(
            params![
                now.format("%Y-%m-%d").to_string(),
                format_timestamp(now - Duration::days(7)),
                format_timestamp(now - Duration::days(30)),
                format_timestamp(now - Duration::days(365)),
            ],
            |row| {
                let name: String = row.get(0)?;
                let kind: String = row.get(1)?;
                let counts = UsageCounts {
                    today: row.get(2)?,
                    weekly: row.get(3)?,
                    monthly: row.get(4)?,
                    yearly: row.get(5)?,
                    all_time: row.get(6)?,
                };
                Ok((name, kind, counts))
            },
        )?;

        let mut counts = HashMap::new();
        for row in rows {
            let (name, kind, usage) = row?;
            match kind.parse::<ComponentKind>() {
                Ok(kind) => {
                    counts.insert((name, kind), usage);
                }
                Err(e) => tracing::warn!(component = %name, error = %e, "Skipping unknown component type"),
            }
        }
        Ok(counts)
    }

    /// Record count per detection method across the whole store, largest first.
    pub fn detection_method_totals(&self) -> Result<Vec<(DetectionMethod, i64)>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            r#"
            SELECT detection_method, COUNT(*) AS c
            FROM activations
            GROUP BY detection_method
            ORDER BY c DESC, detection_method ASC
            "#,
        )?;

        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;

        let mut totals = Vec::new();
        for row in rows {
            let (method, count) = row?;
            if let Ok(method) = method.parse::<DetectionMethod>() {
                totals.push((method, count));
            }
        }
        Ok(totals)
    }

    /// Most recent records, newest first.
    pub fn recent(&self, limit: usize) -> Result<Vec<ActivationRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            r#"
            SELECT id, component_name, component_type, detection_method, invoked_at
            FROM activations
            ORDER BY invoked_at DESC, id DESC
            LIMIT ?1
            "#,
        )?;

        let records = stmt
            .query_map([i64::try_from(limit).unwrap_or(i64::MAX)], Self::row_to_record)?
            .filter_map(|r| r.ok())
            .flatten()
            .collect();
        Ok(records)
    }

    fn row_to_record(row: &Row) -> rusqlite::Result<Option<ActivationRecord>> {
        let kind: String = row.get("component_type")?;
        let method: String = row.get("detection_method")?;
        let invoked_at: String = row.get("invoked_at")?;

        let (Ok(component_type), Ok(detection_method)) =
            (kind.parse::<ComponentKind>(), method.parse::<DetectionMethod>())
        else {
            return Ok(None);
        };

        Ok(Some(ActivationRecord {
            id: row.get("id")?,
            component_name: row.get("component_name")?,
            component_type,
            detection_method,
            invoked_at: parse_timestamp(&invoked_at).unwrap_or_else(Utc::now),
        }))
    }
}

/// Write handle scoped to one [`EventStore::batch`] transaction.
pub struct Batch<'a> {
    conn: &'a Connection,
}

impl Batch<'_> {
    pub fn record_at(&self, activation: &Activation, at: DateTime<Utc>) -> Result<i64> {
        insert_at(self.conn, activation, at)
    }

    /// Sees rows written earlier in the same batch.
    pub fn has_activation_near(
        &self,
        name: &str,
        kind: ComponentKind,
        at: DateTime<Utc>,
        window: Duration,
    ) -> Result<bool> {
        exists_near(self.conn, name, kind, at, window)
    }
}

fn insert_at(conn: &Connection, activation: &Activation, at: DateTime<Utc>) -> Result<i64> {
    conn.execute(
        r#"
        INSERT INTO activations (component_name, component_type, detection_method, invoked_at)
        VALUES (?1, ?2, ?3, ?4)
        "#,
        params![
            activation.name,
            activation.kind.as_str(),
            activation.method.as_str(),
            format_timestamp(at),
        ],
    )?;
    let id = conn.last_insert_rowid();

    tracing::debug!(
        id,
        component = %activation.name,
        method = %activation.method,
        invoked_at = %at,
        "Activation recorded with explicit timestamp"
    );
    Ok(id)
}

fn exists_near(
    conn: &Connection,
    name: &str,
    kind: ComponentKind,
    at: DateTime<Utc>,
    window: Duration,
) -> Result<bool> {
    let found: bool = conn.query_row(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM activations
            WHERE component_name = ?1
              AND component_type = ?2
              AND invoked_at BETWEEN ?3 AND ?4
        )
        "#,
        params![
            name,
            kind.as_str(),
            format_timestamp(at - window),
            format_timestamp(at + window),
        ],
        |row| row.get(0),
    )?;
    Ok(found)
}
