//! Database schema and migrations
//!
//! Uses SQLite with embedded migrations managed via PRAGMA user_version.
//! Every statement is `IF NOT EXISTS` so stores created by earlier trackers
//! (which never set `user_version`) migrate cleanly.

use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// SQL migrations, indexed by version number
const MIGRATIONS: &[&str] = &[
    // Version 1: activation log
    r#"
    CREATE TABLE IF NOT EXISTS activations (
        id                INTEGER PRIMARY KEY AUTOINCREMENT,
        component_name    TEXT NOT NULL,
        component_type    TEXT NOT NULL
                          CHECK (component_type IN ('skill', 'command')),
        detection_method  TEXT NOT NULL
                          CHECK (detection_method IN ('tool_call', 'prompt_match', 'bash_match', 'transcript')),
        invoked_at        TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%f', 'now'))
    );

    CREATE INDEX IF NOT EXISTS idx_activations_time
        ON activations (invoked_at);

    CREATE INDEX IF NOT EXISTS idx_activations_component
        ON activations (component_name, component_type);
    "#,
];

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> crate::error::Result<()> {
    let current_version: i32 = conn
        .query_row("PRAGMA user_version", [], |r| r.get(0))
        .unwrap_or(0);

    tracing::debug!(
        current_version,
        target_version = SCHEMA_VERSION,
        "Checking database migrations"
    );

    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let version = (i + 1) as i32;
        if version > current_version {
            tracing::info!(version, "Running migration");
            conn.execute_batch(migration)?;
            conn.execute_batch(&format!("PRAGMA user_version = {}", version))?;
        }
    }

    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> crate::error::Result<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let version = get_schema_version(&conn).unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn test_tables_and_indexes_created() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        for (kind, name) in [
            ("table", "activations"),
            ("index", "idx_activations_time"),
            ("index", "idx_activations_component"),
        ] {
            let exists: i32 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = ?1 AND name = ?2",
                    [kind, name],
                    |r| r.get(0),
                )
                .unwrap();
            assert_eq!(exists, 1, "{} {} should exist", kind, name);
        }
    }

    #[test]
    fn test_adopts_unversioned_store() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE activations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                component_name TEXT NOT NULL,
                component_type TEXT NOT NULL,
                detection_method TEXT NOT NULL,
                invoked_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%f', 'now'))
            );
            INSERT INTO activations (component_name, component_type, detection_method)
                VALUES ('alpha', 'skill', 'tool_call');",
        )
        .unwrap();

        run_migrations(&conn).unwrap();

        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM activations", [], |r| r.get(0))
            .unwrap();
        assert_eq!(rows, 1);
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_check_constraints() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        let bad_type = conn.execute(
            "INSERT INTO activations (component_name, component_type, detection_method)
             VALUES ('x', 'agent', 'tool_call')",
            [],
        );
        assert!(bad_type.is_err());

        let bad_method = conn.execute(
            "INSERT INTO activations (component_name, component_type, detection_method)
             VALUES ('x', 'skill', 'guess')",
            [],
        );
        assert!(bad_method.is_err());
    }
}
