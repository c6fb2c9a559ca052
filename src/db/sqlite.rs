use std::path::Path;

use rusqlite::Connection;

use super::DatabaseError;

/// Open a SQLite connection to the given path and run migrations.
///
/// The store is a single file, safe to copy while no write is in flight.
/// One connection, one writer — concurrency is handled by discipline, not
/// by the database.
pub fn open_database(path: &Path) -> Result<Connection, DatabaseError> {
    let conn = Connection::open(path)?;
    configure_pragmas(&conn)?;
    run_migrations(&conn)?;
    Ok(conn)
}

/// Open an in-memory database (for testing).
pub fn open_memory_database() -> Result<Connection, DatabaseError> {
    let conn = Connection::open_in_memory()?;
    configure_pragmas(&conn)?;
    run_migrations(&conn)?;
    Ok(conn)
}

fn configure_pragmas(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "PRAGMA journal_mode=DELETE;
         PRAGMA foreign_keys=ON;",
    )?;
    Ok(())
}

/// Run all pending migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    let current_version = get_current_version(conn);

    let migrations: Vec<(i64, &str)> = vec![(
        1,
        include_str!("../../resources/migrations/001_initial.sql"),
    )];

    for (version, sql) in migrations {
        if version > current_version {
            tracing::info!("Running migration v{version}");
            conn.execute_batch(sql)
                .map_err(|e| DatabaseError::MigrationFailed {
                    version,
                    reason: e.to_string(),
                })?;
        }
    }

    Ok(())
}

/// Get the current schema version (0 if no schema exists yet).
fn get_current_version(conn: &Connection) -> i64 {
    conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
        row.get::<_, i64>(0)
    })
    .unwrap_or(0)
}

/// Count tables in the database (for verification).
pub fn count_tables(conn: &Connection) -> Result<i64, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
        [],
        |row| row.get::<_, i64>(0),
    )?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_initializes_all_tables() {
        let conn = open_memory_database().unwrap();
        // sources + rules + extraction_stats + correction_audit + schema_version
        let count = count_tables(&conn).unwrap();
        assert!(count >= 5, "Expected at least 5 tables, got {count}");
    }

    #[test]
    fn schema_version_is_current() {
        let conn = open_memory_database().unwrap();
        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(version, 1);
    }

    #[test]
    fn migration_idempotent() {
        let conn = open_memory_database().unwrap();
        assert!(run_migrations(&conn).is_ok());
    }

    #[test]
    fn foreign_keys_enabled() {
        let conn = open_memory_database().unwrap();
        let fk: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(fk, 1);
    }

    #[test]
    fn on_disk_database_reopens() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("grantha.db");

        {
            let conn = open_database(&db_path).unwrap();
            conn.execute(
                "INSERT INTO sources (title, author, authority_level, registered_at)
                 VALUES ('BPHS', NULL, 1, '2026-01-01 00:00:00.000000')",
                [],
            )
            .unwrap();
        }

        let conn = open_database(&db_path).unwrap();
        let title: String = conn
            .query_row("SELECT title FROM sources WHERE title = 'BPHS'", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(title, "BPHS");
    }

    #[test]
    fn rule_without_source_rejected_by_fk() {
        let conn = open_memory_database().unwrap();
        let result = conn.execute(
            "INSERT INTO rules (id, original_text, effects_json, polarity, tags_json,
             category, source_title, authority_level, confidence, extraction_method,
             created_at, updated_at)
             VALUES ('r1', 'text', '[]', 'neutral', '[]', 'other', 'Unregistered',
                     1, 0.5, 'basic_placement', '2026-01-01', '2026-01-01')",
            [],
        );
        assert!(result.is_err(), "FK on source_title must reject orphan rules");
    }

    #[test]
    fn authority_level_check_constraint() {
        let conn = open_memory_database().unwrap();
        let result = conn.execute(
            "INSERT INTO sources (title, author, authority_level, registered_at)
             VALUES ('Bad', NULL, 4, '2026-01-01')",
            [],
        );
        assert!(result.is_err(), "authority_level=4 must be rejected");
    }
}
