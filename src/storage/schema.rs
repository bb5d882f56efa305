//! Database schema definitions and migration
//!
//! Three tables back the store: fingerprint metadata, the job/build usage
//! relation, and the facet relation. Migration is idempotent: each table is
//! created only when the dialect's check-table-exists query says it is
//! absent. DROP and TRUNCATE are never issued, so repeating a migration
//! against a populated database preserves every row.

use super::queries::{self, Dialect, Query};
use crate::Result;
use rusqlite::Connection;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

/// Process-wide flag: set once the schema has been migrated successfully.
/// Left unset on failure so a later connection retries the DDL.
static MIGRATED: AtomicBool = AtomicBool::new(false);

/// SQL to create the fingerprint metadata table
pub const CREATE_FINGERPRINT_TABLE_SQLITE: &str = r#"
CREATE TABLE fingerprint (
    id TEXT NOT NULL,
    instance_id TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    filename TEXT NOT NULL,
    original_job_name TEXT,
    original_job_build_number INTEGER,
    PRIMARY KEY (id, instance_id)
)
"#;

/// SQL to create the usage relation table
pub const CREATE_JOB_BUILD_RELATION_TABLE_SQLITE: &str = r#"
CREATE TABLE fingerprint_job_build_relation (
    fingerprint_id TEXT NOT NULL,
    instance_id TEXT NOT NULL,
    job_name TEXT NOT NULL,
    build_number INTEGER NOT NULL,
    UNIQUE (fingerprint_id, instance_id, job_name, build_number)
)
"#;

/// SQL to create the facet relation table
pub const CREATE_FACET_RELATION_TABLE_SQLITE: &str = r#"
CREATE TABLE fingerprint_facet_relation (
    fingerprint_id TEXT NOT NULL,
    instance_id TEXT NOT NULL,
    facet_name TEXT NOT NULL,
    facet_entry TEXT NOT NULL,
    deletion_blocked INTEGER NOT NULL DEFAULT 0
)
"#;

pub const CREATE_FINGERPRINT_TABLE_POSTGRES: &str = r#"
CREATE TABLE fingerprint (
    id VARCHAR(256) NOT NULL,
    instance_id VARCHAR(256) NOT NULL,
    timestamp TIMESTAMPTZ NOT NULL,
    filename TEXT NOT NULL,
    original_job_name TEXT,
    original_job_build_number INTEGER,
    PRIMARY KEY (id, instance_id)
)
"#;

pub const CREATE_JOB_BUILD_RELATION_TABLE_POSTGRES: &str = r#"
CREATE TABLE fingerprint_job_build_relation (
    fingerprint_id VARCHAR(256) NOT NULL,
    instance_id VARCHAR(256) NOT NULL,
    job_name TEXT NOT NULL,
    build_number INTEGER NOT NULL,
    UNIQUE (fingerprint_id, instance_id, job_name, build_number)
)
"#;

pub const CREATE_FACET_RELATION_TABLE_POSTGRES: &str = r#"
CREATE TABLE fingerprint_facet_relation (
    fingerprint_id VARCHAR(256) NOT NULL,
    instance_id VARCHAR(256) NOT NULL,
    facet_name TEXT NOT NULL,
    facet_entry TEXT NOT NULL,
    deletion_blocked BOOLEAN NOT NULL DEFAULT FALSE
)
"#;

/// Check query and creation DDL for each required table
fn table_statements(dialect: Dialect) -> [(Query, &'static str); 3] {
    match dialect {
        Dialect::Sqlite => [
            (Query::CheckFingerprintTableExists, CREATE_FINGERPRINT_TABLE_SQLITE),
            (
                Query::CheckJobBuildRelationTableExists,
                CREATE_JOB_BUILD_RELATION_TABLE_SQLITE,
            ),
            (
                Query::CheckFacetRelationTableExists,
                CREATE_FACET_RELATION_TABLE_SQLITE,
            ),
        ],
        Dialect::Postgres => [
            (Query::CheckFingerprintTableExists, CREATE_FINGERPRINT_TABLE_POSTGRES),
            (
                Query::CheckJobBuildRelationTableExists,
                CREATE_JOB_BUILD_RELATION_TABLE_POSTGRES,
            ),
            (
                Query::CheckFacetRelationTableExists,
                CREATE_FACET_RELATION_TABLE_POSTGRES,
            ),
        ],
    }
}

/// Create any of the three tables that do not exist yet.
///
/// Safe to call repeatedly and regardless of the process-wide flag; existing
/// tables and their rows are left untouched.
pub fn migrate_schema(conn: &Connection, dialect: Dialect) -> Result<()> {
    for (check, ddl) in table_statements(dialect) {
        let exists: bool =
            conn.query_row(queries::get_query(dialect, check)?, [], |row| row.get(0))?;
        if !exists {
            conn.execute(ddl, [])?;
            debug!(dialect = %dialect, query = check.key(), "created missing table");
        }
    }
    MIGRATED.store(true, Ordering::SeqCst);
    info!(dialect = %dialect, "fingerprint schema migrated");
    Ok(())
}

/// Migration hook for freshly established connections: a no-op once the
/// process-wide flag is set, so migration races only on the very first
/// connection per process, not on every reconnect.
pub fn ensure_migrated(conn: &Connection, dialect: Dialect) -> Result<()> {
    if MIGRATED.load(Ordering::SeqCst) {
        return Ok(());
    }
    migrate_schema(conn, dialect)
}

/// Whether the process-wide migration flag is set
pub fn is_migrated() -> bool {
    MIGRATED.load(Ordering::SeqCst)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_exists(conn: &Connection, check: Query) -> bool {
        conn.query_row(queries::get_query(Dialect::Sqlite, check).unwrap(), [], |row| {
            row.get(0)
        })
        .unwrap()
    }

    #[test]
    fn test_migration_creates_all_tables() {
        let conn = Connection::open_in_memory().unwrap();
        migrate_schema(&conn, Dialect::Sqlite).unwrap();

        assert!(table_exists(&conn, Query::CheckFingerprintTableExists));
        assert!(table_exists(&conn, Query::CheckJobBuildRelationTableExists));
        assert!(table_exists(&conn, Query::CheckFacetRelationTableExists));
        assert!(is_migrated());
    }

    #[test]
    fn test_migration_is_idempotent_and_preserves_rows() {
        let conn = Connection::open_in_memory().unwrap();
        migrate_schema(&conn, Dialect::Sqlite).unwrap();

        conn.execute(
            "INSERT INTO fingerprint (id, instance_id, timestamp, filename) VALUES ('a', 'i', 't', 'f')",
            [],
        )
        .unwrap();

        migrate_schema(&conn, Dialect::Sqlite).unwrap();
        migrate_schema(&conn, Dialect::Sqlite).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM fingerprint", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }
}
