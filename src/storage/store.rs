//! Fingerprint store engine
//!
//! Orchestrates save/load/delete/readiness against the query registry,
//! connection supplier, and conversion bridge. Writes replace the whole
//! record under one transaction, so a concurrent reader observes either the
//! pre- or post-write row set, never a mix of two saves.

use super::connection::ConnectionSupplier;
use super::queries::{self, Dialect, Query};
use super::schema;
use crate::config::DatabaseConfig;
use crate::convert::{self, FacetRow, MetadataRow};
use crate::fingerprint::Fingerprint;
use crate::identity::InstanceIdentity;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

/// Relational fingerprint store, partitioned by instance identity.
///
/// All operations serialize on one internal lock: the single cached
/// connection is shared mutable state and is never used by two threads at
/// once. Writes queue rather than interleave.
pub struct SqlFingerprintStorage {
    instance_id: String,
    supplier: Mutex<ConnectionSupplier>,
}

impl SqlFingerprintStorage {
    pub fn new(config: DatabaseConfig, identity: &InstanceIdentity) -> Self {
        SqlFingerprintStorage {
            instance_id: identity.digest().to_string(),
            supplier: Mutex::new(ConnectionSupplier::new(config)),
        }
    }

    /// Partition discriminator this store writes and reads under
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Persist a fingerprint, replacing any existing record with the same id
    /// in this instance's partition. Runs as one transaction: either every
    /// row lands or none do.
    pub fn save(&self, fingerprint: &Fingerprint) -> Result<()> {
        let result = self.try_save(fingerprint);
        match &result {
            Ok(()) => debug!(id = fingerprint.id(), "saved fingerprint"),
            Err(e) => warn!(id = fingerprint.id(), error = %e, "failed to save fingerprint"),
        }
        result.map_err(|e| wrap_transaction("save", fingerprint.id(), e))
    }

    fn try_save(&self, fingerprint: &Fingerprint) -> Result<()> {
        let mut supplier = self.lock()?;
        let dialect = supplier.dialect();
        let conn = supplier.connection()?;
        let tx = conn.transaction()?;

        // Full overwrite, not merge: clear the previous record first
        delete_rows(&tx, dialect, fingerprint.id(), &self.instance_id)?;

        let original = fingerprint.original();
        tx.execute(
            queries::get_query(dialect, Query::InsertFingerprint)?,
            params![
                fingerprint.id(),
                self.instance_id,
                fingerprint.timestamp().to_rfc3339(),
                fingerprint.filename(),
                original.map(|o| o.name.as_str()),
                original.map(|o| o.number),
            ],
        )?;

        let insert_usage = queries::get_query(dialect, Query::InsertJobBuildRelation)?;
        for (job, range_set) in fingerprint.usages() {
            for build_number in range_set.list_numbers() {
                tx.execute(
                    insert_usage,
                    params![fingerprint.id(), self.instance_id, job, build_number],
                )?;
            }
        }

        let insert_facet = queries::get_query(dialect, Query::InsertFacetRelation)?;
        for facet in fingerprint.facets() {
            let entry = serde_json::to_string(&facet.entry)
                .map_err(|e| Error::Deserialization(e.to_string()))?;
            tx.execute(
                insert_facet,
                params![
                    fingerprint.id(),
                    self.instance_id,
                    facet.name,
                    entry,
                    facet.deletion_blocked,
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Load the fingerprint with the given id from this instance's
    /// partition. A missing id is `Ok(None)`, not an error.
    pub fn load(&self, id: &str) -> Result<Option<Fingerprint>> {
        let result = self.try_load(id);
        if let Err(e) = &result {
            warn!(id, error = %e, "failed to load fingerprint");
        }
        result
    }

    fn try_load(&self, id: &str) -> Result<Option<Fingerprint>> {
        let mut supplier = self.lock()?;
        let dialect = supplier.dialect();
        let conn = supplier.connection()?;

        let metadata = conn
            .query_row(
                queries::get_query(dialect, Query::SelectFingerprint)?,
                params![id, self.instance_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, Option<i32>>(3)?,
                    ))
                },
            )
            .optional()?;

        let Some((timestamp, filename, original_job_name, original_job_build_number)) = metadata
        else {
            return Ok(None);
        };

        let timestamp = DateTime::parse_from_rfc3339(&timestamp)
            .map_err(|e| {
                Error::Deserialization(format!("fingerprint {id} has an unparseable timestamp: {e}"))
            })?
            .with_timezone(&Utc);

        let mut stmt = conn.prepare(queries::get_query(dialect, Query::SelectJobBuildRelation)?)?;
        let usage_rows: Vec<(String, i32)> = stmt
            .query_map(params![id, self.instance_id], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })?
            .collect::<rusqlite::Result<_>>()?;

        let mut stmt = conn.prepare(queries::get_query(dialect, Query::SelectFacetRelation)?)?;
        let facet_rows: Vec<FacetRow> = stmt
            .query_map(params![id, self.instance_id], |row| {
                Ok(FacetRow {
                    facet_name: row.get(0)?,
                    facet_entry: row.get(1)?,
                    deletion_blocked: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<_>>()?;

        let metadata_row = MetadataRow {
            timestamp,
            filename,
            original_job_name,
            original_job_build_number,
        };
        let document = convert::build_document(
            convert::metadata_to_document(id, &metadata_row)?,
            convert::usages_to_document(&usage_rows),
            convert::facets_to_document(&facet_rows)?,
        );
        convert::document_to_fingerprint(document).map(Some)
    }

    /// Delete the fingerprint and all its relation rows from this instance's
    /// partition. Deleting a non-existent id is a silent no-op.
    pub fn delete(&self, id: &str) -> Result<()> {
        let result = self.try_delete(id);
        match &result {
            Ok(()) => debug!(id, "deleted fingerprint"),
            Err(e) => warn!(id, error = %e, "failed to delete fingerprint"),
        }
        result.map_err(|e| wrap_transaction("delete", id, e))
    }

    fn try_delete(&self, id: &str) -> Result<()> {
        let mut supplier = self.lock()?;
        let dialect = supplier.dialect();
        let conn = supplier.connection()?;
        let tx = conn.transaction()?;
        delete_rows(&tx, dialect, id, &self.instance_id)?;
        tx.commit()?;
        Ok(())
    }

    /// Whether any fingerprint exists in this instance's partition.
    /// A cheap readiness probe; storage errors are logged and report false.
    pub fn is_ready(&self) -> bool {
        match self.try_is_ready() {
            Ok(ready) => ready,
            Err(e) => {
                warn!(error = %e, "fingerprint readiness probe failed");
                false
            }
        }
    }

    fn try_is_ready(&self) -> Result<bool> {
        let mut supplier = self.lock()?;
        let dialect = supplier.dialect();
        let conn = supplier.connection()?;
        let ready = conn.query_row(
            queries::get_query(dialect, Query::SelectExistsForInstance)?,
            params![self.instance_id],
            |row| row.get(0),
        )?;
        Ok(ready)
    }

    /// Force schema migration on the current connection. Idempotent;
    /// unlike the automatic hook it does not consult the process-wide flag,
    /// so a database created after the flag was set still gets its tables.
    pub fn migrate_schema(&self) -> Result<()> {
        let mut supplier = self.lock()?;
        let dialect = supplier.dialect();
        let conn = supplier.connection()?;
        schema::migrate_schema(conn, dialect)
    }

    /// Row counts for this instance's partition
    pub fn stats(&self) -> Result<StoreStats> {
        let mut supplier = self.lock()?;
        let dialect = supplier.dialect();
        let conn = supplier.connection()?;

        let count = |query: Query| -> Result<usize> {
            let n: i64 = conn.query_row(
                queries::get_query(dialect, query)?,
                params![self.instance_id],
                |row| row.get(0),
            )?;
            Ok(n as usize)
        };

        Ok(StoreStats {
            fingerprints: count(Query::SelectFingerprintCount)?,
            usages: count(Query::SelectJobBuildRelationCount)?,
            facets: count(Query::SelectFacetRelationCount)?,
        })
    }

    /// Release the cached connection. The next operation reconnects.
    pub fn close(&self) {
        if let Ok(mut supplier) = self.supplier.lock() {
            supplier.close();
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, ConnectionSupplier>> {
        self.supplier
            .lock()
            .map_err(|_| Error::Connectivity("connection lock poisoned".into()))
    }
}

/// Delete the metadata row and all relation rows for `(id, instance_id)`.
/// Children go first; no database-enforced cascade is relied upon.
fn delete_rows(conn: &Connection, dialect: Dialect, id: &str, instance_id: &str) -> Result<()> {
    for query in [
        Query::DeleteJobBuildRelation,
        Query::DeleteFacetRelation,
        Query::DeleteFingerprint,
    ] {
        conn.execute(queries::get_query(dialect, query)?, params![id, instance_id])?;
    }
    Ok(())
}

fn wrap_transaction(operation: &'static str, id: &str, e: Error) -> Error {
    match e {
        Error::Storage(source) => Error::Transaction {
            operation,
            id: id.to_string(),
            source,
        },
        other => other,
    }
}

/// Per-partition row counts
#[derive(Debug, Clone)]
pub struct StoreStats {
    pub fingerprints: usize,
    pub usages: usize,
    pub facets: usize,
}

impl std::fmt::Display for StoreStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Fingerprint Store Statistics:")?;
        writeln!(f, "  Fingerprints: {}", self.fingerprints)?;
        writeln!(f, "  Usage rows: {}", self.usages)?;
        writeln!(f, "  Facet rows: {}", self.facets)
    }
}
