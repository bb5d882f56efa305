//! Dialect query registry
//!
//! Resolves a logical query name plus a dialect to literal SQL text. Each
//! dialect ships a `key = sql` resource bundle embedded at compile time;
//! bundles are parsed once per process and cached. A corrupt bundle fails
//! every subsequent resolution for that dialect rather than being re-parsed
//! per call.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::OnceLock;

/// Supported SQL dialects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Sqlite,
    Postgres,
}

impl Dialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Sqlite => "sqlite",
            Dialect::Postgres => "postgres",
        }
    }

    pub fn all() -> &'static [Dialect] {
        &[Dialect::Sqlite, Dialect::Postgres]
    }
}

impl FromStr for Dialect {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "sqlite" | "sqlite3" => Ok(Dialect::Sqlite),
            "postgres" | "postgresql" => Ok(Dialect::Postgres),
            _ => Err(Error::Configuration(format!("unknown dialect: {}", s))),
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Closed enumeration of logical query names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Query {
    InsertFingerprint,
    InsertJobBuildRelation,
    InsertFacetRelation,
    SelectFingerprint,
    SelectJobBuildRelation,
    SelectFacetRelation,
    SelectExistsForInstance,
    DeleteFingerprint,
    DeleteJobBuildRelation,
    DeleteFacetRelation,
    CheckFingerprintTableExists,
    CheckJobBuildRelationTableExists,
    CheckFacetRelationTableExists,
    SelectFingerprintCount,
    SelectJobBuildRelationCount,
    SelectFacetRelationCount,
}

impl Query {
    /// Bundle key for this logical query
    pub fn key(&self) -> &'static str {
        match self {
            Query::InsertFingerprint => "insert_fingerprint",
            Query::InsertJobBuildRelation => "insert_fingerprint_job_build_relation",
            Query::InsertFacetRelation => "insert_fingerprint_facet_relation",
            Query::SelectFingerprint => "select_fingerprint",
            Query::SelectJobBuildRelation => "select_fingerprint_job_build_relation",
            Query::SelectFacetRelation => "select_fingerprint_facet_relation",
            Query::SelectExistsForInstance => "select_fingerprint_exists_for_instance",
            Query::DeleteFingerprint => "delete_fingerprint",
            Query::DeleteJobBuildRelation => "delete_fingerprint_job_build_relation",
            Query::DeleteFacetRelation => "delete_fingerprint_facet_relation",
            Query::CheckFingerprintTableExists => "check_fingerprint_table_exists",
            Query::CheckJobBuildRelationTableExists => {
                "check_fingerprint_job_build_relation_table_exists"
            }
            Query::CheckFacetRelationTableExists => "check_fingerprint_facet_relation_table_exists",
            Query::SelectFingerprintCount => "select_fingerprint_count",
            Query::SelectJobBuildRelationCount => "select_fingerprint_job_build_relation_count",
            Query::SelectFacetRelationCount => "select_fingerprint_facet_relation_count",
        }
    }

    pub fn all() -> &'static [Query] {
        &[
            Query::InsertFingerprint,
            Query::InsertJobBuildRelation,
            Query::InsertFacetRelation,
            Query::SelectFingerprint,
            Query::SelectJobBuildRelation,
            Query::SelectFacetRelation,
            Query::SelectExistsForInstance,
            Query::DeleteFingerprint,
            Query::DeleteJobBuildRelation,
            Query::DeleteFacetRelation,
            Query::CheckFingerprintTableExists,
            Query::CheckJobBuildRelationTableExists,
            Query::CheckFacetRelationTableExists,
            Query::SelectFingerprintCount,
            Query::SelectJobBuildRelationCount,
            Query::SelectFacetRelationCount,
        ]
    }
}

const SQLITE_BUNDLE: &str = include_str!("queries/sqlite.properties");
const POSTGRESQL_BUNDLE: &str = include_str!("queries/postgresql.properties");

type Bundle = std::result::Result<HashMap<String, String>, String>;

fn parse_bundle(text: &str) -> Bundle {
    let mut queries = HashMap::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, sql)) = line.split_once('=') else {
            return Err(format!("line {}: expected 'key = sql'", lineno + 1));
        };
        let key = key.trim().to_string();
        let sql = sql.trim().to_string();
        if key.is_empty() || sql.is_empty() {
            return Err(format!("line {}: empty key or query text", lineno + 1));
        }
        if queries.insert(key.clone(), sql).is_some() {
            return Err(format!("line {}: duplicate key '{}'", lineno + 1, key));
        }
    }
    Ok(queries)
}

fn bundle(dialect: Dialect) -> Result<&'static HashMap<String, String>> {
    static SQLITE: OnceLock<Bundle> = OnceLock::new();
    static POSTGRESQL: OnceLock<Bundle> = OnceLock::new();

    let (cell, text) = match dialect {
        Dialect::Sqlite => (&SQLITE, SQLITE_BUNDLE),
        Dialect::Postgres => (&POSTGRESQL, POSTGRESQL_BUNDLE),
    };

    cell.get_or_init(|| parse_bundle(text)).as_ref().map_err(|e| {
        Error::Configuration(format!("query bundle for dialect {} is unusable: {}", dialect, e))
    })
}

/// Resolve a logical query to its SQL text for the given dialect
pub fn get_query(dialect: Dialect, query: Query) -> Result<&'static str> {
    bundle(dialect)?
        .get(query.key())
        .map(String::as_str)
        .ok_or_else(|| {
            Error::Configuration(format!(
                "no query '{}' registered for dialect {}",
                query.key(),
                dialect
            ))
        })
}
