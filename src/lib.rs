//! # SQL Fingerprint Storage
//!
//! Persists content-addressed fingerprint records into a relational database
//! instead of the default flat-file store.
//!
//! This crate provides:
//! - A fingerprint object graph (content hash, usage relations, typed facets)
//! - A dialect-aware SQL query registry backed by resource bundles
//! - Idempotent schema migration guarded by a process-wide flag
//! - A transactional save/load/delete engine partitioned by instance identity
//!
//! Multiple application instances may share one database; every row carries
//! the owning instance's identity digest, so instances never observe each
//! other's fingerprints.

pub mod config;
pub mod convert;
pub mod document;
pub mod fingerprint;
pub mod identity;
pub mod range_set;
pub mod storage;

// Re-exports for convenient access
pub use config::DatabaseConfig;
pub use document::FingerprintDocument;
pub use fingerprint::{BuildPtr, Fingerprint, FingerprintFacet};
pub use identity::InstanceIdentity;
pub use range_set::RangeSet;
pub use storage::queries::Dialect;
pub use storage::store::SqlFingerprintStorage;

/// Result type alias for fingerprint storage operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for fingerprint storage operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Unknown dialect, unresolvable query, or unusable configuration.
    /// Fatal; never retried.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A connection could not be obtained or was lost mid-operation
    #[error("Connectivity error: {0}")]
    Connectivity(String),

    /// A statement failed inside a transactional write; the whole
    /// transaction was rolled back before this surfaced.
    #[error("Transaction failed during {operation} of fingerprint {id}: {source}")]
    Transaction {
        operation: &'static str,
        id: String,
        #[source]
        source: rusqlite::Error,
    },

    /// A stored document could not be reconstructed into a fingerprint
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Fingerprint ids are 32 lowercase hexadecimal characters
    #[error("Invalid fingerprint id: {0}")]
    InvalidId(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
