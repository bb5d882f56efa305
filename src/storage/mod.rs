//! Storage Layer - relational persistence for fingerprints
//!
//! System of record is a SQL database with tables:
//! - fingerprint(id, instance_id, timestamp, filename, original_job_name, original_job_build_number)
//! - fingerprint_job_build_relation(fingerprint_id, instance_id, job_name, build_number)
//! - fingerprint_facet_relation(fingerprint_id, instance_id, facet_name, facet_entry, deletion_blocked)

pub mod connection;
pub mod queries;
pub mod schema;
pub mod store;

pub use connection::ConnectionSupplier;
pub use queries::{Dialect, Query};
pub use store::{SqlFingerprintStorage, StoreStats};
