//! Canonical intermediate document
//!
//! The sole contract between the relational layer and the object-graph
//! serializer. The store engine reads raw column values, the conversion
//! bridge assembles them into this shape, and serde turns the document into
//! the final [`Fingerprint`](crate::Fingerprint) graph.
//!
//! Absent original-build fields are omitted entirely, never emitted as null
//! placeholders. Zero usages or facets appear as empty arrays, never as
//! missing fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One `(job, build_number)` usage of a fingerprint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageEntry {
    pub job: String,
    pub build_number: i32,
}

/// One facet row: type discriminator plus opaque payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacetEntry {
    pub facet_name: String,
    pub facet_entry: serde_json::Value,
    #[serde(default)]
    pub deletion_blocked: bool,
}

/// Full canonical document for one fingerprint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FingerprintDocument {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_job_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_job_build_number: Option<i32>,
    #[serde(default)]
    pub usages: Vec<UsageEntry>,
    #[serde(default)]
    pub facets: Vec<FacetEntry>,
}
