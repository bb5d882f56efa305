//! Fingerprint object graph
//!
//! A fingerprint identifies a file by its content hash and tracks which
//! jobs/builds produced or used it. Facets are extensible typed annotations;
//! the store never interprets their payload, it only routes the tagged JSON
//! value through the serializer.

use crate::range_set::RangeSet;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Pointer to the build that originally produced a file.
/// Either both fields exist or the fingerprint has no original build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildPtr {
    pub name: String,
    pub number: i32,
}

/// Typed annotation attached to a fingerprint.
///
/// `name` is the type discriminator and `entry` an opaque structured payload.
/// A facet with `deletion_blocked` set vetoes garbage collection of its
/// fingerprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FingerprintFacet {
    pub name: String,
    pub entry: serde_json::Value,
    pub deletion_blocked: bool,
}

impl FingerprintFacet {
    pub fn new(name: impl Into<String>, entry: serde_json::Value) -> Self {
        FingerprintFacet {
            name: name.into(),
            entry,
            deletion_blocked: false,
        }
    }
}

/// A content-addressed record identifying a file by hash.
///
/// Identified by a 32-character hexadecimal content hash together with the
/// owning instance's identity; the instance scoping is applied by the store,
/// not carried on the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fingerprint {
    id: String,
    timestamp: DateTime<Utc>,
    filename: String,
    original: Option<BuildPtr>,
    usages: BTreeMap<String, RangeSet>,
    facets: Vec<FingerprintFacet>,
}

impl Fingerprint {
    /// Create a fingerprint stamped with the current time
    pub fn new(id: impl Into<String>, filename: impl Into<String>) -> Result<Self> {
        Self::with_timestamp(id, filename, Utc::now())
    }

    pub fn with_timestamp(
        id: impl Into<String>,
        filename: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Result<Self> {
        let id = id.into();
        validate_id(&id)?;
        Ok(Fingerprint {
            id,
            timestamp,
            filename: filename.into(),
            original: None,
            usages: BTreeMap::new(),
            facets: Vec::new(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn original(&self) -> Option<&BuildPtr> {
        self.original.as_ref()
    }

    pub fn set_original(&mut self, name: impl Into<String>, number: i32) {
        self.original = Some(BuildPtr {
            name: name.into(),
            number,
        });
    }

    /// Record that the given build of a job used this file
    pub fn add_usage(&mut self, job: impl Into<String>, build_number: i32) {
        self.usages.entry(job.into()).or_default().add(build_number);
    }

    /// Usage relations, keyed by job name
    pub fn usages(&self) -> &BTreeMap<String, RangeSet> {
        &self.usages
    }

    pub fn range_set_for(&self, job: &str) -> Option<&RangeSet> {
        self.usages.get(job)
    }

    pub fn add_facet(&mut self, facet: FingerprintFacet) {
        self.facets.push(facet);
    }

    pub fn facets(&self) -> &[FingerprintFacet] {
        &self.facets
    }

    /// True if any facet vetoes deletion of this fingerprint
    pub fn is_deletion_blocked(&self) -> bool {
        self.facets.iter().any(|f| f.deletion_blocked)
    }

    pub(crate) fn from_parts(
        id: String,
        timestamp: DateTime<Utc>,
        filename: String,
        original: Option<BuildPtr>,
        usages: BTreeMap<String, RangeSet>,
        facets: Vec<FingerprintFacet>,
    ) -> Self {
        Fingerprint {
            id,
            timestamp,
            filename,
            original,
            usages,
            facets,
        }
    }
}

/// Validate a 32-character lowercase hexadecimal content hash
pub fn validate_id(id: &str) -> Result<()> {
    if id.len() == 32
        && id
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
    {
        Ok(())
    } else {
        Err(Error::InvalidId(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SAMPLE_ID: &str = "a1b2c3d4e5f60718293a4b5c6d7e8fd4";

    #[test]
    fn test_new_validates_id() {
        assert!(Fingerprint::new(SAMPLE_ID, "foo.jar").is_ok());
        assert!(matches!(
            Fingerprint::new("too-short", "foo.jar"),
            Err(Error::InvalidId(_))
        ));
        // uppercase hex is rejected
        assert!(Fingerprint::new(&SAMPLE_ID.to_uppercase(), "foo.jar").is_err());
    }

    #[test]
    fn test_add_usage_builds_range_sets() {
        let mut fp = Fingerprint::new(SAMPLE_ID, "foo.jar").unwrap();
        fp.add_usage("jobA", 3);
        fp.add_usage("jobA", 4);
        fp.add_usage("jobB", 10);

        assert_eq!(fp.usages().len(), 2);
        assert_eq!(fp.range_set_for("jobA").unwrap().list_numbers(), vec![3, 4]);
        assert!(fp.range_set_for("jobB").unwrap().includes(10));
    }

    #[test]
    fn test_deletion_blocked_via_facet() {
        let mut fp = Fingerprint::new(SAMPLE_ID, "foo.jar").unwrap();
        assert!(!fp.is_deletion_blocked());

        let mut facet = FingerprintFacet::new("KeepFacet", json!({"keep": true}));
        facet.deletion_blocked = true;
        fp.add_facet(facet);
        assert!(fp.is_deletion_blocked());
    }
}
