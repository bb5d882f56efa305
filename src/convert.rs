//! Data conversion bridge
//!
//! Pure transformations between raw relational column values and the
//! canonical intermediate document, and from the document to the fingerprint
//! object graph. No I/O happens here; the store engine reads the rows and
//! hands them over.

use crate::document::{FacetEntry, FingerprintDocument, UsageEntry};
use crate::fingerprint::{self, BuildPtr, Fingerprint, FingerprintFacet};
use crate::range_set::RangeSet;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use std::collections::BTreeMap;

/// Scalar metadata columns of one fingerprint row, as read from storage
#[derive(Debug, Clone)]
pub struct MetadataRow {
    pub timestamp: DateTime<Utc>,
    pub filename: String,
    pub original_job_name: Option<String>,
    pub original_job_build_number: Option<i32>,
}

/// One facet relation row, entry still in its stored text form
#[derive(Debug, Clone)]
pub struct FacetRow {
    pub facet_name: String,
    pub facet_entry: String,
    pub deletion_blocked: bool,
}

/// Emit the scalar-field fragment of the document.
///
/// Absent original-build fields are omitted, not emitted as nulls; a row
/// with only one of the pair is corrupt and fails as a deserialization
/// error rather than producing a half-populated original build.
pub fn metadata_to_document(id: &str, row: &MetadataRow) -> Result<Value> {
    let mut fragment = json!({
        "id": id,
        "timestamp": row.timestamp,
        "filename": row.filename,
    });

    match (&row.original_job_name, row.original_job_build_number) {
        (Some(name), Some(number)) => {
            fragment["original_job_name"] = json!(name);
            fragment["original_job_build_number"] = json!(number);
        }
        (None, None) => {}
        _ => {
            return Err(Error::Deserialization(format!(
                "fingerprint {id} has a partial original build reference"
            )));
        }
    }

    Ok(fragment)
}

/// Emit the `usages` fragment: one `{job, build_number}` entry per row,
/// grouped by job name in first-seen order. Within a job, row order is
/// preserved as given.
pub fn usages_to_document(rows: &[(String, i32)]) -> Value {
    let mut jobs: Vec<&str> = Vec::new();
    let mut grouped: BTreeMap<&str, Vec<i32>> = BTreeMap::new();
    for (job, build_number) in rows {
        if !grouped.contains_key(job.as_str()) {
            jobs.push(job.as_str());
        }
        grouped.entry(job.as_str()).or_default().push(*build_number);
    }

    let mut entries: Vec<UsageEntry> = Vec::with_capacity(rows.len());
    for job in jobs {
        for build_number in &grouped[job] {
            entries.push(UsageEntry {
                job: job.to_string(),
                build_number: *build_number,
            });
        }
    }
    json!(entries)
}

/// Emit the `facets` fragment, one entry per row in input order.
/// A stored payload that is not valid JSON fails the whole conversion.
pub fn facets_to_document(rows: &[FacetRow]) -> Result<Value> {
    let mut entries = Vec::with_capacity(rows.len());
    for row in rows {
        let payload: Value = serde_json::from_str(&row.facet_entry).map_err(|e| {
            Error::Deserialization(format!("facet {} has a malformed entry: {e}", row.facet_name))
        })?;
        entries.push(FacetEntry {
            facet_name: row.facet_name.clone(),
            facet_entry: payload,
            deletion_blocked: row.deletion_blocked,
        });
    }
    Ok(json!(entries))
}

/// Merge the three fragments into the full canonical document
pub fn build_document(mut metadata: Value, usages: Value, facets: Value) -> Value {
    metadata["usages"] = usages;
    metadata["facets"] = facets;
    metadata
}

/// Reconstruct the fingerprint graph from a canonical document.
///
/// Delegates the heavy lifting to serde; a malformed document fails as a
/// deserialization error, never as a partially populated fingerprint.
pub fn document_to_fingerprint(document: Value) -> Result<Fingerprint> {
    let doc: FingerprintDocument = serde_json::from_value(document)
        .map_err(|e| Error::Deserialization(e.to_string()))?;

    fingerprint::validate_id(&doc.id)?;

    let original = match (doc.original_job_name, doc.original_job_build_number) {
        (Some(name), Some(number)) => Some(BuildPtr { name, number }),
        (None, None) => None,
        _ => {
            return Err(Error::Deserialization(format!(
                "fingerprint {} has a partial original build reference",
                doc.id
            )));
        }
    };

    let mut usages: BTreeMap<String, RangeSet> = BTreeMap::new();
    for entry in doc.usages {
        usages.entry(entry.job).or_default().add(entry.build_number);
    }

    let facets = doc
        .facets
        .into_iter()
        .map(|entry| FingerprintFacet {
            name: entry.facet_name,
            entry: entry.facet_entry,
            deletion_blocked: entry.deletion_blocked,
        })
        .collect();

    Ok(Fingerprint::from_parts(
        doc.id,
        doc.timestamp,
        doc.filename,
        original,
        usages,
        facets,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "a1b2c3d4e5f60718293a4b5c6d7e8fd4";

    fn sample_metadata() -> MetadataRow {
        MetadataRow {
            timestamp: "2026-08-23T10:00:00Z".parse().unwrap(),
            filename: "foo.jar".into(),
            original_job_name: None,
            original_job_build_number: None,
        }
    }

    #[test]
    fn test_metadata_with_original() {
        let mut row = sample_metadata();
        row.original_job_name = Some("origin".into());
        row.original_job_build_number = Some(7);

        let fragment = metadata_to_document(ID, &row).unwrap();
        assert_eq!(fragment["id"], ID);
        assert_eq!(fragment["filename"], "foo.jar");
        assert_eq!(fragment["original_job_name"], "origin");
        assert_eq!(fragment["original_job_build_number"], 7);
    }

    #[test]
    fn test_metadata_without_original_omits_fields() {
        let fragment = metadata_to_document(ID, &sample_metadata()).unwrap();
        assert!(fragment.get("original_job_name").is_none());
        assert!(fragment.get("original_job_build_number").is_none());
    }

    #[test]
    fn test_metadata_partial_original_is_rejected() {
        let mut row = sample_metadata();
        row.original_job_name = Some("origin".into());
        assert!(matches!(
            metadata_to_document(ID, &row),
            Err(Error::Deserialization(_))
        ));
    }

    #[test]
    fn test_usages_preserve_first_seen_job_order() {
        let rows = vec![
            ("zeta".to_string(), 1),
            ("alpha".to_string(), 2),
            ("zeta".to_string(), 3),
        ];
        let fragment = usages_to_document(&rows);
        let entries = fragment.as_array().unwrap();
        assert_eq!(entries.len(), 3);
        // zeta was seen first, so its rows come first and stay together
        assert_eq!(entries[0]["job"], "zeta");
        assert_eq!(entries[0]["build_number"], 1);
        assert_eq!(entries[1]["job"], "zeta");
        assert_eq!(entries[1]["build_number"], 3);
        assert_eq!(entries[2]["job"], "alpha");
    }

    #[test]
    fn test_facets_fragment() {
        let rows = vec![FacetRow {
            facet_name: "TestFacet".into(),
            facet_entry: r#"{"property":"x"}"#.into(),
            deletion_blocked: true,
        }];
        let fragment = facets_to_document(&rows).unwrap();
        assert_eq!(fragment[0]["facet_name"], "TestFacet");
        assert_eq!(fragment[0]["facet_entry"]["property"], "x");
        assert_eq!(fragment[0]["deletion_blocked"], true);
    }

    #[test]
    fn test_malformed_facet_entry_fails() {
        let rows = vec![FacetRow {
            facet_name: "TestFacet".into(),
            facet_entry: "{not json".into(),
            deletion_blocked: false,
        }];
        assert!(matches!(
            facets_to_document(&rows),
            Err(Error::Deserialization(_))
        ));
    }

    #[test]
    fn test_document_to_fingerprint_round_trip() {
        let metadata = metadata_to_document(ID, &sample_metadata()).unwrap();
        let usages = usages_to_document(&[("jobA".to_string(), 3)]);
        let facets = facets_to_document(&[FacetRow {
            facet_name: "TestFacet".into(),
            facet_entry: r#"{"property":"x"}"#.into(),
            deletion_blocked: false,
        }])
        .unwrap();

        let doc = build_document(metadata, usages, facets);
        let fp = document_to_fingerprint(doc).unwrap();

        assert_eq!(fp.id(), ID);
        assert_eq!(fp.filename(), "foo.jar");
        assert!(fp.original().is_none());
        assert_eq!(fp.range_set_for("jobA").unwrap().list_numbers(), vec![3]);
        assert_eq!(fp.facets().len(), 1);
        assert_eq!(fp.facets()[0].name, "TestFacet");
    }

    #[test]
    fn test_empty_children_round_trip_as_empty() {
        let doc = build_document(
            metadata_to_document(ID, &sample_metadata()).unwrap(),
            usages_to_document(&[]),
            facets_to_document(&[]).unwrap(),
        );
        assert_eq!(doc["usages"].as_array().unwrap().len(), 0);
        assert_eq!(doc["facets"].as_array().unwrap().len(), 0);

        let fp = document_to_fingerprint(doc).unwrap();
        assert!(fp.usages().is_empty());
        assert!(fp.facets().is_empty());
    }

    #[test]
    fn test_malformed_document_fails() {
        let doc = json!({"id": ID, "filename": "foo.jar"}); // missing timestamp
        assert!(matches!(
            document_to_fingerprint(doc),
            Err(Error::Deserialization(_))
        ));
    }
}
