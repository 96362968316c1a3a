//! Firestore typed-value encoding.
//!
//! The REST API wraps every field in a single-key object naming its type
//! (`stringValue`, `doubleValue`, `arrayValue`, ...). This module maps
//! analysis records to and from that shape.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::domain::{AnalysisRecord, AppError, NewRecord, Result, Timestamp, Verdict};

/// Field holding the server-assigned creation time.
pub const TIMESTAMP_FIELD: &str = "timestamp";

/// Field holding the writing principal.
pub const OWNER_FIELD: &str = "userId";

/// A document as returned by `runQuery`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Full resource name, ending in the document id.
    pub name: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
    #[serde(default)]
    pub create_time: Option<String>,
}

/// One element of a `runQuery` response stream.
#[derive(Debug, Deserialize)]
pub struct QueryResult {
    /// Absent on progress-only entries.
    #[serde(default)]
    pub document: Option<Document>,
}

/// Encode the caller payload plus owner into Firestore fields.
///
/// The timestamp is left out; it is set by a server transform.
#[must_use]
pub fn encode_fields(record: &NewRecord, owner: &str) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert("fileName".into(), string_value(&record.file_name));
    fields.insert("result".into(), string_value(record.result.as_str()));
    fields.insert("confidence".into(), json!({ "doubleValue": record.confidence }));
    fields.insert(
        "issues".into(),
        json!({
            "arrayValue": {
                "values": record.issues.iter().map(|i| string_value(i)).collect::<Vec<_>>()
            }
        }),
    );
    fields.insert(OWNER_FIELD.into(), string_value(owner));
    fields
}

/// Decode a queried document into a record.
///
/// # Errors
/// Returns error if the verdict or timestamp cannot be interpreted.
pub fn decode_document(doc: &Document) -> Result<AnalysisRecord> {
    let id = doc
        .name
        .rsplit('/')
        .next()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::InvalidData {
            message: format!("Document name has no id: {}", doc.name),
        })?
        .to_string();

    let result: Verdict = string_field(&doc.fields, "result")
        .ok_or_else(|| AppError::InvalidData {
            message: format!("Document {id} has no result"),
        })?
        .parse()
        .map_err(|message| AppError::InvalidData { message })?;

    let created_at = doc
        .fields
        .get(TIMESTAMP_FIELD)
        .and_then(|v| v.get("timestampValue"))
        .and_then(Value::as_str)
        .or(doc.create_time.as_deref())
        .ok_or_else(|| AppError::InvalidData {
            message: format!("Document {id} has no timestamp"),
        })
        .and_then(parse_timestamp)?;

    Ok(AnalysisRecord {
        file_name: string_field(&doc.fields, "fileName").unwrap_or_default().to_string(),
        result,
        confidence: number_field(&doc.fields, "confidence").unwrap_or_default(),
        issues: string_array_field(&doc.fields, "issues"),
        owner_principal: string_field(&doc.fields, OWNER_FIELD).map(String::from),
        created_at,
        id,
    })
}

/// Decode every document in a `runQuery` response.
///
/// Documents that cannot be interpreted are logged and skipped, so one
/// malformed entry written by another client never hides the rest.
pub fn decode_documents(entries: &[QueryResult]) -> Vec<AnalysisRecord> {
    entries
        .iter()
        .filter_map(|entry| entry.document.as_ref())
        .filter_map(|doc| match decode_document(doc) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(document = %doc.name, error = %e, "Skipping undecodable document");
                None
            }
        })
        .collect()
}

fn string_value(s: &str) -> Value {
    json!({ "stringValue": s })
}

fn string_field<'a>(fields: &'a Map<String, Value>, name: &str) -> Option<&'a str> {
    fields.get(name)?.get("stringValue")?.as_str()
}

fn number_field(fields: &Map<String, Value>, name: &str) -> Option<f64> {
    let value = fields.get(name)?;
    if let Some(d) = value.get("doubleValue").and_then(Value::as_f64) {
        return Some(d);
    }
    // integerValue is sent as a decimal string
    match value.get("integerValue")? {
        Value::String(s) => s.parse().ok(),
        other => other.as_f64(),
    }
}

fn string_array_field(fields: &Map<String, Value>, name: &str) -> Vec<String> {
    fields
        .get(name)
        .and_then(|v| v.get("arrayValue"))
        .and_then(|v| v.get("values"))
        .and_then(Value::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(|v| v.get("stringValue").and_then(Value::as_str))
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

fn parse_timestamp(s: &str) -> Result<Timestamp> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| Timestamp::from(dt.with_timezone(&Utc)))
        .map_err(|e| AppError::InvalidData {
            message: format!("Invalid timestamp {s}: {e}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> NewRecord {
        NewRecord {
            file_name: "clip1.mp4".into(),
            result: Verdict::Manipulated,
            confidence: 96.4,
            issues: vec!["Unnatural Blinking".into(), "Lip Sync mismatch".into()],
        }
    }

    #[test]
    fn test_encode_fields_shape() {
        let fields = encode_fields(&sample(), "uid-1");

        assert_eq!(fields["fileName"]["stringValue"], "clip1.mp4");
        assert_eq!(fields["result"]["stringValue"], "MANIPULATED");
        assert_eq!(fields["confidence"]["doubleValue"], 96.4);
        assert_eq!(fields["issues"]["arrayValue"]["values"][1]["stringValue"], "Lip Sync mismatch");
        assert_eq!(fields[OWNER_FIELD]["stringValue"], "uid-1");
        assert!(!fields.contains_key(TIMESTAMP_FIELD));
    }

    #[test]
    fn test_decode_queried_document() {
        let mut fields = encode_fields(&sample(), "uid-1");
        fields.insert(
            TIMESTAMP_FIELD.into(),
            json!({ "timestampValue": "2024-05-01T10:00:00.123456Z" }),
        );
        let doc = Document {
            name: "projects/p/databases/(default)/documents/scans/AbC123".into(),
            fields,
            create_time: None,
        };

        let record = decode_document(&doc).unwrap();

        assert_eq!(record.id, "AbC123");
        assert_eq!(record.file_name, "clip1.mp4");
        assert_eq!(record.result, Verdict::Manipulated);
        assert!((record.confidence - 96.4).abs() < f64::EPSILON);
        assert_eq!(record.issues.len(), 2);
        assert_eq!(record.owner_principal.as_deref(), Some("uid-1"));
        assert_eq!(
            record.created_at.to_date().to_rfc3339(),
            "2024-05-01T10:00:00.123456+00:00"
        );
    }

    #[test]
    fn test_decode_integer_confidence_and_create_time_fallback() {
        let response = json!([
            { "readTime": "2024-05-01T10:00:00Z" },
            { "document": {
                "name": "projects/p/databases/(default)/documents/scans/x1",
                "fields": {
                    "result": { "stringValue": "FAKE" },
                    "confidence": { "integerValue": "88" }
                },
                "createTime": "2024-05-01T09:00:00Z"
            }}
        ]);
        let entries: Vec<QueryResult> = serde_json::from_value(response).unwrap();
        let docs: Vec<_> = entries.iter().filter_map(|e| e.document.as_ref()).collect();
        assert_eq!(docs.len(), 1);

        let record = decode_document(docs[0]).unwrap();
        assert_eq!(record.result, Verdict::Manipulated);
        assert!((record.confidence - 88.0).abs() < f64::EPSILON);
        assert!(record.issues.is_empty());
        assert!(record.file_name.is_empty());
    }

    #[test]
    fn test_decode_rejects_unknown_verdict() {
        let doc = Document {
            name: "projects/p/databases/(default)/documents/scans/x2".into(),
            fields: serde_json::from_value(json!({ "result": { "stringValue": "MAYBE" } })).unwrap(),
            create_time: Some("2024-05-01T09:00:00Z".into()),
        };
        assert!(decode_document(&doc).is_err());
    }

    #[test]
    fn test_decode_documents_skips_malformed_entries() {
        let response = json!([
            { "document": {
                "name": "projects/p/databases/(default)/documents/scans/good",
                "fields": {
                    "fileName": { "stringValue": "clip1.mp4" },
                    "result": { "stringValue": "GENUINE" },
                    "confidence": { "doubleValue": 71.5 },
                    "timestamp": { "timestampValue": "2024-05-01T10:00:00Z" }
                }
            }},
            { "document": {
                "name": "projects/p/databases/(default)/documents/scans/other",
                "fields": {
                    "fileName": { "stringValue": "broken.mp4" },
                    "timestamp": { "timestampValue": "2024-05-01T09:00:00Z" }
                }
            }},
            { "document": {
                "name": "projects/p/databases/(default)/documents/scans/late",
                "fields": {
                    "result": { "stringValue": "MANIPULATED" },
                    "timestamp": { "timestampValue": "not a time" }
                }
            }}
        ]);
        let entries: Vec<QueryResult> = serde_json::from_value(response).unwrap();

        let records = decode_documents(&entries);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "good");
        assert_eq!(records[0].file_name, "clip1.mp4");
        assert_eq!(records[0].result, Verdict::Genuine);
    }
}
