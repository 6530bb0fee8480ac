//! Record and snapshot types exchanged with the roster store

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::RemoteError;

/// Ordered, schema-less field map keyed by spreadsheet header names
pub type Fields = Map<String, Value>;

/// Store-assigned record identifier
///
/// Stores hand out either string or numeric ids; both are normalized to
/// their string form so they can be compared and used in URLs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Read an identifier out of a JSON value (string or number)
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if !s.is_empty() => Some(Self(s.clone())),
            Value::Number(n) => Some(Self(n.to_string())),
            _ => None,
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A single roster row: an immutable identifier plus mutable fields
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    id: RecordId,
    /// Identifier exactly as the store sent it (string or number)
    raw_id: Value,
    fields: Fields,
}

impl Record {
    pub fn new(id: impl Into<RecordId>, fields: Fields) -> Self {
        let id = id.into();
        Self {
            raw_id: Value::String(id.to_string()),
            id,
            fields,
        }
    }

    pub fn id(&self) -> &RecordId {
        &self.id
    }

    /// All fields except the identifier, in store order
    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Split a store object into identifier and remaining fields
    pub fn from_json(value: Value, id_field: &str) -> Result<Self, RemoteError> {
        let Value::Object(mut fields) = value else {
            return Err(RemoteError::InvalidPayload(
                "record is not a JSON object".to_string(),
            ));
        };

        let raw_id = fields.shift_remove(id_field).ok_or_else(|| {
            RemoteError::InvalidPayload(format!("record is missing '{}'", id_field))
        })?;
        let id = RecordId::from_json(&raw_id).ok_or_else(|| {
            RemoteError::InvalidPayload(format!("record has unusable '{}': {}", id_field, raw_id))
        })?;

        Ok(Self {
            id,
            raw_id,
            fields,
        })
    }

    /// Render back to a store object with the identifier first, in its
    /// original JSON type
    pub fn to_json(&self, id_field: &str) -> Value {
        let mut object = Map::with_capacity(self.fields.len() + 1);
        object.insert(id_field.to_string(), self.raw_id.clone());
        for (key, value) in &self.fields {
            object.insert(key.clone(), value.clone());
        }
        Value::Object(object)
    }
}

/// Full ordered result of one successful `fetch_all`
///
/// Never patched in place; a mutation produces a new snapshot via refetch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    records: Vec<Record>,
}

impl Snapshot {
    /// Build a snapshot, rejecting duplicate identifiers
    pub fn new(records: Vec<Record>) -> Result<Self, RemoteError> {
        let mut seen = HashSet::with_capacity(records.len());
        for record in &records {
            if !seen.insert(record.id()) {
                return Err(RemoteError::InvalidPayload(format!(
                    "duplicate record identifier '{}'",
                    record.id()
                )));
            }
        }
        Ok(Self { records })
    }

    /// Decode a `GET` list response
    pub fn from_payload(payload: Value, id_field: &str) -> Result<Self, RemoteError> {
        let Value::Array(items) = payload else {
            return Err(RemoteError::InvalidPayload(
                "expected a JSON array of records".to_string(),
            ));
        };

        let records = items
            .into_iter()
            .map(|item| Record::from_json(item, id_field))
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(records)
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &RecordId) -> Option<&Record> {
        self.records.iter().find(|r| r.id() == id)
    }

    pub fn contains(&self, id: &RecordId) -> bool {
        self.get(id).is_some()
    }

    pub fn ids(&self) -> impl Iterator<Item = &RecordId> {
        self.records.iter().map(Record::id)
    }

    /// Field names in order of first appearance across all records
    pub fn columns(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut columns = Vec::new();
        for record in &self.records {
            for key in record.fields().keys() {
                if seen.insert(key.as_str()) {
                    columns.push(key.clone());
                }
            }
        }
        columns
    }
}

/// Shared read-only handle handed out by the cache
pub type SharedSnapshot = Arc<Snapshot>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_from_json_splits_identifier() {
        let record = Record::from_json(
            json!({"name": "Ada", "id": "7", "email": "ada@example.com"}),
            "id",
        )
        .unwrap();

        assert_eq!(record.id().as_str(), "7");
        assert_eq!(
            record.fields().keys().collect::<Vec<_>>(),
            vec!["name", "email"]
        );
    }

    #[test]
    fn test_record_numeric_identifier() {
        let record = Record::from_json(json!({"id": 42, "name": "Bo"}), "id").unwrap();
        assert_eq!(record.id(), &RecordId::from("42"));
    }

    #[test]
    fn test_record_missing_identifier() {
        let err = Record::from_json(json!({"name": "Bo"}), "id").unwrap_err();
        assert!(matches!(err, RemoteError::InvalidPayload(_)));

        let err = Record::from_json(json!({"id": null}), "id").unwrap_err();
        assert!(matches!(err, RemoteError::InvalidPayload(_)));
    }

    #[test]
    fn test_record_to_json_puts_identifier_first() {
        let record = Record::from_json(json!({"name": "Ada", "_id": "x1"}), "_id").unwrap();
        let value = record.to_json("_id");
        let keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["_id", "name"]);
    }

    #[test]
    fn test_to_json_keeps_identifier_type() {
        let numeric = Record::from_json(json!({"id": 42, "name": "Bo"}), "id").unwrap();
        assert_eq!(numeric.to_json("id"), json!({"id": 42, "name": "Bo"}));

        let text = Record::from_json(json!({"id": "42", "name": "Bo"}), "id").unwrap();
        assert_eq!(text.to_json("id"), json!({"id": "42", "name": "Bo"}));
        assert_eq!(numeric.id(), text.id());
    }

    #[test]
    fn test_snapshot_rejects_duplicates() {
        let err = Snapshot::from_payload(json!([{"id": 1}, {"id": "1"}]), "id").unwrap_err();
        assert!(matches!(err, RemoteError::InvalidPayload(_)));
    }

    #[test]
    fn test_snapshot_rejects_non_array() {
        let err = Snapshot::from_payload(json!({"data": []}), "id").unwrap_err();
        assert!(matches!(err, RemoteError::InvalidPayload(_)));
    }

    #[test]
    fn test_snapshot_columns_in_first_seen_order() {
        let snapshot = Snapshot::from_payload(
            json!([
                {"id": 1, "name": "Ada", "email": "a@x"},
                {"id": 2, "name": "Bo", "phone": "555"},
            ]),
            "id",
        )
        .unwrap();

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.columns(), vec!["name", "email", "phone"]);
        assert!(snapshot.contains(&RecordId::from("2")));
        assert!(!snapshot.contains(&RecordId::from("3")));
    }
}
