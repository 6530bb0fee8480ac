//! Core Operation types for roster store calls

use serde::Serialize;
use serde_json::Value;

use crate::api::models::{Fields, RecordId};

/// Represents a single call that can be executed against the roster store
#[derive(Debug, Clone, Serialize)]
pub enum Operation {
    /// List every record in the collection
    FetchAll,
    /// Create many records in one request
    CreateMany {
        /// Field maps without identifiers; the store assigns them
        records: Vec<Fields>,
    },
    /// Replace the provided fields of one record
    UpdateOne {
        id: RecordId,
        /// Full edited field set, not a sparse patch
        fields: Fields,
    },
    /// Delete one record
    DeleteOne { id: RecordId },
}

impl Operation {
    pub fn fetch_all() -> Self {
        Self::FetchAll
    }

    pub fn create_many(records: Vec<Fields>) -> Self {
        Self::CreateMany { records }
    }

    pub fn update_one(id: RecordId, fields: Fields) -> Self {
        Self::UpdateOne { id, fields }
    }

    pub fn delete_one(id: RecordId) -> Self {
        Self::DeleteOne { id }
    }

    /// Get the HTTP method for this operation
    pub fn http_method(&self) -> &'static str {
        match self {
            Self::FetchAll => "GET",
            Self::CreateMany { .. } => "POST",
            Self::UpdateOne { .. } => "PUT",
            Self::DeleteOne { .. } => "DELETE",
        }
    }

    /// Get the operation type as a string
    pub fn operation_type(&self) -> &'static str {
        match self {
            Self::FetchAll => "fetch_all",
            Self::CreateMany { .. } => "create_many",
            Self::UpdateOne { .. } => "update_one",
            Self::DeleteOne { .. } => "delete_one",
        }
    }

    /// Record targeted by this operation, if any
    pub fn record_id(&self) -> Option<&RecordId> {
        match self {
            Self::UpdateOne { id, .. } | Self::DeleteOne { id } => Some(id),
            Self::FetchAll | Self::CreateMany { .. } => None,
        }
    }

    /// Whether repeating the call cannot change the outcome.
    /// Only idempotent operations are retried automatically.
    pub fn is_idempotent(&self) -> bool {
        !matches!(self, Self::CreateMany { .. })
    }

    /// Path relative to the store's base URL
    pub fn path(&self, collection: &str) -> String {
        let collection = collection.trim_matches('/');
        match self.record_id() {
            Some(id) => format!("{}/{}", collection, urlencoding::encode(id.as_str())),
            None => collection.to_string(),
        }
    }

    /// JSON request body, if the operation sends one
    pub fn body(&self) -> Option<Value> {
        match self {
            Self::CreateMany { records } => Some(Value::Array(
                records.iter().cloned().map(Value::Object).collect(),
            )),
            Self::UpdateOne { fields, .. } => Some(Value::Object(fields.clone())),
            Self::FetchAll | Self::DeleteOne { .. } => None,
        }
    }
}
