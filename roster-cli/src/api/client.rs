//! Remote roster client
//!
//! [`RosterClient`] is the boundary between the engine and the store of
//! record. [`HttpRosterClient`] talks to a REST collection
//! (`GET/POST /{collection}`, `PUT/DELETE /{collection}/{id}`).

use std::time::Instant;

use async_trait::async_trait;
use log::{debug, trace};
use serde_json::Value;

use super::models::{Fields, RecordId, Snapshot};
use super::operations::Operation;
use super::resilience::{ResilienceConfig, RetryPolicy};
use crate::config::Config;
use crate::error::RemoteError;

/// The four calls the engine may make against the store
#[async_trait]
pub trait RosterClient: Send + Sync {
    /// Fetch every record, in store order
    async fn fetch_all(&self) -> Result<Snapshot, RemoteError>;

    /// Create all records in one call; returns how many the store created
    async fn create_many(&self, records: &[Fields]) -> Result<usize, RemoteError>;

    /// Replace the provided fields of one record
    async fn update_one(&self, id: &RecordId, fields: &Fields) -> Result<(), RemoteError>;

    async fn delete_one(&self, id: &RecordId) -> Result<(), RemoteError>;
}

/// REST implementation of [`RosterClient`] on top of reqwest
#[derive(Debug, Clone)]
pub struct HttpRosterClient {
    http: reqwest::Client,
    base_url: String,
    collection: String,
    id_field: String,
    resilience: ResilienceConfig,
}

impl HttpRosterClient {
    pub fn new(
        base_url: impl Into<String>,
        collection: impl Into<String>,
        id_field: impl Into<String>,
        resilience: ResilienceConfig,
    ) -> Result<Self, RemoteError> {
        let http = reqwest::Client::builder()
            .timeout(resilience.timeout)
            .build()
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            collection: collection.into(),
            id_field: id_field.into(),
            resilience,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, RemoteError> {
        Self::new(
            config.api.base_url.clone(),
            config.api.collection.clone(),
            config.api.id_field.clone(),
            config.resilience(),
        )
    }

    pub fn id_field(&self) -> &str {
        &self.id_field
    }

    /// Absolute URL for an operation
    pub fn url_for(&self, operation: &Operation) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            operation.path(&self.collection)
        )
    }

    /// Execute an operation, retrying only when it is idempotent
    pub async fn execute(&self, operation: &Operation) -> Result<Value, RemoteError> {
        if operation.is_idempotent() {
            RetryPolicy::new(self.resilience.retry.clone())
                .execute(operation.operation_type(), || self.send(operation))
                .await
        } else {
            self.send(operation).await
        }
    }

    async fn send(&self, operation: &Operation) -> Result<Value, RemoteError> {
        let url = self.url_for(operation);
        let start = Instant::now();

        let request = match operation {
            Operation::FetchAll => self.http.get(&url),
            Operation::CreateMany { .. } => self.http.post(&url),
            Operation::UpdateOne { .. } => self.http.put(&url),
            Operation::DeleteOne { .. } => self.http.delete(&url),
        };
        let request = match operation.body() {
            Some(body) => request.json(&body),
            None => request,
        };

        let response = request
            .send()
            .await
            .map_err(|e| RemoteError::from_reqwest(e, self.resilience.timeout))?;
        let status = response.status();

        if self.resilience.monitoring.request_logging {
            debug!(
                "{} {} -> {} in {:?}",
                operation.http_method(),
                url,
                status.as_u16(),
                start.elapsed()
            );
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| RemoteError::from_reqwest(e, self.resilience.timeout))?;
        trace!("{} response body: {} bytes", operation.operation_type(), bytes.len());

        // Mutations may answer with an empty or plain-text body
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }
}

/// Number of created records reported by a bulk-create response
///
/// Stores usually echo the created documents; anything else counts as the
/// whole batch having been accepted.
pub fn created_count(response: &Value, submitted: usize) -> usize {
    match response {
        Value::Array(items) => items.len(),
        Value::Object(map) => map
            .get("insertedCount")
            .or_else(|| map.get("count"))
            .and_then(Value::as_u64)
            .map(|n| n as usize)
            .unwrap_or(submitted),
        _ => submitted,
    }
}

#[async_trait]
impl RosterClient for HttpRosterClient {
    async fn fetch_all(&self) -> Result<Snapshot, RemoteError> {
        let payload = self.execute(&Operation::fetch_all()).await?;
        Snapshot::from_payload(payload, &self.id_field)
    }

    async fn create_many(&self, records: &[Fields]) -> Result<usize, RemoteError> {
        let response = self
            .execute(&Operation::create_many(records.to_vec()))
            .await?;
        Ok(created_count(&response, records.len()))
    }

    async fn update_one(&self, id: &RecordId, fields: &Fields) -> Result<(), RemoteError> {
        self.execute(&Operation::update_one(id.clone(), fields.clone()))
            .await
            .map(|_| ())
    }

    async fn delete_one(&self, id: &RecordId) -> Result<(), RemoteError> {
        self.execute(&Operation::delete_one(id.clone()))
            .await
            .map(|_| ())
    }
}
