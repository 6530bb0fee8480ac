//! In-memory store used by the engine tests

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Semaphore;

use crate::api::client::RosterClient;
use crate::api::models::{Fields, Record, RecordId, Snapshot};
use crate::error::RemoteError;

/// Build a record from string pairs
pub fn record(id: &str, fields: &[(&str, &str)]) -> Record {
    Record::new(id, fields_of(fields))
}

pub fn fields_of(fields: &[(&str, &str)]) -> Fields {
    fields
        .iter()
        .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    FetchAll,
    CreateMany(Vec<Fields>),
    UpdateOne(RecordId, Fields),
    DeleteOne(RecordId),
}

#[derive(Debug, Default)]
struct MockState {
    records: Vec<Record>,
    next_id: u64,
    calls: Vec<Call>,
    failing_deletes: HashSet<RecordId>,
    fail_fetches: bool,
    fail_creates: bool,
    fail_updates: bool,
}

/// Store double recording every call
///
/// A gated mock blocks each `fetch_all` until the test releases it.
pub struct MockClient {
    state: Mutex<MockState>,
    fetch_gate: Option<Semaphore>,
}

impl MockClient {
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            state: Mutex::new(MockState {
                next_id: 1000,
                records,
                ..MockState::default()
            }),
            fetch_gate: None,
        }
    }

    pub fn gated(records: Vec<Record>) -> Self {
        Self {
            fetch_gate: Some(Semaphore::new(0)),
            ..Self::new(records)
        }
    }

    pub fn release_fetches(&self, count: usize) {
        if let Some(gate) = &self.fetch_gate {
            gate.add_permits(count);
        }
    }

    pub fn fail_fetches(&self, fail: bool) {
        self.state.lock().unwrap().fail_fetches = fail;
    }

    pub fn fail_creates(&self, fail: bool) {
        self.state.lock().unwrap().fail_creates = fail;
    }

    pub fn fail_updates(&self, fail: bool) {
        self.state.lock().unwrap().fail_updates = fail;
    }

    pub fn fail_delete(&self, id: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_deletes
            .insert(RecordId::from(id));
    }

    /// Drop a record behind the engine's back, as another client would
    pub fn remove(&self, id: &str) {
        let id = RecordId::from(id);
        self.state.lock().unwrap().records.retain(|r| r.id() != &id);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::FetchAll))
            .count()
    }

    pub fn records(&self) -> Vec<Record> {
        self.state.lock().unwrap().records.clone()
    }
}

fn server_error() -> RemoteError {
    RemoteError::Status {
        status: 500,
        body: "internal error".to_string(),
    }
}

#[async_trait]
impl RosterClient for MockClient {
    async fn fetch_all(&self) -> Result<Snapshot, RemoteError> {
        if let Some(gate) = &self.fetch_gate {
            gate.acquire()
                .await
                .map_err(|e| RemoteError::Transport(e.to_string()))?
                .forget();
        }
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::FetchAll);
        if state.fail_fetches {
            return Err(server_error());
        }
        Snapshot::new(state.records.clone())
    }

    async fn create_many(&self, records: &[Fields]) -> Result<usize, RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::CreateMany(records.to_vec()));
        if state.fail_creates {
            return Err(server_error());
        }
        for fields in records {
            state.next_id += 1;
            let id = state.next_id.to_string();
            state.records.push(Record::new(id, fields.clone()));
        }
        Ok(records.len())
    }

    async fn update_one(&self, id: &RecordId, fields: &Fields) -> Result<(), RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::UpdateOne(id.clone(), fields.clone()));
        if state.fail_updates {
            return Err(server_error());
        }
        let position = state
            .records
            .iter()
            .position(|r| r.id() == id)
            .ok_or_else(|| RemoteError::Status {
                status: 404,
                body: "not found".to_string(),
            })?;
        let mut merged = state.records[position].fields().clone();
        for (key, value) in fields {
            merged.insert(key.clone(), value.clone());
        }
        state.records[position] = Record::new(id.clone(), merged);
        Ok(())
    }

    async fn delete_one(&self, id: &RecordId) -> Result<(), RemoteError> {
        // Let sibling deletes interleave
        tokio::task::yield_now().await;
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::DeleteOne(id.clone()));
        if state.failing_deletes.contains(id) {
            return Err(server_error());
        }
        let before = state.records.len();
        state.records.retain(|r| r.id() != id);
        if state.records.len() == before {
            return Err(RemoteError::Status {
                status: 404,
                body: "not found".to_string(),
            });
        }
        Ok(())
    }
}
