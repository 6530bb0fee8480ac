//! Single-record edit panel as an explicit state machine

use std::collections::HashSet;

use log::{debug, info, warn};
use serde_json::Value;

use crate::api::client::RosterClient;
use crate::api::models::{Fields, Record, RecordId, Snapshot};
use crate::error::{Result, RosterError};
use crate::roster::cache::{Invalidator, MutationIntent};

/// A record bound to an editable draft
#[derive(Debug, Clone, PartialEq)]
pub struct OpenRecord {
    pub id: RecordId,
    pub original: Fields,
    pub draft: Fields,
}

impl OpenRecord {
    /// Field names whose draft value differs from the original
    pub fn changed_fields(&self) -> Vec<String> {
        self.draft
            .iter()
            .filter(|(name, value)| self.original.get(*name) != Some(*value))
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn is_dirty(&self) -> bool {
        self.draft != self.original
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum EditorState {
    #[default]
    Closed,
    Open(OpenRecord),
}

/// Result of a committed edit
#[derive(Debug, Clone, PartialEq)]
pub struct EditCommit {
    pub id: RecordId,
    pub changed: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RecordEditor {
    state: EditorState,
    hidden_fields: HashSet<String>,
}

impl RecordEditor {
    /// `hidden_fields` are store bookkeeping fields left out of the draft
    pub fn new<I, S>(hidden_fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            state: EditorState::Closed,
            hidden_fields: hidden_fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn state(&self) -> &EditorState {
        &self.state
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, EditorState::Open(_))
    }

    pub fn open_id(&self) -> Option<&RecordId> {
        match &self.state {
            EditorState::Open(open) => Some(&open.id),
            EditorState::Closed => None,
        }
    }

    pub fn draft(&self) -> Option<&Fields> {
        match &self.state {
            EditorState::Open(open) => Some(&open.draft),
            EditorState::Closed => None,
        }
    }

    /// Bind the editor to `record`, discarding any draft already open.
    /// Returns the discarded record, if there was one.
    pub fn open(&mut self, record: &Record) -> Option<OpenRecord> {
        let original: Fields = record
            .fields()
            .iter()
            .filter(|(name, _)| !self.hidden_fields.contains(*name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        let next = EditorState::Open(OpenRecord {
            id: record.id().clone(),
            draft: original.clone(),
            original,
        });
        debug!("Editor opened on record {}", record.id());

        match std::mem::replace(&mut self.state, next) {
            EditorState::Open(previous) => {
                if previous.is_dirty() {
                    warn!(
                        "Discarding uncommitted changes to record {} ({})",
                        previous.id,
                        previous.changed_fields().join(", ")
                    );
                }
                Some(previous)
            }
            EditorState::Closed => None,
        }
    }

    pub fn close(&mut self) -> Option<OpenRecord> {
        match std::mem::take(&mut self.state) {
            EditorState::Open(open) => Some(open),
            EditorState::Closed => None,
        }
    }

    /// Set a draft field; only fields already in the draft are accepted
    pub fn set_field(&mut self, name: &str, value: Value) -> Result<()> {
        let EditorState::Open(open) = &mut self.state else {
            return Err(RosterError::NoOpenRecord);
        };
        match open.draft.get_mut(name) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(RosterError::UnknownField {
                id: open.id.clone(),
                field: name.to_string(),
            }),
        }
    }

    /// Set a draft field from user-typed text, keeping the original's type
    /// where the text allows it
    pub fn set_field_text(&mut self, name: &str, text: &str) -> Result<()> {
        let EditorState::Open(open) = &self.state else {
            return Err(RosterError::NoOpenRecord);
        };
        let current = open.original.get(name).unwrap_or(&Value::Null);
        let value = value_from_text(text, current);
        self.set_field(name, value)
    }

    pub fn changed_fields(&self) -> Vec<String> {
        match &self.state {
            EditorState::Open(open) => open.changed_fields(),
            EditorState::Closed => Vec::new(),
        }
    }

    pub fn is_dirty(&self) -> bool {
        match &self.state {
            EditorState::Open(open) => open.is_dirty(),
            EditorState::Closed => false,
        }
    }

    /// Close the editor if its record left the snapshot.
    /// Returns true if it was closed.
    pub fn reconcile(&mut self, snapshot: &Snapshot) -> bool {
        let gone = match &self.state {
            EditorState::Open(open) => !snapshot.contains(&open.id),
            EditorState::Closed => false,
        };
        if gone {
            if let Some(open) = self.close() {
                warn!("Record {} no longer exists, closing editor", open.id);
            }
        }
        gone
    }

    /// Send the full draft with `update_one`
    ///
    /// On success the cache is invalidated and the editor closes. On failure
    /// the editor stays open with the draft intact.
    pub async fn commit(
        &mut self,
        client: &dyn RosterClient,
        invalidator: &Invalidator,
    ) -> Result<EditCommit> {
        let EditorState::Open(open) = &self.state else {
            return Err(RosterError::NoOpenRecord);
        };

        let id = open.id.clone();
        let changed = open.changed_fields();
        client.update_one(&id, &open.draft).await?;

        info!("Updated record {} ({} fields changed)", id, changed.len());
        self.state = EditorState::Closed;
        invalidator.invalidate(MutationIntent::Edit { id: id.clone() });

        Ok(EditCommit { id, changed })
    }
}

/// Interpret typed text using the type of the value it replaces
fn value_from_text(text: &str, original: &Value) -> Value {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }

    match original {
        Value::Number(_) => trimmed
            .parse::<i64>()
            .map(Value::from)
            .ok()
            .or_else(|| {
                trimmed
                    .parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
            })
            .unwrap_or_else(|| Value::String(trimmed.to_string())),
        Value::Bool(_) => match trimmed.to_lowercase().as_str() {
            "true" | "1" | "yes" => Value::Bool(true),
            "false" | "0" | "no" => Value::Bool(false),
            _ => Value::String(trimmed.to_string()),
        },
        _ => Value::String(trimmed.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::cache::spawn_cache;
    use crate::roster::testing::{Call, MockClient, fields_of, record};
    use serde_json::json;
    use std::sync::Arc;

    fn editor() -> RecordEditor {
        RecordEditor::new(["__v"])
    }

    fn student(id: &str, name: &str) -> Record {
        let mut fields = fields_of(&[("name", name), ("email", "x@example.com")]);
        fields.insert("__v".to_string(), json!(0));
        Record::new(id, fields)
    }

    #[test]
    fn test_open_excludes_hidden_fields() {
        let mut editor = editor();
        assert!(editor.open(&student("1", "Ada")).is_none());

        let draft = editor.draft().unwrap();
        assert_eq!(draft.keys().collect::<Vec<_>>(), vec!["name", "email"]);
        assert_eq!(editor.open_id(), Some(&RecordId::from("1")));
        assert!(!editor.is_dirty());
    }

    #[test]
    fn test_switching_records_discards_draft() {
        let mut editor = editor();
        editor.open(&student("1", "Ada"));
        editor.set_field("name", json!("Ada L.")).unwrap();

        let discarded = editor.open(&student("2", "Bo")).unwrap();

        assert_eq!(discarded.id, RecordId::from("1"));
        assert_eq!(discarded.changed_fields(), vec!["name"]);
        assert_eq!(editor.open_id(), Some(&RecordId::from("2")));
        assert_eq!(editor.draft().unwrap()["name"], json!("Bo"));
        assert!(!editor.is_dirty());
    }

    #[test]
    fn test_set_field_rejects_unknown_and_closed() {
        let mut editor = editor();
        assert!(matches!(
            editor.set_field("name", json!("x")),
            Err(RosterError::NoOpenRecord)
        ));

        editor.open(&student("1", "Ada"));
        assert!(matches!(
            editor.set_field("nickname", json!("x")),
            Err(RosterError::UnknownField { .. })
        ));
        assert!(matches!(
            editor.set_field("__v", json!(3)),
            Err(RosterError::UnknownField { .. })
        ));
    }

    #[test]
    fn test_set_field_text_keeps_type() {
        let mut editor = editor();
        let mut fields = fields_of(&[("name", "Ada")]);
        fields.insert("roll".to_string(), json!(4));
        fields.insert("active".to_string(), json!(true));
        editor.open(&Record::new("1", fields));

        editor.set_field_text("roll", " 12 ").unwrap();
        editor.set_field_text("active", "no").unwrap();
        editor.set_field_text("name", "").unwrap();

        let draft = editor.draft().unwrap();
        assert_eq!(draft["roll"], json!(12));
        assert_eq!(draft["active"], json!(false));
        assert_eq!(draft["name"], Value::Null);
        assert_eq!(editor.changed_fields(), vec!["name", "roll", "active"]);
    }

    #[test]
    fn test_value_from_text() {
        assert_eq!(value_from_text("2.5", &json!(1)), json!(2.5));
        assert_eq!(value_from_text("n/a", &json!(1)), json!("n/a"));
        assert_eq!(value_from_text("42", &json!("old")), json!("42"));
        assert_eq!(value_from_text("maybe", &json!(true)), json!("maybe"));
    }

    #[test]
    fn test_reconcile_closes_when_record_gone() {
        let mut editor = editor();
        editor.open(&student("1", "Ada"));

        let still_there = Snapshot::new(vec![student("1", "Ada")]).unwrap();
        assert!(!editor.reconcile(&still_there));
        assert!(editor.is_open());

        let gone = Snapshot::new(vec![student("2", "Bo")]).unwrap();
        assert!(editor.reconcile(&gone));
        assert_eq!(editor.state(), &EditorState::Closed);
    }

    #[tokio::test]
    async fn test_commit_sends_full_draft_and_closes() {
        let client = Arc::new(MockClient::new(vec![student("1", "Ada")]));
        let (invalidator, _view, _worker) = spawn_cache(client.clone());

        let mut editor = editor();
        editor.open(&student("1", "Ada"));
        editor.set_field("email", json!("ada@example.com")).unwrap();

        let commit = editor.commit(client.as_ref(), &invalidator).await.unwrap();

        assert_eq!(commit.id, RecordId::from("1"));
        assert_eq!(commit.changed, vec!["email"]);
        assert!(!editor.is_open());
        assert_eq!(invalidator.sent(), 1);
        let updates: Vec<Call> = client
            .calls()
            .into_iter()
            .filter(|c| !matches!(c, Call::FetchAll))
            .collect();
        assert_eq!(
            updates,
            vec![Call::UpdateOne(
                RecordId::from("1"),
                fields_of(&[("name", "Ada"), ("email", "ada@example.com")])
            )]
        );
    }

    #[tokio::test]
    async fn test_failed_commit_keeps_draft() {
        let client = Arc::new(MockClient::new(vec![student("1", "Ada")]));
        client.fail_updates(true);
        let (invalidator, _view, _worker) = spawn_cache(client.clone());

        let mut editor = editor();
        editor.open(&student("1", "Ada"));
        editor.set_field("name", json!("Ada L.")).unwrap();

        let err = editor.commit(client.as_ref(), &invalidator).await.unwrap_err();

        assert!(matches!(err, RosterError::Remote(_)));
        assert!(editor.is_open());
        assert_eq!(editor.draft().unwrap()["name"], json!("Ada L."));
        assert_eq!(invalidator.sent(), 0);
    }

    #[tokio::test]
    async fn test_commit_without_open_record() {
        let client = Arc::new(MockClient::new(vec![]));
        let (invalidator, _view, _worker) = spawn_cache(client.clone());

        let err = editor()
            .commit(client.as_ref(), &invalidator)
            .await
            .unwrap_err();
        assert!(matches!(err, RosterError::NoOpenRecord));
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_editors_do_not_touch_each_other() {
        let client = Arc::new(MockClient::new(vec![student("1", "Ada"), student("2", "Bo")]));
        let (invalidator, _view, _worker) = spawn_cache(client.clone());

        let mut first = editor();
        let mut second = editor();
        first.open(&student("1", "Ada"));
        second.open(&student("2", "Bo"));
        first.set_field("name", json!("Ada L.")).unwrap();
        second.set_field("name", json!("Bo K.")).unwrap();

        first.commit(client.as_ref(), &invalidator).await.unwrap();

        let records = client.records();
        assert_eq!(records[0].get("name"), Some(&json!("Ada L.")));
        assert_eq!(records[1].get("name"), Some(&json!("Bo")));
        assert!(second.is_dirty());
        assert_eq!(second.draft().unwrap()["name"], json!("Bo K."));
    }
}
