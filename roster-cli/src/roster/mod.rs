//! Roster synchronization engine
//!
//! Three writers mutate the remote store: [`ImportPipeline`],
//! [`RecordEditor`] and [`BatchDeleteOrchestrator`]. None of them touch the
//! cached data; each settled mutation sends one invalidation to the cache
//! worker, which refetches the whole roster. [`Roster`] ties the pieces
//! together for a front end.

pub mod cache;
pub mod delete;
pub mod editor;
pub mod import;
pub mod parser;
pub mod selection;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::{CacheStatus, Invalidator, MutationIntent, RosterView};
pub use delete::{BatchDeleteOrchestrator, DeleteOutcome, DeleteReport};
pub use editor::{EditCommit, EditorState, OpenRecord, RecordEditor};
pub use import::{ImportPipeline, ImportReport};
pub use parser::parse_records;
pub use selection::SelectionTracker;

use std::sync::Arc;

use log::{debug, warn};
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::api::client::RosterClient;
use crate::api::models::RecordId;
use crate::error::{Result, RosterError};

/// Front-end facing handle on the engine
pub struct Roster {
    client: Arc<dyn RosterClient>,
    invalidator: Invalidator,
    view: watch::Receiver<RosterView>,
    seen_generation: u64,
    selection: SelectionTracker,
    editor: RecordEditor,
    worker: JoinHandle<()>,
}

impl Roster {
    /// Start the cache worker and request the initial fetch
    pub fn connect<I, S>(client: Arc<dyn RosterClient>, hidden_fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let (invalidator, view, worker) = cache::spawn_cache(Arc::clone(&client));
        invalidator.request_fetch()?;

        Ok(Self {
            client,
            invalidator,
            view,
            seen_generation: 0,
            selection: SelectionTracker::new(),
            editor: RecordEditor::new(hidden_fields),
            worker,
        })
    }

    /// Latest published cache view
    pub fn view(&self) -> RosterView {
        self.view.borrow().clone()
    }

    pub fn refresh(&self) -> Result<()> {
        self.invalidator.request_fetch()
    }

    /// Wait until every signal sent so far is handled and no fetch is in
    /// flight, then adopt the resulting snapshot
    pub async fn settled(&mut self) -> Result<RosterView> {
        let sent = self.invalidator.sent();
        let view = self
            .view
            .wait_for(|v| v.signals_handled >= sent && v.status != CacheStatus::Fetching)
            .await
            .map_err(|_| RosterError::CacheClosed)?
            .clone();
        self.sync();
        Ok(view)
    }

    /// Prune selection and editor against a newly published snapshot
    pub fn sync(&mut self) {
        let view = self.view.borrow_and_update().clone();
        if view.generation == self.seen_generation {
            return;
        }
        self.seen_generation = view.generation;

        if let Some(snapshot) = view.snapshot {
            debug!("Adopting roster generation {}", view.generation);
            self.selection.replace_snapshot(&snapshot);
            self.editor.reconcile(&snapshot);
        }
    }

    pub fn selection(&mut self) -> &SelectionTracker {
        self.sync();
        &self.selection
    }

    pub fn select(&mut self, id: &RecordId) -> bool {
        self.sync();
        self.selection.select(id)
    }

    pub fn deselect(&mut self, id: &RecordId) -> bool {
        self.sync();
        self.selection.deselect(id)
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    pub fn toggle_all(&mut self, selected: bool) {
        self.sync();
        self.selection.toggle_all(selected);
    }

    pub async fn submit_import(&self, bytes: &[u8]) -> Result<ImportReport> {
        ImportPipeline::new(self.client.as_ref(), &self.invalidator)
            .submit(bytes)
            .await
    }

    /// Open the editor on a record from the current snapshot.
    /// Returns the draft that was discarded, if another record was open.
    pub fn open_editor(&mut self, id: &RecordId) -> Result<Option<OpenRecord>> {
        self.sync();
        let view = self.view.borrow().clone();
        let record = view
            .snapshot
            .as_deref()
            .and_then(|snapshot| snapshot.get(id))
            .ok_or_else(|| RosterError::UnknownRecord(id.clone()))?;
        Ok(self.editor.open(record))
    }

    pub fn editor(&mut self) -> &RecordEditor {
        self.sync();
        &self.editor
    }

    pub fn set_field(&mut self, name: &str, value: Value) -> Result<()> {
        self.sync();
        self.editor.set_field(name, value)
    }

    pub fn set_field_text(&mut self, name: &str, text: &str) -> Result<()> {
        self.sync();
        self.editor.set_field_text(name, text)
    }

    pub fn close_editor(&mut self) -> Option<OpenRecord> {
        self.editor.close()
    }

    /// Commit the open draft. Fails with `NoOpenRecord` if its record left
    /// the latest snapshot.
    pub async fn commit_edit(&mut self) -> Result<EditCommit> {
        self.sync();
        self.editor
            .commit(self.client.as_ref(), &self.invalidator)
            .await
    }

    /// Delete the selection as pruned against the latest snapshot
    pub async fn delete_selected(&mut self) -> Result<DeleteReport> {
        self.sync();
        BatchDeleteOrchestrator::new(self.client.as_ref(), &self.invalidator)
            .delete_selected(&mut self.selection)
            .await
    }

    /// Stop the cache worker once its in-flight fetch settles
    pub async fn shutdown(self) {
        let Self {
            invalidator,
            worker,
            ..
        } = self;
        drop(invalidator);
        if let Err(e) = worker.await {
            warn!("Roster cache worker ended abnormally: {}", e);
        }
    }
}
