//! Concurrent delete of the selected records

use std::collections::BTreeMap;

use futures::future::join_all;
use log::{info, warn};

use crate::api::client::RosterClient;
use crate::api::models::RecordId;
use crate::error::{RemoteError, Result, RosterError};
use crate::roster::cache::{Invalidator, MutationIntent};
use crate::roster::selection::SelectionTracker;

#[derive(Debug, Clone, PartialEq)]
pub enum DeleteOutcome {
    Deleted,
    Failed(RemoteError),
}

impl DeleteOutcome {
    pub fn is_deleted(&self) -> bool {
        matches!(self, DeleteOutcome::Deleted)
    }
}

/// Per-identifier outcome of a batch delete
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeleteReport {
    pub outcomes: BTreeMap<RecordId, DeleteOutcome>,
}

impl DeleteReport {
    pub fn deleted(&self) -> impl Iterator<Item = &RecordId> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| outcome.is_deleted())
            .map(|(id, _)| id)
    }

    pub fn failed(&self) -> impl Iterator<Item = (&RecordId, &RemoteError)> {
        self.outcomes.iter().filter_map(|(id, outcome)| match outcome {
            DeleteOutcome::Failed(err) => Some((id, err)),
            DeleteOutcome::Deleted => None,
        })
    }

    pub fn deleted_count(&self) -> usize {
        self.deleted().count()
    }

    pub fn failed_count(&self) -> usize {
        self.failed().count()
    }

    pub fn all_deleted(&self) -> bool {
        self.outcomes.values().all(DeleteOutcome::is_deleted)
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

pub struct BatchDeleteOrchestrator<'a> {
    client: &'a dyn RosterClient,
    invalidator: &'a Invalidator,
}

impl<'a> BatchDeleteOrchestrator<'a> {
    pub fn new(client: &'a dyn RosterClient, invalidator: &'a Invalidator) -> Self {
        Self {
            client,
            invalidator,
        }
    }

    /// Delete every selected record at once and wait for all of them.
    ///
    /// Individual failures land in the report. Once everything settles the
    /// cache is invalidated exactly once and the selection is cleared,
    /// whatever the outcomes.
    pub async fn delete_selected(&self, selection: &mut SelectionTracker) -> Result<DeleteReport> {
        if selection.is_empty() {
            return Err(RosterError::EmptySelection);
        }

        let ids = selection.to_vec();
        let results = join_all(ids.iter().map(|id| self.client.delete_one(id))).await;

        let mut report = DeleteReport::default();
        for (id, result) in ids.into_iter().zip(results) {
            let outcome = match result {
                Ok(()) => DeleteOutcome::Deleted,
                Err(err) => {
                    warn!("Failed to delete record {}: {}", id, err);
                    DeleteOutcome::Failed(err)
                }
            };
            report.outcomes.insert(id, outcome);
        }

        info!(
            "Batch delete settled: {} deleted, {} failed",
            report.deleted_count(),
            report.failed_count()
        );

        self.invalidator.invalidate(MutationIntent::BatchDelete { ids: report.len() });
        selection.clear();

        Ok(report)
    }
}
