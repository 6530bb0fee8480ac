//! Selected record identifiers, bounded by the current snapshot

use std::collections::{BTreeSet, HashSet};

use log::debug;

use crate::api::models::{RecordId, Snapshot};

/// Set of selected identifiers
///
/// Always a subset of the identifiers in the last snapshot it was given.
/// Operations on unknown identifiers are no-ops.
#[derive(Debug, Clone, Default)]
pub struct SelectionTracker {
    known: HashSet<RecordId>,
    selected: BTreeSet<RecordId>,
}

impl SelectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let mut tracker = Self::new();
        tracker.replace_snapshot(snapshot);
        tracker
    }

    /// Returns true if the identifier is now selected
    pub fn select(&mut self, id: &RecordId) -> bool {
        if !self.known.contains(id) {
            debug!("Ignoring selection of unknown record {}", id);
            return false;
        }
        self.selected.insert(id.clone());
        true
    }

    /// Returns true if the identifier was selected
    pub fn deselect(&mut self, id: &RecordId) -> bool {
        self.selected.remove(id)
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }

    /// Select every record in the snapshot, or none
    pub fn toggle_all(&mut self, selected: bool) {
        if selected {
            self.selected = self.known.iter().cloned().collect();
        } else {
            self.selected.clear();
        }
    }

    /// Adopt a new snapshot and prune identifiers it no longer contains.
    /// Returns how many selections were dropped.
    pub fn replace_snapshot(&mut self, snapshot: &Snapshot) -> usize {
        self.known = snapshot.ids().cloned().collect();
        let before = self.selected.len();
        self.selected.retain(|id| self.known.contains(id));
        let pruned = before - self.selected.len();
        if pruned > 0 {
            debug!("Pruned {} stale selections", pruned);
        }
        pruned
    }

    pub fn is_selected(&self, id: &RecordId) -> bool {
        self.selected.contains(id)
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &RecordId> {
        self.selected.iter()
    }

    pub fn to_vec(&self) -> Vec<RecordId> {
        self.selected.iter().cloned().collect()
    }
}
