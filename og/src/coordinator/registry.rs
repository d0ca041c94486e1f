//! Bookkeeping of what the coordinator installed on the device

use std::collections::BTreeMap;

use tracing::debug;

/// Object kinds in the order their datasets were loaded
///
/// Index `i` always matches the device's object-kind index `i`, and the
/// kind's tracker slot is `-i`.
#[derive(Debug, Default, Clone)]
pub struct TrackedKindRegistry {
    names: Vec<String>,
}

impl TrackedKindRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracker slot of the kind at `index`
    pub fn slot_for(index: usize) -> i32 {
        -(index as i32)
    }

    /// Slot the next loaded kind will occupy
    pub fn next_slot(&self) -> i32 {
        Self::slot_for(self.names.len())
    }

    /// Append a kind, returning its index
    pub fn push(&mut self, name: &str) -> usize {
        debug!(%name, "TrackedKindRegistry::push: called");
        self.names.push(name.to_string());
        self.names.len() - 1
    }

    /// Drop the most recently pushed kind if it is `name`
    pub fn pop_if(&mut self, name: &str) -> bool {
        debug!(%name, "TrackedKindRegistry::pop_if: called");
        if self.names.last().is_some_and(|last| last == name) {
            self.names.pop();
            true
        } else {
            false
        }
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn clear(&mut self) {
        debug!(count = self.names.len(), "TrackedKindRegistry::clear: called");
        self.names.clear();
    }
}

/// Gestures registered on the device, keyed by name
#[derive(Debug, Default, Clone)]
pub struct GestureTable {
    entries: BTreeMap<String, Vec<i32>>,
}

impl GestureTable {
    /// Insert or replace a gesture; returns true if the name was new
    pub fn upsert(&mut self, name: &str, keypoints: &[i32]) -> bool {
        debug!(%name, ?keypoints, "GestureTable::upsert: called");
        self.entries.insert(name.to_string(), keypoints.to_vec()).is_none()
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn entries(&self) -> Vec<(String, Vec<i32>)> {
        self.entries.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
