//! Uncommitted user intentions and pending reboots.
//!
//! Pure bookkeeping, no backend calls.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tweak_common::TweakId;

/// A staged option that has not been committed yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingChange {
    pub tweak_id: TweakId,
    pub option_index: usize,
}

/// Desired option per tweak, ordered by id
#[derive(Debug, Clone, Default)]
pub struct StagingMap {
    entries: BTreeMap<TweakId, usize>,
}

impl StagingMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage `option_index`, or clear the entry when it equals `current`.
    ///
    /// Returns true if an entry exists afterwards.
    pub fn set(&mut self, id: &str, option_index: usize, current: Option<usize>) -> bool {
        if current == Some(option_index) {
            self.entries.remove(id);
            return false;
        }
        self.entries.insert(id.to_string(), option_index);
        true
    }

    pub fn get(&self, id: &str) -> Option<usize> {
        self.entries.get(id).copied()
    }

    pub fn has(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn clear(&mut self, id: &str) -> Option<usize> {
        self.entries.remove(id)
    }

    /// Clear the entry only if it still holds `option_index`
    pub fn clear_if_equal(&mut self, id: &str, option_index: usize) -> bool {
        if self.entries.get(id) == Some(&option_index) {
            self.entries.remove(id);
            true
        } else {
            false
        }
    }

    /// Remove every entry matching `predicate`. Returns how many went.
    pub fn clear_many<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&str, usize) -> bool,
    {
        let before = self.entries.len();
        self.entries.retain(|id, option| !predicate(id, *option));
        before - self.entries.len()
    }

    pub fn clear_all(&mut self) -> usize {
        let n = self.entries.len();
        self.entries.clear();
        n
    }

    /// Operation list for a batch commit
    pub fn snapshot(&self) -> Vec<(TweakId, usize)> {
        self.entries
            .iter()
            .map(|(id, option)| (id.clone(), *option))
            .collect()
    }

    pub fn pending_changes(&self) -> Vec<PendingChange> {
        self.entries
            .iter()
            .map(|(id, option)| PendingChange {
                tweak_id: id.clone(),
                option_index: *option,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Tweaks whose last successful operation needs a restart. Session scoped.
#[derive(Debug, Clone, Default)]
pub struct RebootSet {
    ids: BTreeSet<TweakId>,
}

impl RebootSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, id: &str) -> bool {
        self.ids.insert(id.to_string())
    }

    pub fn remove(&mut self, id: &str) -> bool {
        self.ids.remove(id)
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn needs_reboot(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn ids(&self) -> Vec<TweakId> {
        self.ids.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
