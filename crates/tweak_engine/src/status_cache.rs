//! Authoritative per-tweak status, refreshed from the backend.
//!
//! Every write bumps a version counter published on a watch channel, so
//! derived indexes can detect staleness without diffing. A write that leaves
//! the values unchanged still counts.

use std::collections::HashMap;

use tokio::sync::watch;
use tracing::warn;
use tweak_common::{SystemInfo, TweakStatus};

use crate::backend::TweakBackend;
use crate::catalog::Catalog;
use crate::error::EngineError;

/// Partial update of a status entry. `None` fields are left alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusPatch {
    pub is_applied: Option<bool>,
    pub has_backup: Option<bool>,
    pub current_option_index: Option<Option<usize>>,
    pub error: Option<Option<String>>,
}

impl StatusPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn applied(mut self, is_applied: bool) -> Self {
        self.is_applied = Some(is_applied);
        self
    }

    pub fn backup(mut self, has_backup: bool) -> Self {
        self.has_backup = Some(has_backup);
        self
    }

    pub fn option(mut self, index: Option<usize>) -> Self {
        self.current_option_index = Some(index);
        self
    }

    pub fn clear_error(mut self) -> Self {
        self.error = Some(None);
        self
    }

    fn apply_to(self, status: &mut TweakStatus) {
        if let Some(v) = self.is_applied {
            status.is_applied = v;
        }
        if let Some(v) = self.has_backup {
            status.has_backup = v;
        }
        if let Some(v) = self.current_option_index {
            status.current_option_index = v;
        }
        if let Some(v) = self.error {
            status.error = v;
        }
    }
}

pub struct StatusCache {
    entries: HashMap<String, TweakStatus>,
    version: watch::Sender<u64>,
}

impl StatusCache {
    pub fn new() -> Self {
        let (version, _) = watch::channel(0);
        Self {
            entries: HashMap::new(),
            version,
        }
    }

    /// Ensure every catalog id has an entry, defaulting to "not applied"
    pub fn seed_defaults(&mut self, catalog: &Catalog) {
        let mut added = false;
        for id in catalog.ids() {
            if !self.entries.contains_key(id) {
                self.entries.insert(id.to_string(), TweakStatus::unapplied(id));
                added = true;
            }
        }
        if added {
            self.bump();
        }
    }

    /// Wholesale replacement from a bulk fetch.
    ///
    /// Ids missing from `statuses` get the default entry; statuses for ids
    /// outside the catalog are dropped.
    pub fn replace_all(&mut self, catalog: &Catalog, statuses: Vec<TweakStatus>) {
        self.replace_all_except(catalog, statuses, |_| false);
    }

    /// Wholesale replacement that keeps the current entry of every id for
    /// which `keep` returns true. An operation in flight owns its entry; a
    /// bulk fetch taken before it finished would be stale.
    pub fn replace_all_except<F>(&mut self, catalog: &Catalog, statuses: Vec<TweakStatus>, keep: F)
    where
        F: Fn(&str) -> bool,
    {
        let mut reported: HashMap<String, TweakStatus> = HashMap::with_capacity(statuses.len());
        for status in statuses {
            if catalog.contains(&status.tweak_id) {
                reported.insert(status.tweak_id.clone(), status);
            } else {
                warn!(tweak_id = %status.tweak_id, "Dropping status for tweak not in catalog");
            }
        }

        let mut previous = std::mem::take(&mut self.entries);
        self.entries = catalog
            .ids()
            .map(|id| {
                let kept = if keep(id) { previous.remove(id) } else { None };
                let status = kept
                    .or_else(|| reported.remove(id))
                    .unwrap_or_else(|| TweakStatus::unapplied(id));
                (id.to_string(), status)
            })
            .collect();
        self.bump();
    }

    /// Replace one entry. Returns false if the id is unknown.
    ///
    /// Every write to a known id bumps the version, even if nothing changed.
    pub fn replace(&mut self, status: TweakStatus) -> bool {
        let Some(entry) = self.entries.get_mut(&status.tweak_id) else {
            return false;
        };
        *entry = status;
        self.bump();
        true
    }

    /// Merge a partial patch. Returns false if the id is unknown.
    pub fn update(&mut self, id: &str, patch: StatusPatch) -> bool {
        let Some(entry) = self.entries.get_mut(id) else {
            return false;
        };
        patch.apply_to(entry);
        self.bump();
        true
    }

    pub fn get(&self, id: &str) -> Option<&TweakStatus> {
        self.entries.get(id)
    }

    pub fn current_option(&self, id: &str) -> Option<usize> {
        self.entries.get(id).and_then(|s| s.current_option_index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn version(&self) -> u64 {
        *self.version.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    fn bump(&self) {
        self.version.send_modify(|v| *v += 1);
    }
}

impl Default for StatusCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Bulk status fetch. Fatal on failure.
pub async fn fetch_all(backend: &dyn TweakBackend) -> Result<Vec<TweakStatus>, EngineError> {
    backend
        .get_all_tweak_statuses()
        .await
        .map_err(EngineError::StatusLoad)
}

/// Host facts. Soft on failure: logged and reported as `None`.
pub async fn fetch_system_info(backend: &dyn TweakBackend) -> Option<SystemInfo> {
    match backend.get_system_info().await {
        Ok(info) => Some(info),
        Err(e) => {
            warn!("Failed to get system info: {}", e);
            None
        }
    }
}
