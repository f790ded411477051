//! Engine handle: one per application session.
//!
//! Built once at the composition root and shared by reference. The catalog
//! is set once; everything mutable sits behind a single async lock that is
//! never held across a backend call.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use tokio::sync::{broadcast, watch, Mutex, OnceCell, RwLock};
use tracing::debug;
use tweak_common::{SystemInfo, TweakId};

use crate::backend::TweakBackend;
use crate::catalog::Catalog;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::feedback::Feedback;
use crate::guard::{ErrorMap, LoadingGuard};
use crate::staging::{PendingChange, RebootSet, StagingMap};
use crate::status_cache::StatusCache;
use crate::view::TweakWithStatus;

/// Mutable session state. Written only by the executor and loader.
#[derive(Default)]
pub struct EngineState {
    pub status: StatusCache,
    pub staging: StagingMap,
    pub reboot: RebootSet,
    pub errors: ErrorMap,
    pub system_info: Option<SystemInfo>,
}

impl EngineState {
    /// Drop staged entries that match the applied option
    pub(crate) fn prune_staging(&mut self) -> usize {
        let status = &self.status;
        self.staging
            .clear_many(|id, option| status.current_option(id) == Some(option))
    }
}

pub struct TweakEngine {
    pub(crate) backend: Arc<dyn TweakBackend>,
    pub(crate) catalog: OnceCell<Arc<Catalog>>,
    pub(crate) state: RwLock<EngineState>,
    pub(crate) loading: LoadingGuard,
    pub(crate) status_load: Mutex<()>,
    pub(crate) status_ready: AtomicBool,
    pub(crate) feedback: broadcast::Sender<Feedback>,
    config: EngineConfig,
}

impl TweakEngine {
    pub fn new(backend: Arc<dyn TweakBackend>, config: EngineConfig) -> Self {
        let (feedback, _) = broadcast::channel(config.feedback_capacity.max(1));
        Self {
            backend,
            catalog: OnceCell::new(),
            state: RwLock::new(EngineState::default()),
            loading: LoadingGuard::new(),
            status_load: Mutex::new(()),
            status_ready: AtomicBool::new(false),
            feedback,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Loaded catalog, if phase one has completed
    pub fn catalog(&self) -> Option<Arc<Catalog>> {
        self.catalog.get().cloned()
    }

    pub(crate) fn require_catalog(&self) -> Result<Arc<Catalog>, EngineError> {
        self.catalog().ok_or(EngineError::NotLoaded)
    }

    // ---------------------------------------------------------------------
    // Read API
    // ---------------------------------------------------------------------

    /// Joined view of every tweak, in catalog order
    pub async fn tweaks(&self) -> Vec<TweakWithStatus> {
        let Some(catalog) = self.catalog() else {
            return Vec::new();
        };
        let state = self.state.read().await;
        catalog
            .tweaks()
            .iter()
            .filter_map(|def| self.join(&state, &def.id))
            .collect()
    }

    pub async fn tweaks_in_category(&self, category_id: &str) -> Vec<TweakWithStatus> {
        let Some(catalog) = self.catalog() else {
            return Vec::new();
        };
        let state = self.state.read().await;
        catalog
            .in_category(category_id)
            .filter_map(|def| self.join(&state, &def.id))
            .collect()
    }

    pub async fn tweak(&self, id: &str) -> Option<TweakWithStatus> {
        let state = self.state.read().await;
        self.join(&state, id)
    }

    fn join(&self, state: &EngineState, id: &str) -> Option<TweakWithStatus> {
        let catalog = self.catalog.get()?;
        let definition = Arc::clone(catalog.get(id)?);
        let status = state
            .status
            .get(id)
            .cloned()
            .unwrap_or_else(|| tweak_common::TweakStatus::unapplied(id));
        Some(TweakWithStatus {
            definition,
            status,
            pending_option: state.staging.get(id),
            is_loading: self.loading.is_loading(id),
            error: state.errors.get(id).map(str::to_string),
            needs_reboot: state.reboot.needs_reboot(id),
        })
    }

    pub async fn pending_changes(&self) -> Vec<PendingChange> {
        self.state.read().await.staging.pending_changes()
    }

    pub async fn pending_count(&self) -> usize {
        self.state.read().await.staging.len()
    }

    pub async fn pending_option(&self, id: &str) -> Option<usize> {
        self.state.read().await.staging.get(id)
    }

    pub async fn reboot_pending(&self) -> Vec<TweakId> {
        self.state.read().await.reboot.ids()
    }

    pub async fn reboot_count(&self) -> usize {
        self.state.read().await.reboot.len()
    }

    pub async fn needs_reboot(&self, id: &str) -> bool {
        self.state.read().await.reboot.needs_reboot(id)
    }

    pub async fn error(&self, id: &str) -> Option<String> {
        self.state.read().await.errors.get(id).map(str::to_string)
    }

    pub fn is_loading(&self, id: &str) -> bool {
        self.loading.is_loading(id)
    }

    /// Current StatusCache version
    pub async fn status_version(&self) -> u64 {
        self.state.read().await.status.version()
    }

    /// Watch the StatusCache version counter
    pub async fn subscribe_status(&self) -> watch::Receiver<u64> {
        self.state.read().await.status.subscribe()
    }

    /// Receive single and batch feedback events
    pub fn subscribe_feedback(&self) -> broadcast::Receiver<Feedback> {
        self.feedback.subscribe()
    }

    pub(crate) fn emit(&self, event: Feedback) {
        // No subscribers is fine.
        if self.feedback.send(event).is_err() {
            debug!("feedback dropped, no subscribers");
        }
    }

    // ---------------------------------------------------------------------
    // Staging (no backend calls)
    // ---------------------------------------------------------------------

    /// Stage an option. Staging the applied option clears the entry.
    ///
    /// Returns whether an entry exists afterwards.
    pub async fn stage(&self, id: &str, option_index: usize) -> Result<bool, EngineError> {
        let catalog = self.require_catalog()?;
        let def = catalog
            .get(id)
            .ok_or_else(|| EngineError::UnknownTweak(id.to_string()))?;
        if !def.has_option(option_index) {
            return Err(EngineError::InvalidOption {
                tweak_id: id.to_string(),
                option_index,
            });
        }

        let mut state = self.state.write().await;
        let current = state.status.current_option(id);
        Ok(state.staging.set(id, option_index, current))
    }

    pub async fn unstage(&self, id: &str) -> Option<usize> {
        self.state.write().await.staging.clear(id)
    }

    /// Discard every staged change in a category
    pub async fn discard_category(&self, category_id: &str) -> usize {
        let Some(catalog) = self.catalog() else {
            return 0;
        };
        self.state.write().await.staging.clear_many(|id, _| {
            catalog
                .get(id)
                .map(|def| def.category_id == category_id)
                .unwrap_or(false)
        })
    }

    /// Discard staged changes for the given ids
    pub async fn discard_ids(&self, ids: &[TweakId]) -> usize {
        self.state
            .write()
            .await
            .staging
            .clear_many(|id, _| ids.iter().any(|wanted| wanted == id))
    }

    pub async fn discard_all(&self) -> usize {
        self.state.write().await.staging.clear_all()
    }

    pub async fn dismiss_error(&self, id: &str) -> Option<String> {
        self.state.write().await.errors.clear(id)
    }
}
