//! Two-phase bootstrap.
//!
//! Phase one loads the catalog, which is all navigation needs. Phase two
//! loads host facts and every status in parallel. Concurrent callers of
//! either phase share the in-flight load; once populated both are no-ops.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use tracing::{info, warn};
use tweak_common::{SystemInfo, TweakStatus};

use crate::catalog::Catalog;
use crate::engine::TweakEngine;
use crate::error::EngineError;
use crate::status_cache;

/// How far the bootstrap has progressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LoadPhase {
    Empty,
    CatalogReady,
    Ready,
}

impl TweakEngine {
    pub fn load_phase(&self) -> LoadPhase {
        if self.status_ready.load(Ordering::Acquire) {
            LoadPhase::Ready
        } else if self.catalog.initialized() {
            LoadPhase::CatalogReady
        } else {
            LoadPhase::Empty
        }
    }

    /// Phase one. A failed load leaves the cell empty so it can be retried.
    pub async fn ensure_catalog(&self) -> Result<Arc<Catalog>, EngineError> {
        let catalog = self
            .catalog
            .get_or_try_init(|| async {
                let catalog = Arc::new(Catalog::load(self.backend.as_ref()).await?);
                self.state.write().await.status.seed_defaults(&catalog);
                Ok::<_, EngineError>(catalog)
            })
            .await?;
        Ok(Arc::clone(catalog))
    }

    /// Phase two, implies phase one
    pub async fn ensure_status(&self) -> Result<(), EngineError> {
        let catalog = self.ensure_catalog().await?;
        let _load = self.status_load.lock().await;
        if self.status_ready.load(Ordering::Acquire) {
            return Ok(());
        }
        self.load_status_phase(&catalog).await?;
        self.status_ready.store(true, Ordering::Release);
        Ok(())
    }

    /// Both phases
    pub async fn ensure_loaded(&self) -> Result<(), EngineError> {
        self.ensure_status().await
    }

    /// Force a full status reload, replacing the StatusCache wholesale
    pub async fn reload(&self) -> Result<(), EngineError> {
        let catalog = self.ensure_catalog().await?;
        let _load = self.status_load.lock().await;
        self.load_status_phase(&catalog).await?;
        self.status_ready.store(true, Ordering::Release);
        Ok(())
    }

    /// Re-fetch one status from the backend
    pub async fn refresh_status(&self, id: &str) -> Result<TweakStatus, EngineError> {
        let catalog = self.require_catalog()?;
        if !catalog.contains(id) {
            return Err(EngineError::UnknownTweak(id.to_string()));
        }
        let status = self
            .backend
            .get_tweak_status(id)
            .await
            .map_err(|source| EngineError::Refresh {
                tweak_id: id.to_string(),
                source,
            })?;

        let mut state = self.state.write().await;
        state.status.replace(status.clone());
        state.prune_staging();
        Ok(status)
    }

    /// Host facts from the last phase-two load, if the backend had them
    pub async fn system_info(&self) -> Option<SystemInfo> {
        self.state.read().await.system_info.clone()
    }

    async fn load_status_phase(&self, catalog: &Catalog) -> Result<(), EngineError> {
        let backend = self.backend.as_ref();
        let (info, statuses) = tokio::join!(
            status_cache::fetch_system_info(backend),
            status_cache::fetch_all(backend)
        );
        let statuses = statuses?;
        let reported = statuses.len();

        let mut state = self.state.write().await;
        // Ids with an operation in flight keep their entry; the operation
        // writes the authoritative result when it finishes.
        let loading = &self.loading;
        state
            .status
            .replace_all_except(catalog, statuses, |id| loading.is_loading(id));
        let pruned = state.prune_staging();
        if info.is_none() {
            warn!("Continuing without system info");
        }
        state.system_info = info;

        info!(
            reported,
            total = catalog.len(),
            pruned_staged = pruned,
            "Tweak statuses loaded"
        );
        Ok(())
    }
}
