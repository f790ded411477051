//! Engine error taxonomy.
//!
//! Only load failures for data the engine cannot run without, and guard
//! rejections, surface as errors. Per-tweak operation failures are values.

use thiserror::Error;
use tweak_common::{TweakError, TweakId};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Failed to load tweak catalog: {0}")]
    CatalogLoad(#[source] TweakError),

    #[error("Tweak catalog is inconsistent: {0}")]
    CatalogIntegrity(String),

    #[error("Failed to load tweak statuses: {0}")]
    StatusLoad(#[source] TweakError),

    #[error("Failed to refresh status of {tweak_id}: {source}")]
    Refresh {
        tweak_id: TweakId,
        #[source]
        source: TweakError,
    },

    #[error("Catalog not loaded yet")]
    NotLoaded,

    #[error("Unknown tweak: {0}")]
    UnknownTweak(TweakId),

    #[error("Tweak {tweak_id} has no option {option_index}")]
    InvalidOption {
        tweak_id: TweakId,
        option_index: usize,
    },

    #[error("Operation already in progress for: {}", .ids.join(", "))]
    Busy { ids: Vec<TweakId> },
}

impl EngineError {
    /// Load failures the application cannot continue without
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EngineError::CatalogLoad(_)
                | EngineError::CatalogIntegrity(_)
                | EngineError::StatusLoad(_)
        )
    }
}
