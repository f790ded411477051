//! Read-only join of definition, status and session bookkeeping.

use std::sync::Arc;

use serde::Serialize;
use tweak_common::{TweakDefinition, TweakStatus};

/// The unit a UI renders
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TweakWithStatus {
    pub definition: Arc<TweakDefinition>,
    pub status: TweakStatus,
    pub pending_option: Option<usize>,
    pub is_loading: bool,
    pub error: Option<String>,
    pub needs_reboot: bool,
}

impl TweakWithStatus {
    pub fn id(&self) -> &str {
        &self.definition.id
    }

    pub fn has_pending_change(&self) -> bool {
        self.pending_option.is_some()
    }

    /// Option the UI should show as selected: staged value first
    pub fn effective_option(&self) -> Option<usize> {
        self.pending_option.or(self.status.current_option_index)
    }

    pub fn current_label(&self) -> &str {
        self.definition
            .option_label(self.status.current_option_index)
    }

    pub fn can_revert(&self) -> bool {
        self.status.has_backup && !self.is_loading
    }
}
