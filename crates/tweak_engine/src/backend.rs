//! Backend trait abstraction.
//!
//! The engine never mutates the system itself. Everything goes through a
//! `TweakBackend`, which production code implements over the daemon socket
//! and tests implement with scripted responses.

use async_trait::async_trait;
use tweak_common::{
    CategoryDefinition, OperationResult, SystemInfo, TweakDefinition, TweakError, TweakId,
    TweakStatus,
};

pub type BackendResult<T> = Result<T, TweakError>;

/// The privileged backend that performs and rolls back tweaks
#[async_trait]
pub trait TweakBackend: Send + Sync {
    async fn get_categories(&self) -> BackendResult<Vec<CategoryDefinition>>;

    async fn get_available_tweaks(&self) -> BackendResult<Vec<TweakDefinition>>;

    async fn get_tweak_status(&self, tweak_id: &str) -> BackendResult<TweakStatus>;

    async fn get_all_tweak_statuses(&self) -> BackendResult<Vec<TweakStatus>>;

    /// Apply one option. On failure the backend has already rolled back.
    async fn apply_tweak(&self, tweak_id: &str, option_index: usize)
        -> BackendResult<OperationResult>;

    /// Restore the snapshot. On partial failure the snapshot is kept.
    async fn revert_tweak(&self, tweak_id: &str) -> BackendResult<OperationResult>;

    async fn batch_apply_tweaks(
        &self,
        operations: &[(TweakId, usize)],
    ) -> BackendResult<OperationResult>;

    async fn batch_revert_tweaks(&self, tweak_ids: &[TweakId]) -> BackendResult<OperationResult>;

    async fn has_backup(&self, tweak_id: &str) -> BackendResult<bool>;

    async fn get_system_info(&self) -> BackendResult<SystemInfo>;
}
