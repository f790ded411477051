//! Apply and revert, single and batch.
//!
//! Failure policy is asymmetric. A failed apply has already been rolled back
//! by the backend, so the cached status stays exactly as it was. A failed
//! revert keeps its snapshot for a retry, so the tweak stays applied with a
//! backup. Neither kind of failure is returned as an `Err`; they come back
//! as outcomes and are recorded in the error map.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info, warn};
use tweak_common::{OperationResult, TweakDefinition, TweakId, TweakStatus};
use uuid::Uuid;

use crate::catalog::Catalog;
use crate::engine::TweakEngine;
use crate::error::EngineError;
use crate::feedback::{BatchOutcome, BatchSummary, Feedback, OperationKind, OperationOutcome};
use crate::guard::InFlightClaim;
use crate::status_cache::StatusPatch;

impl TweakEngine {
    /// Apply one option of one tweak
    pub async fn apply_tweak(
        &self,
        id: &str,
        option_index: usize,
    ) -> Result<OperationOutcome, EngineError> {
        let catalog = self.require_catalog()?;
        let def = lookup(&catalog, id)?;
        if !def.has_option(option_index) {
            return Err(EngineError::InvalidOption {
                tweak_id: id.to_string(),
                option_index,
            });
        }
        let _claim = self.claim([id])?;
        self.state.write().await.errors.clear(id);

        let operation_id = Uuid::new_v4();
        info!(%operation_id, tweak_id = %id, option_index, "Applying tweak");

        let outcome = match self.backend.apply_tweak(id, option_index).await {
            Ok(result) if result.success => {
                let has_backup = match self.backend.has_backup(id).await {
                    Ok(has_backup) => has_backup,
                    Err(e) => {
                        warn!(tweak_id = %id, "Backup query failed after apply, assuming one exists: {}", e);
                        true
                    }
                };
                let requires_reboot = result.requires_reboot || def.requires_reboot;

                let mut state = self.state.write().await;
                state.status.update(
                    id,
                    StatusPatch::new()
                        .applied(true)
                        .option(Some(option_index))
                        .backup(has_backup)
                        .clear_error(),
                );
                state.staging.clear_if_equal(id, option_index);
                if requires_reboot {
                    state.reboot.add(id);
                }
                drop(state);

                info!(%operation_id, tweak_id = %id, has_backup, requires_reboot, "Tweak applied");
                OperationOutcome {
                    operation_id,
                    kind: OperationKind::Apply,
                    tweak_id: id.to_string(),
                    success: true,
                    message: success_message(&result, &def.name, "applied"),
                    requires_reboot,
                }
            }
            Ok(result) => self.record_failure(operation_id, OperationKind::Apply, id, result.failure_detail()).await,
            Err(e) => self.record_failure(operation_id, OperationKind::Apply, id, e.to_string()).await,
        };

        self.emit(Feedback::single(&outcome));
        Ok(outcome)
    }

    /// Restore the snapshot of one tweak
    pub async fn revert_tweak(&self, id: &str) -> Result<OperationOutcome, EngineError> {
        let catalog = self.require_catalog()?;
        let def = lookup(&catalog, id)?;
        let _claim = self.claim([id])?;
        self.state.write().await.errors.clear(id);

        let operation_id = Uuid::new_v4();
        info!(%operation_id, tweak_id = %id, "Reverting tweak");

        let outcome = match self.backend.revert_tweak(id).await {
            Ok(result) if result.success => {
                // A snapshot can restore any option, not only the default.
                let current = match self.backend.get_tweak_status(id).await {
                    Ok(status) => status.current_option_index,
                    Err(e) => {
                        warn!(tweak_id = %id, "Status query failed after revert, assuming default: {}", e);
                        None
                    }
                };

                let mut state = self.state.write().await;
                state.status.update(
                    id,
                    StatusPatch::new()
                        .applied(current.is_some())
                        .option(current)
                        .backup(false)
                        .clear_error(),
                );
                state.staging.clear(id);
                state.reboot.remove(id);
                if result.requires_reboot {
                    state.reboot.add(id);
                }
                drop(state);

                info!(%operation_id, tweak_id = %id, ?current, requires_reboot = result.requires_reboot, "Tweak reverted");
                OperationOutcome {
                    operation_id,
                    kind: OperationKind::Revert,
                    tweak_id: id.to_string(),
                    success: true,
                    message: success_message(&result, &def.name, "reverted"),
                    requires_reboot: result.requires_reboot,
                }
            }
            Ok(result) => self.record_failure(operation_id, OperationKind::Revert, id, result.failure_detail()).await,
            Err(e) => self.record_failure(operation_id, OperationKind::Revert, id, e.to_string()).await,
        };

        self.emit(Feedback::single(&outcome));
        Ok(outcome)
    }

    /// Commit every staged change in one backend call
    pub async fn batch_apply_pending_changes(&self) -> Result<BatchSummary, EngineError> {
        let catalog = self.require_catalog()?;
        let operations = self.state.read().await.staging.snapshot();
        if operations.is_empty() {
            return Ok(BatchSummary::empty(OperationKind::Apply));
        }
        let _claim = self.claim(operations.iter().map(|(id, _)| id.as_str()))?;
        self.clear_errors(operations.iter().map(|(id, _)| id.as_str())).await;

        let operation_id = Uuid::new_v4();
        info!(%operation_id, count = operations.len(), "Applying staged changes");

        let sent = || operations.iter().map(|(id, _)| id.as_str());
        let (outcome, requires_reboot) = match self.backend.batch_apply_tweaks(&operations).await {
            Ok(result) => (BatchOutcome::from_result(sent(), &result), result.requires_reboot),
            Err(e) => {
                warn!(%operation_id, "Batch apply call failed: {}", e);
                (BatchOutcome::all_failed(sent(), &e.to_string()), false)
            }
        };

        let fresh = if outcome.succeeded().next().is_some() {
            self.refetch_statuses(operation_id).await
        } else {
            None
        };

        let reboot_ids = reboot_targets(&catalog, &outcome, requires_reboot);

        let mut state = self.state.write().await;
        for (id, option_index) in &operations {
            if let Some(msg) = failure_of(&outcome, id) {
                state.errors.set(id, msg);
                continue;
            }
            let has_backup = fresh
                .as_ref()
                .and_then(|f| f.get(id.as_str()))
                .map(|s| s.has_backup)
                .unwrap_or(true);
            state.status.update(
                id,
                StatusPatch::new()
                    .applied(true)
                    .option(Some(*option_index))
                    .backup(has_backup)
                    .clear_error(),
            );
            state.staging.clear_if_equal(id, *option_index);
            if definition_requires_reboot(&catalog, id) || reboot_ids.contains(id.as_str()) {
                state.reboot.add(id);
            }
        }
        drop(state);

        let summary = summarize(operation_id, OperationKind::Apply, &outcome, requires_reboot);
        info!(%operation_id, succeeded = summary.success_count(), failed = summary.failed_count(), "Staged changes applied");
        self.emit(Feedback::batch(&summary));
        Ok(summary)
    }

    /// Revert many tweaks in one backend call
    pub async fn batch_revert_tweaks(&self, ids: &[TweakId]) -> Result<BatchSummary, EngineError> {
        let catalog = self.require_catalog()?;
        let mut targets: Vec<TweakId> = Vec::with_capacity(ids.len());
        for id in ids {
            lookup(&catalog, id)?;
            if !targets.contains(id) {
                targets.push(id.clone());
            }
        }
        if targets.is_empty() {
            return Ok(BatchSummary::empty(OperationKind::Revert));
        }
        let _claim = self.claim(targets.iter().map(String::as_str))?;
        self.clear_errors(targets.iter().map(String::as_str)).await;

        let operation_id = Uuid::new_v4();
        info!(%operation_id, count = targets.len(), "Reverting tweaks");

        let sent = || targets.iter().map(String::as_str);
        let (outcome, requires_reboot) = match self.backend.batch_revert_tweaks(&targets).await {
            Ok(result) => (BatchOutcome::from_result(sent(), &result), result.requires_reboot),
            Err(e) => {
                warn!(%operation_id, "Batch revert call failed: {}", e);
                (BatchOutcome::all_failed(sent(), &e.to_string()), false)
            }
        };

        let fresh = if outcome.succeeded().next().is_some() {
            self.refetch_statuses(operation_id).await
        } else {
            None
        };

        let reboot_ids = reboot_targets(&catalog, &outcome, requires_reboot);

        let mut state = self.state.write().await;
        for id in &targets {
            if let Some(msg) = failure_of(&outcome, id) {
                state.errors.set(id, msg);
                continue;
            }
            let current = fresh
                .as_ref()
                .and_then(|f| f.get(id.as_str()))
                .and_then(|s| s.current_option_index);
            state.status.update(
                id,
                StatusPatch::new()
                    .applied(current.is_some())
                    .option(current)
                    .backup(false)
                    .clear_error(),
            );
            state.staging.clear(id);
            state.reboot.remove(id);
            if reboot_ids.contains(id.as_str()) {
                state.reboot.add(id);
            }
        }
        drop(state);

        let summary = summarize(operation_id, OperationKind::Revert, &outcome, requires_reboot);
        info!(%operation_id, succeeded = summary.success_count(), failed = summary.failed_count(), "Tweaks reverted");
        self.emit(Feedback::batch(&summary));
        Ok(summary)
    }

    fn claim<I, S>(&self, ids: I) -> Result<InFlightClaim, EngineError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.loading.try_claim(ids).map_err(|ids| {
            debug!(?ids, "Rejecting operation, already in flight");
            EngineError::Busy { ids }
        })
    }

    async fn clear_errors<'a, I>(&self, ids: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut state = self.state.write().await;
        for id in ids {
            state.errors.clear(id);
        }
    }

    /// Record a failed single operation. The status entry is not touched.
    async fn record_failure(
        &self,
        operation_id: Uuid,
        kind: OperationKind,
        id: &str,
        message: String,
    ) -> OperationOutcome {
        warn!(%operation_id, tweak_id = %id, %kind, "Tweak operation failed: {}", message);
        self.state.write().await.errors.set(id, message.clone());
        OperationOutcome {
            operation_id,
            kind,
            tweak_id: id.to_string(),
            success: false,
            message,
            requires_reboot: false,
        }
    }

    /// One bulk status fetch after a batch, for fields only the backend knows
    async fn refetch_statuses(&self, operation_id: Uuid) -> Option<HashMap<String, TweakStatus>> {
        match self.backend.get_all_tweak_statuses().await {
            Ok(statuses) => Some(
                statuses
                    .into_iter()
                    .map(|s| (s.tweak_id.clone(), s))
                    .collect(),
            ),
            Err(e) => {
                warn!(%operation_id, "Status refresh after batch failed: {}", e);
                None
            }
        }
    }
}

fn lookup(catalog: &Catalog, id: &str) -> Result<Arc<TweakDefinition>, EngineError> {
    catalog
        .get(id)
        .cloned()
        .ok_or_else(|| EngineError::UnknownTweak(id.to_string()))
}

fn definition_requires_reboot(catalog: &Catalog, id: &str) -> bool {
    catalog.get(id).map(|d| d.requires_reboot).unwrap_or(false)
}

/// Succeeded ids that take a reboot obligation from a batch result.
///
/// The aggregate flag cannot name items: it lands on the succeeded ids whose
/// definition needs a reboot, or on every succeeded id when none does.
fn reboot_targets<'a>(
    catalog: &Catalog,
    outcome: &'a BatchOutcome,
    reported: bool,
) -> HashSet<&'a str> {
    if !reported {
        return HashSet::new();
    }
    let flagged: HashSet<&str> = outcome
        .succeeded()
        .filter(|id| definition_requires_reboot(catalog, id))
        .collect();
    if flagged.is_empty() {
        outcome.succeeded().collect()
    } else {
        flagged
    }
}

fn failure_of<'a>(outcome: &'a BatchOutcome, id: &str) -> Option<&'a str> {
    match outcome.get(id) {
        Some(crate::feedback::ItemOutcome::Failed(msg)) => Some(msg.as_str()),
        _ => None,
    }
}

fn success_message(result: &OperationResult, name: &str, verb: &str) -> String {
    if result.message.trim().is_empty() {
        format!("{} {}", name, verb)
    } else {
        result.message.clone()
    }
}

fn summarize(
    operation_id: Uuid,
    kind: OperationKind,
    outcome: &BatchOutcome,
    requires_reboot: bool,
) -> BatchSummary {
    BatchSummary {
        operation_id,
        kind,
        succeeded: outcome.succeeded().map(str::to_string).collect(),
        failed: outcome
            .failed()
            .map(|(id, msg)| (id.to_string(), msg.to_string()))
            .collect(),
        requires_reboot,
    }
}
