//! Operation results and user feedback events.
//!
//! Single operations produce one event each. Batches produce exactly one
//! summary event, whatever their size.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tweak_common::{OperationResult, TweakId};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Apply,
    Revert,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationKind::Apply => f.write_str("apply"),
            OperationKind::Revert => f.write_str("revert"),
        }
    }
}

/// Outcome of a single apply or revert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationOutcome {
    pub operation_id: Uuid,
    pub kind: OperationKind,
    pub tweak_id: TweakId,
    pub success: bool,
    pub message: String,
    pub requires_reboot: bool,
}

/// Per-item result of a batch call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum ItemOutcome {
    Succeeded,
    Failed(String),
}

/// Typed view of a batch result, keyed by every id that was sent
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutcome {
    items: BTreeMap<TweakId, ItemOutcome>,
}

impl BatchOutcome {
    /// Partition `sent` by the failure list of `result`.
    ///
    /// A failed call that names no item is a failure of the whole batch.
    /// Failures for ids that were never sent are ignored.
    pub fn from_result<'a, I>(sent: I, result: &OperationResult) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let failures = result.failure_map();
        let whole_batch_failed = !result.success && failures.is_empty();
        let items = sent
            .into_iter()
            .map(|id| {
                let outcome = match failures.get(id) {
                    Some(msg) => ItemOutcome::Failed(msg.clone()),
                    None if whole_batch_failed => ItemOutcome::Failed(result.failure_detail()),
                    None => ItemOutcome::Succeeded,
                };
                (id.to_string(), outcome)
            })
            .collect();
        Self { items }
    }

    /// Every id failed with the same message (transport error)
    pub fn all_failed<'a, I>(sent: I, message: &str) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let items = sent
            .into_iter()
            .map(|id| (id.to_string(), ItemOutcome::Failed(message.to_string())))
            .collect();
        Self { items }
    }

    pub fn get(&self, id: &str) -> Option<&ItemOutcome> {
        self.items.get(id)
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &str> {
        self.items
            .iter()
            .filter(|(_, o)| matches!(o, ItemOutcome::Succeeded))
            .map(|(id, _)| id.as_str())
    }

    pub fn failed(&self) -> impl Iterator<Item = (&str, &str)> {
        self.items.iter().filter_map(|(id, o)| match o {
            ItemOutcome::Failed(msg) => Some((id.as_str(), msg.as_str())),
            ItemOutcome::Succeeded => None,
        })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Aggregate result of a batch commit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub operation_id: Uuid,
    pub kind: OperationKind,
    pub succeeded: Vec<TweakId>,
    pub failed: Vec<(TweakId, String)>,
    pub requires_reboot: bool,
}

impl BatchSummary {
    /// Nothing to commit; no backend call was made
    pub fn empty(kind: OperationKind) -> Self {
        Self {
            operation_id: Uuid::new_v4(),
            kind,
            succeeded: Vec::new(),
            failed: Vec::new(),
            requires_reboot: false,
        }
    }

    pub fn success_count(&self) -> usize {
        self.succeeded.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }

    /// One-line summary for the user
    pub fn message(&self) -> String {
        let verb = match self.kind {
            OperationKind::Apply => "applied",
            OperationKind::Revert => "reverted",
        };
        if self.failed.is_empty() {
            format!("{} tweak(s) {}", self.succeeded.len(), verb)
        } else {
            format!(
                "{} tweak(s) {}, {} failed",
                self.succeeded.len(),
                verb,
                self.failed.len()
            )
        }
    }
}

/// Event published to UI collaborators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Feedback {
    Single {
        outcome: OperationOutcome,
        at: DateTime<Utc>,
    },
    Batch {
        operation_id: Uuid,
        kind: OperationKind,
        succeeded: usize,
        failed: usize,
        message: String,
        at: DateTime<Utc>,
    },
}

impl Feedback {
    pub fn single(outcome: &OperationOutcome) -> Self {
        Feedback::Single {
            outcome: outcome.clone(),
            at: Utc::now(),
        }
    }

    pub fn batch(summary: &BatchSummary) -> Self {
        Feedback::Batch {
            operation_id: summary.operation_id,
            kind: summary.kind,
            succeeded: summary.success_count(),
            failed: summary.failed_count(),
            message: summary.message(),
            at: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        match self {
            Feedback::Single { outcome, .. } => outcome.success,
            Feedback::Batch { failed, .. } => *failed == 0,
        }
    }

    pub fn message(&self) -> String {
        match self {
            Feedback::Single { outcome, .. } => outcome.message.clone(),
            Feedback::Batch { message, .. } => message.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_by_failure_list() {
        let result = OperationResult::failed("1 of 3 failed").with_failure("b", "access denied");
        let outcome = BatchOutcome::from_result(["a", "b", "c"], &result);

        assert_eq!(outcome.succeeded().collect::<Vec<_>>(), vec!["a", "c"]);
        assert_eq!(outcome.failed().collect::<Vec<_>>(), vec![("b", "access denied")]);
    }

    #[test]
    fn test_failed_call_without_items_fails_everything() {
        let result = OperationResult::failed("daemon busy");
        let outcome = BatchOutcome::from_result(["a", "b"], &result);
        assert_eq!(outcome.succeeded().count(), 0);
        assert_eq!(outcome.get("a"), Some(&ItemOutcome::Failed("daemon busy".into())));
    }

    #[test]
    fn test_unsent_failures_ignored() {
        let result = OperationResult::ok("").with_failure("zzz", "not ours");
        let outcome = BatchOutcome::from_result(["a"], &result);
        assert_eq!(outcome.len(), 1);
        assert_eq!(outcome.get("a"), Some(&ItemOutcome::Succeeded));
    }

    #[test]
    fn test_summary_message() {
        let mut summary = BatchSummary::empty(OperationKind::Apply);
        summary.succeeded = vec!["a".into(), "c".into()];
        summary.failed = vec![("b".into(), "denied".into())];
        assert_eq!(summary.message(), "2 tweak(s) applied, 1 failed");
        assert!(!Feedback::batch(&summary).is_success());
    }
}
