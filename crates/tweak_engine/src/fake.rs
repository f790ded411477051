//! In-memory backend for deterministic tests.
//!
//! Behaves like a well-mannered daemon: a failed apply is rolled back, a
//! failed revert keeps its snapshot, re-applying the current option does not
//! create a new restore point. Failures, transport errors and latency are
//! scripted per tweak or per method, and every call is counted.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tweak_common::{
    CategoryDefinition, OperationResult, RiskLevel, SystemInfo, TweakDefinition, TweakError,
    TweakId, TweakOption, TweakStatus,
};

use crate::backend::{BackendResult, TweakBackend};

#[derive(Default)]
struct Script {
    apply_failures: HashMap<TweakId, String>,
    revert_failures: HashMap<TweakId, String>,
    revert_targets: HashMap<TweakId, usize>,
    reboot_on_apply: HashSet<TweakId>,
    reboot_on_revert: HashSet<TweakId>,
    unreachable: HashSet<&'static str>,
    hidden_statuses: HashSet<TweakId>,
}

pub struct FakeBackend {
    categories: Vec<CategoryDefinition>,
    tweaks: Vec<TweakDefinition>,
    statuses: Mutex<HashMap<TweakId, TweakStatus>>,
    script: Mutex<Script>,
    calls: Mutex<HashMap<&'static str, usize>>,
    delay: Mutex<Option<Duration>>,
}

impl FakeBackend {
    pub fn new(categories: Vec<CategoryDefinition>, tweaks: Vec<TweakDefinition>) -> Self {
        let statuses = tweaks
            .iter()
            .map(|t| (t.id.clone(), TweakStatus::unapplied(t.id.as_str())))
            .collect();
        Self {
            categories,
            tweaks,
            statuses: Mutex::new(statuses),
            script: Mutex::new(Script::default()),
            calls: Mutex::new(HashMap::new()),
            delay: Mutex::new(None),
        }
    }

    /// Two categories, four tweaks. `hibernation` requires a reboot.
    pub fn sample() -> Self {
        let categories = vec![category("privacy", "Privacy", 0), category("system", "System", 1)];
        let tweaks = vec![
            tweak("telemetry", "privacy", &["Disabled", "Enabled"], RiskLevel::Low, false),
            tweak("advertising_id", "privacy", &["Disabled", "Enabled"], RiskLevel::Low, false),
            tweak(
                "hibernation",
                "system",
                &["Off", "On", "Reduced"],
                RiskLevel::Medium,
                true,
            ),
            tweak("search_indexer", "system", &["Disabled", "Enabled"], RiskLevel::High, false),
        ];
        Self::new(categories, tweaks)
    }

    pub fn fail_apply(&self, id: &str, message: &str) {
        self.script().apply_failures.insert(id.to_string(), message.to_string());
    }

    pub fn fail_revert(&self, id: &str, message: &str) {
        self.script().revert_failures.insert(id.to_string(), message.to_string());
    }

    pub fn clear_failures(&self) {
        let mut script = self.script();
        script.apply_failures.clear();
        script.revert_failures.clear();
    }

    /// Option a successful revert restores instead of the system default
    pub fn revert_to(&self, id: &str, option_index: usize) {
        self.script().revert_targets.insert(id.to_string(), option_index);
    }

    pub fn reboot_on_apply(&self, id: &str) {
        self.script().reboot_on_apply.insert(id.to_string());
    }

    pub fn reboot_on_revert(&self, id: &str) {
        self.script().reboot_on_revert.insert(id.to_string());
    }

    /// Make a method fail with a transport error
    pub fn unreachable(&self, method: &'static str) {
        self.script().unreachable.insert(method);
    }

    pub fn reachable(&self, method: &'static str) {
        self.script().unreachable.remove(method);
    }

    /// Leave a tweak out of bulk status responses
    pub fn hide_status(&self, id: &str) {
        self.script().hidden_statuses.insert(id.to_string());
    }

    /// Sleep this long inside every call
    pub fn set_delay(&self, delay: Duration) {
        *lock(&self.delay) = Some(delay);
    }

    /// Overwrite the server-side status of a tweak
    pub fn set_status(&self, status: TweakStatus) {
        lock(&self.statuses).insert(status.tweak_id.clone(), status);
    }

    pub fn server_status(&self, id: &str) -> Option<TweakStatus> {
        lock(&self.statuses).get(id).cloned()
    }

    pub fn calls(&self, method: &str) -> usize {
        lock(&self.calls).get(method).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        lock(&self.calls).values().sum()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        lock(&self.script)
    }

    async fn enter(&self, method: &'static str) -> BackendResult<()> {
        *lock(&self.calls).entry(method).or_insert(0) += 1;
        let delay = *lock(&self.delay);
        match delay {
            Some(delay) => tokio::time::sleep(delay).await,
            None => tokio::task::yield_now().await,
        }
        if self.script().unreachable.contains(method) {
            return Err(TweakError::Socket(format!("{} unreachable", method)));
        }
        Ok(())
    }

    fn apply_one(&self, id: &str, option_index: usize) -> Result<bool, String> {
        if let Some(msg) = self.script().apply_failures.get(id) {
            return Err(msg.clone());
        }
        if !self.tweaks.iter().any(|t| t.id == id && t.has_option(option_index)) {
            return Err(format!("unknown tweak or option: {}[{}]", id, option_index));
        }
        let mut statuses = lock(&self.statuses);
        let status = statuses
            .entry(id.to_string())
            .or_insert_with(|| TweakStatus::unapplied(id));
        // Already there: no new restore point.
        if status.current_option_index != Some(option_index) {
            status.has_backup = true;
        }
        status.is_applied = true;
        status.current_option_index = Some(option_index);
        Ok(self.script().reboot_on_apply.contains(id))
    }

    fn revert_one(&self, id: &str) -> Result<bool, String> {
        let script = self.script();
        if let Some(msg) = script.revert_failures.get(id) {
            return Err(msg.clone());
        }
        let target = script.revert_targets.get(id).copied();
        let reboot = script.reboot_on_revert.contains(id);
        drop(script);

        let mut statuses = lock(&self.statuses);
        let status = statuses
            .entry(id.to_string())
            .or_insert_with(|| TweakStatus::unapplied(id));
        status.has_backup = false;
        status.current_option_index = target;
        status.is_applied = target.is_some();
        Ok(reboot)
    }
}

#[async_trait]
impl TweakBackend for FakeBackend {
    async fn get_categories(&self) -> BackendResult<Vec<CategoryDefinition>> {
        self.enter("get_categories").await?;
        Ok(self.categories.clone())
    }

    async fn get_available_tweaks(&self) -> BackendResult<Vec<TweakDefinition>> {
        self.enter("get_available_tweaks").await?;
        Ok(self.tweaks.clone())
    }

    async fn get_tweak_status(&self, tweak_id: &str) -> BackendResult<TweakStatus> {
        self.enter("get_tweak_status").await?;
        lock(&self.statuses)
            .get(tweak_id)
            .cloned()
            .ok_or_else(|| TweakError::Remote(format!("unknown tweak {}", tweak_id)))
    }

    async fn get_all_tweak_statuses(&self) -> BackendResult<Vec<TweakStatus>> {
        self.enter("get_all_tweak_statuses").await?;
        let hidden = self.script().hidden_statuses.clone();
        let mut statuses: Vec<TweakStatus> = lock(&self.statuses)
            .values()
            .filter(|s| !hidden.contains(&s.tweak_id))
            .cloned()
            .collect();
        statuses.sort_by(|a, b| a.tweak_id.cmp(&b.tweak_id));
        Ok(statuses)
    }

    async fn apply_tweak(
        &self,
        tweak_id: &str,
        option_index: usize,
    ) -> BackendResult<OperationResult> {
        self.enter("apply_tweak").await?;
        Ok(match self.apply_one(tweak_id, option_index) {
            Ok(reboot) => {
                let result = OperationResult::ok(format!("{} applied", tweak_id));
                if reboot {
                    result.with_reboot()
                } else {
                    result
                }
            }
            Err(msg) => OperationResult::failed("apply failed, rolled back").with_failure(tweak_id, msg),
        })
    }

    async fn revert_tweak(&self, tweak_id: &str) -> BackendResult<OperationResult> {
        self.enter("revert_tweak").await?;
        Ok(match self.revert_one(tweak_id) {
            Ok(reboot) => {
                let result = OperationResult::ok(format!("{} reverted", tweak_id));
                if reboot {
                    result.with_reboot()
                } else {
                    result
                }
            }
            Err(msg) => {
                OperationResult::failed("revert incomplete, snapshot kept").with_failure(tweak_id, msg)
            }
        })
    }

    async fn batch_apply_tweaks(
        &self,
        operations: &[(TweakId, usize)],
    ) -> BackendResult<OperationResult> {
        self.enter("batch_apply_tweaks").await?;
        let mut result = OperationResult::ok(format!("{} operation(s)", operations.len()));
        for (id, option_index) in operations {
            match self.apply_one(id, *option_index) {
                Ok(reboot) => result.requires_reboot |= reboot,
                Err(msg) => result = result.with_failure(id.as_str(), msg),
            }
        }
        result.success = result.failures.is_empty();
        Ok(result)
    }

    async fn batch_revert_tweaks(&self, tweak_ids: &[TweakId]) -> BackendResult<OperationResult> {
        self.enter("batch_revert_tweaks").await?;
        let mut result = OperationResult::ok(format!("{} tweak(s)", tweak_ids.len()));
        for id in tweak_ids {
            match self.revert_one(id) {
                Ok(reboot) => result.requires_reboot |= reboot,
                Err(msg) => result = result.with_failure(id.as_str(), msg),
            }
        }
        result.success = result.failures.is_empty();
        Ok(result)
    }

    async fn has_backup(&self, tweak_id: &str) -> BackendResult<bool> {
        self.enter("has_backup").await?;
        Ok(lock(&self.statuses)
            .get(tweak_id)
            .map(|s| s.has_backup)
            .unwrap_or(false))
    }

    async fn get_system_info(&self) -> BackendResult<SystemInfo> {
        self.enter("get_system_info").await?;
        Ok(SystemInfo {
            os_name: "TestOS".to_string(),
            os_version: "1.0".to_string(),
            build: Some("1000".to_string()),
            hostname: "testbox".to_string(),
            is_admin: true,
        })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub fn category(id: &str, name: &str, order: u32) -> CategoryDefinition {
    CategoryDefinition {
        id: id.to_string(),
        name: name.to_string(),
        description: format!("{} tweaks", name),
        icon: None,
        order,
    }
}

pub fn tweak(
    id: &str,
    category_id: &str,
    labels: &[&str],
    risk_level: RiskLevel,
    requires_reboot: bool,
) -> TweakDefinition {
    TweakDefinition {
        id: id.to_string(),
        category_id: category_id.to_string(),
        name: id.replace('_', " "),
        description: String::new(),
        options: labels
            .iter()
            .enumerate()
            .map(|(i, label)| TweakOption {
                label: label.to_string(),
                description: None,
                payload: serde_json::json!({ "value": i }),
            })
            .collect(),
        is_toggle: labels.len() == 2,
        risk_level,
        requires_admin: true,
        requires_system: false,
        requires_reboot,
    }
}
