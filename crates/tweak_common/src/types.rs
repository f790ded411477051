//! Tweak catalog and status data model.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Stable identifier of a tweak definition
pub type TweakId = String;

/// Risk level of a tweak
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// Cosmetic or trivially reversible
    Low,
    /// May change application behavior
    Medium,
    /// System-wide impact
    High,
    /// Can leave the system unbootable if the restore point is lost
    Critical,
}

impl Default for RiskLevel {
    fn default() -> Self {
        Self::Low
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        };
        f.write_str(label)
    }
}

/// A group of related tweaks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Display order, lowest first
    #[serde(default)]
    pub order: u32,
}

/// One selectable outcome of a tweak
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TweakOption {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Backend-owned change description. Never interpreted client side.
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Immutable definition of a reversible configuration change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TweakDefinition {
    pub id: TweakId,
    pub category_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub options: Vec<TweakOption>,
    #[serde(default)]
    pub is_toggle: bool,
    #[serde(default)]
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub requires_admin: bool,
    #[serde(default)]
    pub requires_system: bool,
    #[serde(default)]
    pub requires_reboot: bool,
}

impl TweakDefinition {
    pub fn option(&self, index: usize) -> Option<&TweakOption> {
        self.options.get(index)
    }

    pub fn has_option(&self, index: usize) -> bool {
        index < self.options.len()
    }

    /// Label of the given option, or "system default" for `None`
    pub fn option_label(&self, index: Option<usize>) -> &str {
        index
            .and_then(|i| self.option(i))
            .map(|o| o.label.as_str())
            .unwrap_or("system default")
    }
}

/// Authoritative state of one tweak as reported by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TweakStatus {
    pub tweak_id: TweakId,
    pub is_applied: bool,
    pub has_backup: bool,
    /// `None` means the system default, i.e. not produced by us
    #[serde(default)]
    pub current_option_index: Option<usize>,
    /// Detection error reported by the backend, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TweakStatus {
    /// Default status for a tweak the backend never reported
    pub fn unapplied(tweak_id: impl Into<TweakId>) -> Self {
        Self {
            tweak_id: tweak_id.into(),
            is_applied: false,
            has_backup: false,
            current_option_index: None,
            error: None,
        }
    }
}

/// Result of a single or batch mutation on the backend
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationResult {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub requires_reboot: bool,
    /// Per-tweak failures as `(tweak_id, message)` pairs
    #[serde(default)]
    pub failures: Vec<(TweakId, String)>,
}

impl OperationResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_reboot(mut self) -> Self {
        self.requires_reboot = true;
        self
    }

    pub fn with_failure(mut self, tweak_id: impl Into<TweakId>, message: impl Into<String>) -> Self {
        self.failures.push((tweak_id.into(), message.into()));
        self
    }

    /// Human-readable failure detail.
    ///
    /// Joined per-item failures win over the top-level message.
    pub fn failure_detail(&self) -> String {
        if !self.failures.is_empty() {
            return self
                .failures
                .iter()
                .map(|(_, msg)| msg.as_str())
                .collect::<Vec<_>>()
                .join("; ");
        }
        if !self.message.trim().is_empty() {
            return self.message.clone();
        }
        "operation failed".to_string()
    }

    /// Failures keyed by tweak id. Later duplicates are appended.
    pub fn failure_map(&self) -> HashMap<&str, String> {
        let mut map: HashMap<&str, String> = HashMap::new();
        for (id, msg) in &self.failures {
            map.entry(id.as_str())
                .and_modify(|existing| {
                    existing.push_str("; ");
                    existing.push_str(msg);
                })
                .or_insert_with(|| msg.clone());
        }
        map
    }
}

/// Best-effort facts about the host
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemInfo {
    #[serde(default)]
    pub os_name: String,
    #[serde(default)]
    pub os_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<String>,
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub is_admin: bool,
}
