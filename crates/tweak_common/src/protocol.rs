//! Wire protocol between the client and the privileged tweak daemon.
//!
//! One JSON object per line in each direction. Every request carries an id
//! that the daemon echoes back in its response.

use crate::types::{
    CategoryDefinition, OperationResult, SystemInfo, TweakDefinition, TweakId, TweakStatus,
};
use serde::{Deserialize, Serialize};

/// Request from client to daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: u64,
    pub method: Method,
}

/// Response from daemon to client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub id: u64,
    pub result: Result<ResponseData, String>,
}

/// Request methods
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "params")]
pub enum Method {
    GetCategories,

    GetAvailableTweaks,

    GetTweakStatus { tweak_id: TweakId },

    GetAllTweakStatuses,

    ApplyTweak { tweak_id: TweakId, option_index: usize },

    RevertTweak { tweak_id: TweakId },

    /// Apply many tweaks in one round trip
    BatchApplyTweaks { operations: Vec<(TweakId, usize)> },

    /// Revert many tweaks in one round trip
    BatchRevertTweaks { tweak_ids: Vec<TweakId> },

    HasBackup { tweak_id: TweakId },

    GetSystemInfo,
}

impl Method {
    /// Short name used in logs and error messages
    pub fn name(&self) -> &'static str {
        match self {
            Method::GetCategories => "get_categories",
            Method::GetAvailableTweaks => "get_available_tweaks",
            Method::GetTweakStatus { .. } => "get_tweak_status",
            Method::GetAllTweakStatuses => "get_all_tweak_statuses",
            Method::ApplyTweak { .. } => "apply_tweak",
            Method::RevertTweak { .. } => "revert_tweak",
            Method::BatchApplyTweaks { .. } => "batch_apply_tweaks",
            Method::BatchRevertTweaks { .. } => "batch_revert_tweaks",
            Method::HasBackup { .. } => "has_backup",
            Method::GetSystemInfo => "get_system_info",
        }
    }

    /// Whether the method leaves the system untouched and may be retried
    pub fn is_read_only(&self) -> bool {
        !matches!(
            self,
            Method::ApplyTweak { .. }
                | Method::RevertTweak { .. }
                | Method::BatchApplyTweaks { .. }
                | Method::BatchRevertTweaks { .. }
        )
    }
}

/// Response payloads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ResponseData {
    Categories(Vec<CategoryDefinition>),
    Tweaks(Vec<TweakDefinition>),
    Status(TweakStatus),
    Statuses(Vec<TweakStatus>),
    Operation(OperationResult),
    Backup(bool),
    SystemInfo(SystemInfo),
}

impl ResponseData {
    pub fn kind(&self) -> &'static str {
        match self {
            ResponseData::Categories(_) => "categories",
            ResponseData::Tweaks(_) => "tweaks",
            ResponseData::Status(_) => "status",
            ResponseData::Statuses(_) => "statuses",
            ResponseData::Operation(_) => "operation",
            ResponseData::Backup(_) => "backup",
            ResponseData::SystemInfo(_) => "system_info",
        }
    }
}
