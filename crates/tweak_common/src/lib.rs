//! Shared types for the tweak engine and its backend.
//!
//! Everything that crosses the RPC boundary lives here so the engine and the
//! command-line client agree on one wire format.

pub mod error;
pub mod protocol;
pub mod types;

pub use error::TweakError;
pub use types::{
    CategoryDefinition, OperationResult, RiskLevel, SystemInfo, TweakDefinition, TweakId,
    TweakOption, TweakStatus,
};

/// Crate version, shared by every component
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
