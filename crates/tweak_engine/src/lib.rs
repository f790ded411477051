//! Staged-change reconciliation engine for reversible system tweaks.
//!
//! Tracks the authoritative status of every tweak, the user's uncommitted
//! selections, in-flight operations, pending reboots and the last error per
//! tweak, and commits changes against a privileged [`TweakBackend`].

pub mod backend;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod fake;
pub mod feedback;
pub mod guard;
pub mod loader;
pub mod staging;
pub mod status_cache;
pub mod view;

pub use backend::{BackendResult, TweakBackend};
pub use catalog::Catalog;
pub use config::EngineConfig;
pub use engine::{EngineState, TweakEngine};
pub use error::EngineError;
pub use feedback::{
    BatchOutcome, BatchSummary, Feedback, ItemOutcome, OperationKind, OperationOutcome,
};
pub use loader::LoadPhase;
pub use staging::{PendingChange, RebootSet, StagingMap};
pub use status_cache::{StatusCache, StatusPatch};
pub use view::TweakWithStatus;
