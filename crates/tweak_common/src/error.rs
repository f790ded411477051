//! Error types for talking to the tweak daemon.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TweakError {
    #[error("Tweak daemon not running at {0}")]
    DaemonNotRunning(String),

    #[error("Socket error: {0}")]
    Socket(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Daemon error: {0}")]
    Remote(String),

    #[error("Unexpected {got} response to {method}")]
    UnexpectedResponse {
        method: &'static str,
        got: &'static str,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TweakError {
    pub fn code(&self) -> i32 {
        match self {
            TweakError::DaemonNotRunning(_) => -32000,
            TweakError::Socket(_) => -32001,
            TweakError::Remote(_) => -32002,
            TweakError::UnexpectedResponse { .. } => -32003,
            TweakError::Io(_) => -32006,
            TweakError::Protocol(_) => -32600,
            TweakError::Json(_) => -32700,
        }
    }

    /// Transient failures worth one more attempt on read-only calls
    pub fn is_transient(&self) -> bool {
        matches!(self, TweakError::Io(_) | TweakError::Socket(_))
    }
}
