//! Engine tuning knobs.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Buffered feedback events per subscriber before old ones are dropped
    #[serde(default = "default_feedback_capacity")]
    pub feedback_capacity: usize,
}

fn default_feedback_capacity() -> usize {
    64
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            feedback_capacity: default_feedback_capacity(),
        }
    }
}
