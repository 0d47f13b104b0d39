//! Types for the engine module.

use serde::{Deserialize, Serialize};

/// Raw engine load progress.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoadProgress {
    /// Percentage (0.0 - 100.0).
    pub percent: f64,
}

/// Event emitted by the engine while executing a command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// Processing progress.
    Progress {
        /// Fraction of the input processed (0.0 - 1.0).
        ratio: f64,
        /// Current position in the output, in seconds.
        #[serde(skip_serializing_if = "Option::is_none")]
        time_secs: Option<f64>,
    },
    /// A diagnostic log line.
    Log { message: String },
}
