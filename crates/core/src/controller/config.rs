//! Configuration for the controller module.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Controller configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// How long a conversion error stays shown before the UI reverts to
    /// the loaded state, in milliseconds.
    #[serde(default = "default_error_notice_ms")]
    pub error_notice_ms: u64,
}

fn default_error_notice_ms() -> u64 {
    3000
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            error_notice_ms: default_error_notice_ms(),
        }
    }
}

impl ControllerConfig {
    pub fn error_notice(&self) -> Duration {
        Duration::from_millis(self.error_notice_ms)
    }
}
