//! Error types for the engine module.

use thiserror::Error;

/// Errors reported by an engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine is not present in this environment. Fatal for the session.
    #[error("Engine unavailable: {reason}")]
    Unavailable { reason: String },

    /// The engine is present but failed to initialise.
    #[error("Failed to load engine: {reason}")]
    LoadFailed { reason: String },

    /// An operation was attempted before `load` completed.
    #[error("Engine not loaded")]
    NotLoaded,

    /// The engine reported a processing failure.
    #[error("Engine exited with code {code:?}: {diagnostic}")]
    ExecFailed {
        code: Option<i32>,
        diagnostic: String,
    },

    /// A scratch file does not exist.
    #[error("Engine file not found: {name}")]
    FileNotFound { name: String },

    /// A scratch file name is not a single plain path component.
    #[error("Invalid engine file name: {name}")]
    InvalidFileName { name: String },

    /// I/O error inside the engine.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Creates a new load failed error.
    pub fn load_failed(reason: impl Into<String>) -> Self {
        Self::LoadFailed {
            reason: reason.into(),
        }
    }

    /// Creates a new exec failed error.
    pub fn exec_failed(code: Option<i32>, diagnostic: impl Into<String>) -> Self {
        Self::ExecFailed {
            code,
            diagnostic: diagnostic.into(),
        }
    }

    /// Whether calling `load` again may succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Unavailable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_is_not_retryable() {
        let err = EngineError::Unavailable {
            reason: "missing".to_string(),
        };
        assert!(!err.is_retryable());
        assert!(EngineError::load_failed("network").is_retryable());
    }

    #[test]
    fn test_exec_failed_message_keeps_diagnostic() {
        let err = EngineError::exec_failed(Some(1), "Invalid data found when processing input");
        assert!(err
            .to_string()
            .contains("Invalid data found when processing input"));
    }
}
