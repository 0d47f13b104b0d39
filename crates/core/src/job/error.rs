//! Error types for the job module.

use thiserror::Error;

use crate::engine::EngineError;

/// Errors that settle a conversion job.
#[derive(Debug, Error)]
pub enum JobError {
    /// The engine is missing from this environment.
    #[error("Conversion engine unavailable: {reason}")]
    EngineUnavailable { reason: String },

    /// The engine failed to initialise. A new request may succeed.
    #[error("Failed to load conversion engine: {reason}")]
    EngineLoadFailed { reason: String },

    /// The engine rejected the input or parameters.
    #[error("Conversion failed: {diagnostic}")]
    TranscodeFailed { diagnostic: String },

    /// The job was cancelled before it settled.
    #[error("Conversion cancelled")]
    Cancelled,

    /// The operation's parameters are inconsistent.
    #[error("Invalid operation: {reason}")]
    InvalidOperation { reason: String },

    /// Scratch file I/O inside the engine failed.
    #[error("Engine error: {0}")]
    Engine(EngineError),
}

impl JobError {
    /// Creates a new invalid operation error.
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidOperation {
            reason: reason.into(),
        }
    }

    /// Classifies an error returned by `SharedEngine::ensure_loaded`.
    pub fn from_load(err: EngineError) -> Self {
        match err {
            EngineError::Unavailable { reason } => Self::EngineUnavailable { reason },
            EngineError::LoadFailed { reason } => Self::EngineLoadFailed { reason },
            other => Self::EngineLoadFailed {
                reason: other.to_string(),
            },
        }
    }

    /// Classifies an error returned by `Engine::exec`.
    pub fn from_exec(err: EngineError) -> Self {
        match err {
            EngineError::ExecFailed { diagnostic, .. } => Self::TranscodeFailed { diagnostic },
            EngineError::Unavailable { reason } => Self::EngineUnavailable { reason },
            other => Self::Engine(other),
        }
    }

    /// Whether conversion should be disabled for the rest of the session.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::EngineUnavailable { .. })
    }

    /// Whether a fresh request may succeed where this one failed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::EngineLoadFailed { .. } => true,
            Self::Engine(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Short message for the status notice.
    pub fn notice(&self) -> String {
        match self {
            Self::EngineUnavailable { .. } => {
                "Conversion is not available in this environment.".to_string()
            }
            Self::TranscodeFailed { diagnostic } => format!("Conversion failed: {}", diagnostic),
            Self::Cancelled => "Conversion cancelled.".to_string(),
            other => format!("Conversion failed: {}", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_errors_are_classified() {
        let unavailable = JobError::from_load(EngineError::Unavailable {
            reason: "no ffmpeg".to_string(),
        });
        assert!(unavailable.is_fatal());

        let failed = JobError::from_load(EngineError::load_failed("timeout"));
        assert!(matches!(failed, JobError::EngineLoadFailed { .. }));
        assert!(!failed.is_fatal());
        assert!(failed.is_retryable());
    }

    #[test]
    fn test_exec_failure_keeps_diagnostic_verbatim() {
        let err = JobError::from_exec(EngineError::exec_failed(
            Some(1),
            "Unknown encoder 'libx265'",
        ));
        match &err {
            JobError::TranscodeFailed { diagnostic } => {
                assert_eq!(diagnostic, "Unknown encoder 'libx265'")
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(err.notice(), "Conversion failed: Unknown encoder 'libx265'");
    }

    #[test]
    fn test_exec_io_error_is_engine_error() {
        let err = JobError::from_exec(EngineError::NotLoaded);
        assert!(matches!(err, JobError::Engine(EngineError::NotLoaded)));
    }
}
