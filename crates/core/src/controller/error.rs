//! Error types for the controller module.

use thiserror::Error;

use crate::asset::AssetError;
use crate::job::JobId;

/// Errors returned synchronously by controller operations.
///
/// Conversion failures are not reported here: they settle asynchronously
/// and surface through the snapshot and event channels.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// The selected file was rejected. Nothing changed.
    #[error("{0}")]
    Validation(#[from] AssetError),

    /// No file is loaded.
    #[error("No file loaded")]
    NoAsset,

    /// A conversion is already running.
    #[error("Conversion {job_id} already in progress")]
    JobActive { job_id: JobId },

    /// The engine is unavailable for this session.
    #[error("Conversion is disabled: engine unavailable")]
    ConversionDisabled,

    /// The requested operation is malformed.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ControllerError {
    /// User-facing notice text.
    pub fn notice(&self) -> String {
        match self {
            Self::Validation(e) => e.notice(),
            other => other.to_string(),
        }
    }
}
