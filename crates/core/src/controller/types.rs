//! Types for the controller module.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::asset::{AssetId, AssetSummary, MediaContent};
use crate::job::{CancelHandle, JobId, JobProgress, JobState};
use crate::preview::PreviewStats;

/// What the page is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UiPhase {
    /// Nothing loaded; the drop zone is shown.
    Empty,
    /// A file is loaded and actions are enabled.
    Loaded,
    /// A conversion failed; the error is shown until it expires.
    ErrorShown,
    /// A conversion is running; actions are disabled.
    Converting,
}

/// Whether the playback surface could decode the current asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackStatus {
    /// No report yet.
    #[default]
    Pending,
    /// Metadata was reported; the preview plays.
    Ready,
    /// The surface failed to decode the preview.
    Unsupported,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// A transient status message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl Notice {
    pub fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            at: Utc::now(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Info, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Success, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Error, message)
    }
}

/// Bookkeeping for the one running job.
#[derive(Debug, Clone)]
pub(crate) struct ActiveJob {
    pub id: JobId,
    pub operation: &'static str,
    pub state: JobState,
    pub percent: f64,
    pub cancel: CancelHandle,
}

impl ActiveJob {
    pub fn info(&self) -> ActiveJobInfo {
        ActiveJobInfo {
            job_id: self.id,
            operation: self.operation.to_string(),
            state: self.state,
            percent: self.percent,
        }
    }
}

/// The running job as shown to presentation layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveJobInfo {
    pub job_id: JobId,
    pub operation: String,
    pub state: JobState,
    pub percent: f64,
}

/// Full observable controller state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerSnapshot {
    pub phase: UiPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset: Option<AssetSummary>,
    /// Displayed progress (0-100) while converting.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_job: Option<ActiveJobInfo>,
    pub conversion_disabled: bool,
    pub playback: PlaybackStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<Notice>,
    pub preview: PreviewStats,
}

impl ControllerSnapshot {
    pub(crate) fn empty() -> Self {
        Self {
            phase: UiPhase::Empty,
            asset: None,
            progress: None,
            active_job: None,
            conversion_disabled: false,
            playback: PlaybackStatus::Pending,
            notice: None,
            preview: PreviewStats::default(),
        }
    }
}

/// Events pushed to presentation layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControllerEvent {
    /// The current asset changed (`None` after clear).
    AssetChanged { asset: Option<AssetSummary> },
    /// A metadata or playback report was applied.
    PlaybackChanged {
        asset_id: AssetId,
        status: PlaybackStatus,
    },
    JobStarted { job_id: JobId, operation: String },
    JobProgress { progress: JobProgress },
    JobFinished {
        job_id: JobId,
        state: JobState,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    PhaseChanged { phase: UiPhase },
    Notice { notice: Notice },
}

/// The current file as offered for download.
#[derive(Debug, Clone)]
pub struct Download {
    pub file_name: String,
    pub mime: String,
    pub content: MediaContent,
}
