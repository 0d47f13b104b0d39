//! Types for the job module.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::error::JobError;
use crate::asset::MediaContent;

/// Identity of a conversion job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    /// Creates a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// First eight hex digits, used in scratch file names.
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Output container or audio format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    Mp4,
    Webm,
    Mov,
    Mkv,
    Avi,
    Mp3,
    Wav,
    Aac,
    M4a,
    Gif,
}

impl TargetFormat {
    /// File extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Webm => "webm",
            Self::Mov => "mov",
            Self::Mkv => "mkv",
            Self::Avi => "avi",
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
            Self::Aac => "aac",
            Self::M4a => "m4a",
            Self::Gif => "gif",
        }
    }

    /// MIME type of produced files.
    pub fn mime(&self) -> &'static str {
        crate::asset::mime_for_extension(self.extension())
    }

    /// Whether this is an audio-only format.
    pub fn is_audio(&self) -> bool {
        matches!(self, Self::Mp3 | Self::Wav | Self::Aac | Self::M4a)
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for TargetFormat {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mp4" => Ok(Self::Mp4),
            "webm" => Ok(Self::Webm),
            "mov" => Ok(Self::Mov),
            "mkv" => Ok(Self::Mkv),
            "avi" => Ok(Self::Avi),
            "mp3" => Ok(Self::Mp3),
            "wav" => Ok(Self::Wav),
            "aac" => Ok(Self::Aac),
            "m4a" => Ok(Self::M4a),
            "gif" => Ok(Self::Gif),
            other => Err(JobError::invalid(format!("unknown format: {}", other))),
        }
    }
}

/// Compression shortcut levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionLevel {
    High,
    Medium,
    Low,
}

impl CompressionLevel {
    /// Audio bitrate used by every compression level.
    pub const AUDIO_BITRATE: &'static str = "96k";

    /// Quality factor (lower is better).
    pub fn crf(&self) -> u8 {
        match self {
            Self::High => 20,
            Self::Medium => 26,
            Self::Low => 32,
        }
    }
}

/// A section of the input, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start_secs: f64,
    pub duration_secs: f64,
}

impl TimeRange {
    pub fn new(start_secs: f64, duration_secs: f64) -> Self {
        Self {
            start_secs,
            duration_secs,
        }
    }

    fn validate(&self) -> Result<(), JobError> {
        if !self.start_secs.is_finite() || self.start_secs < 0.0 {
            return Err(JobError::invalid("start must be a non-negative number"));
        }
        if !self.duration_secs.is_finite() || self.duration_secs <= 0.0 {
            return Err(JobError::invalid("duration must be positive"));
        }
        Ok(())
    }
}

/// Transcode parameters. Unset fields fall back to the defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscodeParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_codec: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crf: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_codec: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_bitrate: Option<String>,
    /// Scale filter target such as `1280:720` or `-2:480`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<TimeRange>,
}

impl TranscodeParams {
    pub const DEFAULT_VIDEO_CODEC: &'static str = "libx264";
    pub const DEFAULT_PRESET: &'static str = "medium";
    pub const DEFAULT_CRF: u8 = 23;
    pub const DEFAULT_AUDIO_CODEC: &'static str = "aac";
    pub const DEFAULT_AUDIO_BITRATE: &'static str = "128k";

    pub fn video_codec(&self) -> &str {
        self.video_codec
            .as_deref()
            .unwrap_or(Self::DEFAULT_VIDEO_CODEC)
    }

    pub fn preset(&self) -> &str {
        self.preset.as_deref().unwrap_or(Self::DEFAULT_PRESET)
    }

    pub fn crf(&self) -> u8 {
        self.crf.unwrap_or(Self::DEFAULT_CRF)
    }

    pub fn audio_codec(&self) -> &str {
        self.audio_codec
            .as_deref()
            .unwrap_or(Self::DEFAULT_AUDIO_CODEC)
    }

    pub fn audio_bitrate(&self) -> &str {
        self.audio_bitrate
            .as_deref()
            .unwrap_or(Self::DEFAULT_AUDIO_BITRATE)
    }

    /// Values reach the engine as single arguments, and `resolution` is
    /// spliced into a filter graph, so each must be a plain token.
    fn validate(&self) -> Result<(), JobError> {
        let tokens = [
            ("video_codec", &self.video_codec),
            ("preset", &self.preset),
            ("audio_codec", &self.audio_codec),
            ("audio_bitrate", &self.audio_bitrate),
        ];
        for (field, value) in tokens {
            if let Some(value) = value {
                if !is_plain_token(value) {
                    return Err(JobError::invalid(format!("invalid {}: {:?}", field, value)));
                }
            }
        }
        if let Some(resolution) = &self.resolution {
            if !is_scale_target(resolution) {
                return Err(JobError::invalid(format!(
                    "invalid resolution: {:?} (expected WIDTH:HEIGHT)",
                    resolution
                )));
            }
        }
        if let Some(range) = &self.range {
            range.validate()?;
        }
        Ok(())
    }
}

const MAX_TOKEN_LEN: usize = 32;

/// A codec, preset or bitrate such as `libx264`, `veryfast` or `128k`.
fn is_plain_token(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= MAX_TOKEN_LEN
        && !value.starts_with('-')
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

/// `WIDTH:HEIGHT` where each side is a pixel count, `-1` or `-2`.
fn is_scale_target(value: &str) -> bool {
    let Some((width, height)) = value.split_once(':') else {
        return false;
    };
    [width, height].into_iter().all(|side| {
        matches!(side, "-1" | "-2")
            || (!side.is_empty() && side.len() <= 5 && side.chars().all(|c| c.is_ascii_digit()))
    })
}

/// GIF parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GifParams {
    pub start_secs: f64,
    pub duration_secs: f64,
    pub fps: u32,
    pub width: u32,
}

impl Default for GifParams {
    fn default() -> Self {
        Self {
            start_secs: 0.0,
            duration_secs: 5.0,
            fps: 10,
            width: 480,
        }
    }
}

impl GifParams {
    pub fn range(&self) -> TimeRange {
        TimeRange::new(self.start_secs, self.duration_secs)
    }
}

/// What a conversion job does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operation {
    /// Re-encode into another video container.
    Transcode {
        format: TargetFormat,
        #[serde(default)]
        params: TranscodeParams,
    },
    /// Re-encode as MP4 at a lower quality.
    Compress { level: CompressionLevel },
    /// Drop the video stream and encode the audio.
    ExtractAudio { format: TargetFormat },
    /// Cut a section without re-encoding. Cuts snap to keyframes.
    Trim { range: TimeRange },
    /// Render an animated GIF.
    Gif {
        #[serde(default)]
        params: GifParams,
    },
}

impl Operation {
    /// Transcode to `format` with default parameters.
    pub fn transcode(format: TargetFormat) -> Self {
        Self::Transcode {
            format,
            params: TranscodeParams::default(),
        }
    }

    /// Label used in logs and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Transcode { .. } => "transcode",
            Self::Compress { .. } => "compress",
            Self::ExtractAudio { .. } => "extract_audio",
            Self::Trim { .. } => "trim",
            Self::Gif { .. } => "gif",
        }
    }

    /// Extension of the produced file. Trim keeps the input's extension.
    pub fn output_extension(&self, input_extension: Option<&str>) -> String {
        match self {
            Self::Transcode { format, .. } | Self::ExtractAudio { format } => {
                format.extension().to_string()
            }
            Self::Compress { .. } => TargetFormat::Mp4.extension().to_string(),
            Self::Trim { .. } => input_extension.unwrap_or("mp4").to_string(),
            Self::Gif { .. } => TargetFormat::Gif.extension().to_string(),
        }
    }

    /// Rejects parameter combinations the engine cannot honour.
    pub fn validate(&self) -> Result<(), JobError> {
        match self {
            Self::Transcode { format, params } => {
                if format.is_audio() || *format == TargetFormat::Gif {
                    return Err(JobError::invalid(format!(
                        "{} is not a video container",
                        format
                    )));
                }
                params.validate()
            }
            Self::Compress { .. } => Ok(()),
            Self::ExtractAudio { format } => {
                if !format.is_audio() {
                    return Err(JobError::invalid(format!(
                        "{} is not an audio format",
                        format
                    )));
                }
                Ok(())
            }
            Self::Trim { range } => range.validate(),
            Self::Gif { params } => {
                if params.fps == 0 || params.width == 0 {
                    return Err(JobError::invalid("fps and width must be positive"));
                }
                params.range().validate()
            }
        }
    }
}

/// Lifecycle state of a conversion job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    LoadingEngine,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl JobState {
    /// Whether the job holds the engine.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::LoadingEngine | Self::Running)
    }

    /// Whether the job has settled.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::LoadingEngine => "loading_engine",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Displayed progress of a job.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JobProgress {
    pub job_id: JobId,
    pub state: JobState,
    /// Percentage (0.0 - 100.0).
    pub percent: f64,
}

impl JobProgress {
    /// Progress of a job that has not started.
    pub fn pending(job_id: JobId) -> Self {
        Self {
            job_id,
            state: JobState::Pending,
            percent: 0.0,
        }
    }
}

/// File produced by a successful job.
#[derive(Debug, Clone)]
pub struct JobOutput {
    /// Display name: the input's base name with the new extension.
    pub name: String,
    pub mime: String,
    pub content: MediaContent,
}
